//! Bus access abstraction.
//!
//! The bus is a single-master, byte-oriented medium: every transfer names the
//! slave address it targets. [`Bus`] is the seam between the protocol code and
//! the hardware backend ([`crate::i2c::I2cBus`] on Linux, scripted doubles in
//! tests).

use std::fmt;
use std::future::Future;
use std::ops::RangeInclusive;

/// Slave address on the bus.
pub type Address = u16;

/// Highest 7-bit slave address.
pub const MAX_ADDRESS: Address = 0x7f;

/// A transfer the bus rejected (NACK, missing device, adapter I/O error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusError {
    /// OS error code, when the failure came from the kernel.
    pub code: Option<i32>,
    /// Human-readable description.
    pub message: String,
}

impl BusError {
    /// Create an error carrying an OS error code.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Create an error without an OS error code.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "IOError({}): {}", code, self.message),
            None => write!(f, "IOError: {}", self.message),
        }
    }
}

impl std::error::Error for BusError {}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => {
                let text = err.to_string();
                let suffix = format!(" (os error {})", code);
                let message = text.strip_suffix(&suffix).unwrap_or(&text).to_string();
                Self::with_code(code, message)
            }
            None => Self::other(err.to_string()),
        }
    }
}

/// Byte-level access to bus slaves.
///
/// Implementations must not allow two transfers to overlap.
pub trait Bus: Send {
    /// Write one byte to the slave at `address`.
    fn write_byte(
        &mut self,
        address: Address,
        byte: u8,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Read one byte from the slave at `address`.
    fn read_byte(&mut self, address: Address) -> impl Future<Output = Result<u8, BusError>> + Send;
}

/// Inclusive range of addresses probed by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: Address,
    end: Address,
}

impl AddressRange {
    /// Create a range covering `start..=end`.
    ///
    /// Returns `None` when `start > end`.
    pub fn new(start: Address, end: Address) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// First probed address.
    pub fn start(&self) -> Address {
        self.start
    }

    /// Last probed address (inclusive).
    pub fn end(&self) -> Address {
        self.end
    }

    /// Whether `address` lies in the range.
    pub fn contains(&self, address: Address) -> bool {
        (self.start..=self.end).contains(&address)
    }

    /// Number of addresses in the range.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Always false; a range holds at least one address.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over every address in order.
    pub fn iter(&self) -> RangeInclusive<Address> {
        self.start..=self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_text() {
        assert_eq!(
            BusError::with_code(121, "Remote I/O error").to_string(),
            "IOError(121): Remote I/O error"
        );
        assert_eq!(
            BusError::other("adapter gone").to_string(),
            "IOError: adapter gone"
        );
    }

    #[test]
    fn test_bus_error_from_os_error() {
        let err = BusError::from(std::io::Error::from_raw_os_error(6));

        assert_eq!(err.code, Some(6));
        assert!(!err.message.contains("os error"));
    }

    #[test]
    fn test_address_range_inclusive() {
        let range = AddressRange::new(8, 9).unwrap();

        assert_eq!(range.iter().collect::<Vec<_>>(), vec![8, 9]);
        assert_eq!(range.len(), 2);
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!(!range.contains(7));
        assert_eq!(range.to_string(), "[8, 9]");
    }

    #[test]
    fn test_address_range_rejects_inverted() {
        assert!(AddressRange::new(10, 9).is_none());
        assert_eq!(AddressRange::new(5, 5).unwrap().len(), 1);
    }
}

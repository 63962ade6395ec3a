//! Linux I2C bus backend.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

use crate::bus::{Address, Bus, BusError};

/// An I2C adapter opened through `/dev/i2c-N`.
///
/// Each byte is one SMBus "send byte" or "receive byte" transaction, run on
/// the blocking pool. The device handle sits behind a mutex, so a transfer
/// left running by a cancelled exchange finishes before the next one starts.
///
/// No slave address is bound until the first transfer, so an address claimed
/// by a kernel driver fails that exchange only.
#[derive(Clone)]
pub struct I2cBus {
    path: PathBuf,
    device: Arc<Mutex<Option<LinuxI2CDevice>>>,
}

impl I2cBus {
    /// Check that the adapter at `path` exists and is readable and writable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new().read(true).write(true).open(&path)?;

        Ok(Self {
            path,
            device: Arc::new(Mutex::new(None)),
        })
    }

    async fn transfer<T, F>(&self, address: Address, op: F) -> Result<T, BusError>
    where
        T: Send + 'static,
        F: FnOnce(&mut LinuxI2CDevice) -> Result<T, LinuxI2CError> + Send + 'static,
    {
        let device = Arc::clone(&self.device);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut device = device.lock().unwrap_or_else(|e| e.into_inner());
            if device.is_none() {
                *device = Some(LinuxI2CDevice::new(&path, address).map_err(bus_error)?);
            }
            let Some(device) = device.as_mut() else {
                return Err(BusError::other("I2C adapter is not open"));
            };
            device.set_slave_address(address).map_err(bus_error)?;
            op(device).map_err(bus_error)
        })
        .await
        .map_err(|e| BusError::other(format!("transfer task failed: {}", e)))?
    }
}

impl Bus for I2cBus {
    async fn write_byte(&mut self, address: Address, byte: u8) -> Result<(), BusError> {
        self.transfer(address, move |device| device.smbus_write_byte(byte))
            .await
    }

    async fn read_byte(&mut self, address: Address) -> Result<u8, BusError> {
        self.transfer(address, |device| device.smbus_read_byte()).await
    }
}

fn bus_error(err: LinuxI2CError) -> BusError {
    BusError::from(std::io::Error::from(err))
}

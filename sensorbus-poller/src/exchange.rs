//! Deadline-bound request/response transactions.
//!
//! An exchange writes a request one byte at a time, then reads bytes until the
//! terminator arrives. Slaves may send pad bytes while they prepare a reply;
//! those are dropped and do not extend the deadline, which is wall-clock from
//! the start of the read phase. The write phase has its own deadline of the
//! same length.
//!
//! Deadlines are enforced here and nowhere else.

use std::time::Duration;

use thiserror::Error;

use crate::bus::{Address, Bus, BusError};

/// Request byte asking a slave for its sensor list.
pub const DISCOVERY_REQUEST: u8 = b'?';

/// Byte ending every response.
pub const TERMINATOR: u8 = b'\n';

/// Byte a slave sends while it is not ready; never part of a response.
pub const PAD: u8 = 0x00;

/// Failure of a single exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The bus rejected a transfer.
    #[error("{0}")]
    Bus(#[from] BusError),

    /// No terminator arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl ExchangeError {
    /// Whether this is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Timeout(_))
    }
}

/// Runs exchanges against a bus with a fixed per-exchange deadline.
#[derive(Debug)]
pub struct TimedExchange<B> {
    bus: B,
    timeout: Duration,
}

impl<B: Bus> TimedExchange<B> {
    /// Create a new exchanger.
    pub fn new(bus: B, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    /// The per-exchange deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one request/response transaction with `address`.
    ///
    /// Returns the response bytes without pad bytes and without the
    /// terminator. A partial response is discarded on timeout.
    pub async fn exchange(
        &mut self,
        address: Address,
        request: &[u8],
    ) -> Result<Vec<u8>, ExchangeError> {
        let timeout = self.timeout;

        tokio::time::timeout(timeout, write_request(&mut self.bus, address, request))
            .await
            .map_err(|_| ExchangeError::Timeout(timeout))??;

        tokio::time::timeout(timeout, read_response(&mut self.bus, address))
            .await
            .map_err(|_| ExchangeError::Timeout(timeout))?
    }
}

async fn write_request<B: Bus>(
    bus: &mut B,
    address: Address,
    request: &[u8],
) -> Result<(), BusError> {
    for &byte in request {
        bus.write_byte(address, byte).await?;
    }
    Ok(())
}

async fn read_response<B: Bus>(bus: &mut B, address: Address) -> Result<Vec<u8>, ExchangeError> {
    let mut response = Vec::new();

    loop {
        match bus.read_byte(address).await? {
            PAD => tokio::task::yield_now().await,
            TERMINATOR => return Ok(response),
            byte => response.push(byte),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Behaviour, SimBus};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn test_exchange_returns_payload() {
        let bus = SimBus::new().with_device(8, [("?", Behaviour::reply("tempA\ttempB\t"))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let response = exchange.exchange(8, b"?").await.unwrap();
        assert_eq!(response, b"tempA\ttempB\t");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pad_bytes_are_dropped() {
        let bus = SimBus::new().with_device(8, [("t", Behaviour::padded(5, "21.5"))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let response = exchange.exchange(8, b"t").await.unwrap();
        assert_eq!(response, b"21.5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalling_device_times_out() {
        let bus = SimBus::new().with_device(8, [("t", Behaviour::Stall)]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let started = tokio::time::Instant::now();
        let result = exchange.exchange(8, b"t").await;

        assert_eq!(result, Err(ExchangeError::Timeout(TIMEOUT)));
        assert!(started.elapsed() >= TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pads_do_not_extend_deadline() {
        // Enough pad bytes to outlast the deadline before the reply arrives.
        let bus = SimBus::new()
            .with_unit_delay(Duration::from_millis(10))
            .with_device(8, [("t", Behaviour::padded(50, "late"))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let result = exchange.exchange(8, b"t").await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_read_times_out() {
        let bus = SimBus::new().with_device(8, [("t", Behaviour::Hang)]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let result = exchange.exchange(8, b"t").await;
        assert_eq!(result, Err(ExchangeError::Timeout(TIMEOUT)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_device_fails_immediately() {
        let mut exchange = TimedExchange::new(SimBus::new(), TIMEOUT);

        let started = tokio::time::Instant::now();
        let result = exchange.exchange(9, b"?").await;

        assert!(matches!(result, Err(ExchangeError::Bus(_))));
        assert!(started.elapsed() < TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_is_bus_error() {
        let bus = SimBus::new().with_device(
            8,
            [("t", Behaviour::Fail(BusError::with_code(5, "Input/output error")))],
        );
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let err = exchange.exchange(8, b"t").await.unwrap_err();
        assert_eq!(err.to_string(), "IOError(5): Input/output error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_exchange_leaves_no_deadline() {
        let bus = SimBus::new().with_device(
            8,
            [("a", Behaviour::reply("1")), ("b", Behaviour::reply("2"))],
        );
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        assert_eq!(exchange.exchange(8, b"a").await.unwrap(), b"1");
        tokio::time::sleep(TIMEOUT * 3).await;
        assert_eq!(exchange.exchange(8, b"b").await.unwrap(), b"2");
    }
}

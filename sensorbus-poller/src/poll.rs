//! Sensor polling.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use sensorbus_common::SensorRecord;
use tracing::{debug, warn};

use crate::bus::{Address, Bus, BusError};
use crate::device::DeviceMap;
use crate::exchange::{ExchangeError, TimedExchange};
use crate::fault::FaultTally;

/// Log text written for a timed out reading.
pub const TIMEOUT_TEXT: &str = "TIMEOUT";

/// Outcome of polling one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// Raw response text.
    Value(String),
    /// The bus rejected the exchange.
    Failed(BusError),
    /// No complete response before the deadline.
    TimedOut,
}

impl From<Result<Vec<u8>, ExchangeError>> for Reading {
    fn from(result: Result<Vec<u8>, ExchangeError>) -> Self {
        match result {
            Ok(bytes) => Reading::Value(String::from_utf8_lossy(&bytes).into_owned()),
            Err(ExchangeError::Bus(e)) => Reading::Failed(e),
            Err(ExchangeError::Timeout(_)) => Reading::TimedOut,
        }
    }
}

/// Formats as the text written to the sensor log.
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => f.write_str(v),
            Reading::Failed(e) => write!(f, "{}", e),
            Reading::TimedOut => f.write_str(TIMEOUT_TEXT),
        }
    }
}

/// A reading tagged with its sensor name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub sensor: String,
    pub reading: Reading,
}

/// Readings of one poll cycle, by device then sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollResult {
    devices: BTreeMap<Address, Vec<SensorReading>>,
}

impl PollResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the readings of one device.
    pub fn insert(&mut self, address: Address, readings: Vec<SensorReading>) {
        self.devices.insert(address, readings);
    }

    /// Readings of the device at `address`, in poll order.
    pub fn device(&self, address: Address) -> Option<&[SensorReading]> {
        self.devices.get(&address).map(Vec::as_slice)
    }

    /// Reading of one sensor.
    pub fn get(&self, address: Address, sensor: &str) -> Option<&Reading> {
        self.device(address)?
            .iter()
            .find(|r| r.sensor == sensor)
            .map(|r| &r.reading)
    }

    /// Devices and their readings in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &[SensorReading])> {
        self.devices.iter().map(|(a, r)| (*a, r.as_slice()))
    }

    /// Number of readings across all devices.
    pub fn reading_count(&self) -> usize {
        self.devices.values().map(Vec::len).sum()
    }

    /// Whether nothing was polled.
    pub fn is_empty(&self) -> bool {
        self.reading_count() == 0
    }

    /// Log rows for this cycle, all stamped with `timestamp`.
    pub fn to_records(&self, timestamp: DateTime<Utc>) -> Vec<SensorRecord> {
        self.devices
            .values()
            .flatten()
            .map(|r| SensorRecord::new(timestamp, r.sensor.clone(), r.reading.to_string()))
            .collect()
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub readings: PollResult,
    pub faults: FaultTally,
}

/// Poll every sensor of every device in `devices`.
///
/// Each sensor is asked for its value by sending its name. A failure is
/// recorded as that sensor's reading and polling carries on with the rest.
pub async fn poll_devices<B: Bus>(
    exchange: &mut TimedExchange<B>,
    devices: &DeviceMap,
) -> PollOutcome {
    let mut outcome = PollOutcome::default();

    for device in devices {
        let address = device.address();
        let mut readings = Vec::with_capacity(device.sensors().len());

        for sensor in device.sensors() {
            let result = exchange.exchange(address, sensor.as_bytes()).await;
            match &result {
                Ok(_) => debug!(address, sensor = %sensor, "Polled sensor"),
                Err(e) => {
                    warn!(address, sensor = %sensor, error = %e, "Failed to poll sensor");
                    outcome.faults.record(e);
                }
            }

            readings.push(SensorReading {
                sensor: sensor.clone(),
                reading: Reading::from(result),
            });
        }

        outcome.readings.insert(address, readings);
    }

    outcome
}

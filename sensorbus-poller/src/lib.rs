//! SensorBus poller.
//!
//! Discovers slave devices on an I2C bus, polls every sensor they advertise
//! on a fixed interval, and power-cycles the devices when a cycle hits
//! communication faults.
//!
//! # Cycle
//!
//! ```text
//! scan [start, end] → diff with previous scan → poll every sensor
//!     → record readings (CSV log, console) → settle faults (power cycle)
//!     → sleep poll_interval_secs
//! ```
//!
//! # Wire protocol
//!
//! Every exchange writes a request one byte at a time, then reads until
//! `\n`. Pad bytes (`0x00`) sent while a slave prepares its answer are
//! dropped. The discovery request is `?`; the answer is a tab-separated
//! sensor list. Polling a sensor sends its name; the answer is its value.

pub mod bus;
pub mod config;
pub mod device;
pub mod exchange;
pub mod fault;
pub mod gpio;
#[cfg(target_os = "linux")]
pub mod i2c;
pub mod orchestrator;
pub mod poll;
pub mod recovery;
pub mod scanner;
pub mod sim;
pub mod sink;
pub mod topology;

pub use bus::{Address, AddressRange, Bus, BusError};
pub use config::PollerConfig;
pub use exchange::{ExchangeError, TimedExchange};
pub use orchestrator::{CycleReport, Orchestrator};

//! Configuration for the poller.

use std::path::PathBuf;
use std::time::Duration;

use sensorbus_framework::{LoggingConfig, Result, ServiceConfig, ServiceError};
use serde::{Deserialize, Serialize};

use crate::bus::{Address, AddressRange, MAX_ADDRESS};
use crate::recovery::{Level, PowerCycle};

/// Complete poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Bus settings.
    pub bus: BusConfig,

    /// Seconds to sleep between cycles (default: 10).
    pub poll_interval_secs: u64,

    /// Bus power control.
    pub power: PowerConfig,

    /// Where readings go.
    pub sink: SinkConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl PollerConfig {
    /// Sleep between cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Bus device and scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Bus device path (default: "/dev/i2c-1").
    pub device: PathBuf,

    /// First scanned address, inclusive (default: 8).
    pub start_address: Address,

    /// Last scanned address, inclusive (default: 119).
    pub end_address: Address,

    /// Per-exchange deadline in milliseconds (default: 3000).
    pub timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/i2c-1"),
            start_address: 8,
            end_address: 119,
            timeout_ms: 3000,
        }
    }
}

impl BusConfig {
    /// The scanned address range, if the bounds are ordered.
    pub fn range(&self) -> Option<AddressRange> {
        AddressRange::new(self.start_address, self.end_address)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Power control output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Power-cycle the devices after a faulty cycle (default: false).
    pub enabled: bool,

    /// sysfs GPIO number of the power switch (default: 17).
    pub gpio: u32,

    /// sysfs GPIO class directory (default: "/sys/class/gpio").
    pub sysfs_root: PathBuf,

    /// Level that powers the devices (default: high).
    pub on_level: Level,

    /// Seconds the power stays off (default: 5).
    pub off_secs: u64,

    /// Seconds to wait after power returns (default: 10).
    pub settle_secs: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gpio: 17,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            on_level: Level::High,
            off_secs: 5,
            settle_secs: 10,
        }
    }
}

impl PowerConfig {
    pub fn cycle(&self) -> PowerCycle {
        PowerCycle {
            on_level: self.on_level,
            off_duration: Duration::from_secs(self.off_secs),
            settle_duration: Duration::from_secs(self.settle_secs),
        }
    }
}

/// Reading sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// CSV log path (default: "Sensors.csv").
    pub path: PathBuf,

    /// Echo each cycle to stdout (default: true).
    pub echo: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Sensors.csv"),
            echo: true,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            poll_interval_secs: 10,
            power: PowerConfig::default(),
            sink: SinkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig for PollerConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        if self.bus.device.as_os_str().is_empty() {
            return Err(ServiceError::validation("bus.device cannot be empty"));
        }

        if self.bus.start_address > self.bus.end_address {
            return Err(ServiceError::validation(format!(
                "bus.start_address ({}) must not exceed bus.end_address ({})",
                self.bus.start_address, self.bus.end_address
            )));
        }

        if self.bus.end_address > MAX_ADDRESS {
            return Err(ServiceError::validation(format!(
                "bus.end_address ({}) must be at most {}",
                self.bus.end_address, MAX_ADDRESS
            )));
        }

        if self.bus.timeout_ms == 0 {
            return Err(ServiceError::validation("bus.timeout_ms must be > 0"));
        }

        if self.poll_interval_secs == 0 {
            return Err(ServiceError::validation("poll_interval_secs must be > 0"));
        }

        if self.sink.path.as_os_str().is_empty() {
            return Err(ServiceError::validation("sink.path cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollerConfig::parse("{}").unwrap();

        assert_eq!(config.bus.device, PathBuf::from("/dev/i2c-1"));
        assert_eq!(config.bus.range(), AddressRange::new(8, 119));
        assert_eq!(config.bus.timeout(), Duration::from_secs(3));
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert!(!config.power.enabled);
        assert_eq!(config.power.gpio, 17);
        assert_eq!(config.power.on_level, Level::High);
        assert_eq!(config.sink.path, PathBuf::from("Sensors.csv"));
        assert!(config.sink.echo);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            bus: {
                device: "/dev/i2c-0",
                start_address: 16,
                end_address: 32,
                timeout_ms: 500,
            },
            poll_interval_secs: 30,
            power: {
                enabled: true,
                gpio: 4,
                on_level: "low",
                off_secs: 2,
                settle_secs: 3,
            },
            sink: { path: "/var/log/sensors.csv", echo: false },
            logging: { level: "debug" },
        }"#;

        let config = PollerConfig::parse(json).unwrap();

        assert_eq!(config.bus.range(), AddressRange::new(16, 32));
        assert_eq!(config.bus.timeout(), Duration::from_millis(500));
        assert_eq!(config.poll_interval_secs, 30);

        let cycle = config.power.cycle();
        assert_eq!(cycle.on_level, Level::Low);
        assert_eq!(cycle.off_level(), Level::High);
        assert_eq!(cycle.off_duration, Duration::from_secs(2));
        assert_eq!(cycle.settle_duration, Duration::from_secs(3));
        assert_eq!(config.power.sysfs_root, PathBuf::from("/sys/class/gpio"));

        assert!(!config.sink.echo);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_inverted_range() {
        let err = PollerConfig::parse("{ bus: { start_address: 20, end_address: 10 } }")
            .unwrap_err();
        assert!(err.to_string().contains("start_address"));
    }

    #[test]
    fn test_validate_address_too_high() {
        assert!(PollerConfig::parse("{ bus: { end_address: 128 } }").is_err());
        assert!(PollerConfig::parse("{ bus: { end_address: 127 } }").is_ok());
    }

    #[test]
    fn test_validate_zero_durations() {
        assert!(PollerConfig::parse("{ bus: { timeout_ms: 0 } }").is_err());
        assert!(PollerConfig::parse("{ poll_interval_secs: 0 }").is_err());
    }

    #[test]
    fn test_validate_empty_paths() {
        assert!(PollerConfig::parse(r#"{ bus: { device: "" } }"#).is_err());
        assert!(PollerConfig::parse(r#"{ sink: { path: "" } }"#).is_err());
    }

    #[test]
    fn test_invalid_level() {
        assert!(PollerConfig::parse(r#"{ power: { on_level: "medium" } }"#).is_err());
    }
}

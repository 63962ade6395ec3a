//! Configuration for the republisher.

use std::path::PathBuf;
use std::time::Duration;

use sensorbus_common::Format;
use sensorbus_framework::{LoggingConfig, Result, ServiceConfig, ServiceError};
use serde::{Deserialize, Serialize};

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Key expression layout: `<prefix>/<instance>/<sensor>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// First key segment(s) (default: "sensorbus").
    pub prefix: String,

    /// Identifies this installation (default: "default").
    pub instance: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            prefix: "sensorbus".to_string(),
            instance: "default".to_string(),
        }
    }
}

/// How a reading is encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// The value text only.
    #[default]
    Raw,
    /// The full row as JSON.
    Json,
    /// The full row as CBOR.
    Cbor,
}

impl PayloadFormat {
    /// Serialization format for structured payloads.
    pub fn structured(self) -> Option<Format> {
        match self {
            PayloadFormat::Raw => None,
            PayloadFormat::Json => Some(Format::Json),
            PayloadFormat::Cbor => Some(Format::Cbor),
        }
    }
}

/// Complete republisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepublisherConfig {
    /// Zenoh connection settings.
    pub zenoh: ZenohConfig,

    /// CSV log written by the poller (default: "Sensors.csv").
    pub log_path: PathBuf,

    /// File holding the last published timestamp (default: "last_updated").
    pub watermark_path: PathBuf,

    pub topic: TopicConfig,

    pub payload: PayloadFormat,

    /// Milliseconds between log scans (default: 1000).
    pub scan_interval_ms: u64,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for RepublisherConfig {
    fn default() -> Self {
        Self {
            zenoh: ZenohConfig::default(),
            log_path: PathBuf::from("Sensors.csv"),
            watermark_path: PathBuf::from("last_updated"),
            topic: TopicConfig::default(),
            payload: PayloadFormat::default(),
            scan_interval_ms: 1000,
            logging: LoggingConfig::default(),
        }
    }
}

impl RepublisherConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

impl ServiceConfig for RepublisherConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        if self.log_path.as_os_str().is_empty() {
            return Err(ServiceError::validation("log_path cannot be empty"));
        }

        if self.watermark_path.as_os_str().is_empty() {
            return Err(ServiceError::validation("watermark_path cannot be empty"));
        }

        if self.topic.prefix.is_empty() {
            return Err(ServiceError::validation("topic.prefix cannot be empty"));
        }

        if self.topic.instance.is_empty() || self.topic.instance.contains('/') {
            return Err(ServiceError::validation(
                "topic.instance must be a single non-empty key segment",
            ));
        }

        if self.scan_interval_ms == 0 {
            return Err(ServiceError::validation("scan_interval_ms must be > 0"));
        }

        Ok(())
    }
}

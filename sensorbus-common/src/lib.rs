//! SensorBus Common Library
//!
//! This crate provides shared types and utilities for the SensorBus poller
//! and republisher:
//!
//! - [`record`] - Sensor log rows and the timestamp format shared with the watermark file
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Logging settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod record;
pub mod serialization;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use record::{SensorRecord, TIMESTAMP_FORMAT, encode_rows, format_timestamp, parse_timestamp};
pub use serialization::{Format, decode, encode};

/// Initialize tracing with the given configuration.
///
/// Diagnostics are written to stderr so they never mix with readings echoed
/// on stdout.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}

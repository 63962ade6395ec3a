use thiserror::Error;

/// Error type for the republisher.
#[derive(Debug, Error)]
pub enum RepublishError {
    #[error("Watermark file {path} is locked by another process")]
    WatermarkLocked { path: String },

    #[error("Watermark file {path}: {source}")]
    Watermark {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read sensor log {path}: {source}")]
    Log {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Encode(#[from] sensorbus_common::Error),
}

/// A failed publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The key can never be published to; retrying will not help.
    #[error("Invalid key expression '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("Failed to publish to '{key}': {message}")]
    Failed { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, RepublishError>;

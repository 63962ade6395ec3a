//! SensorBus republisher.
//!
//! Follows the CSV log written by the poller and republishes every new
//! reading to Zenoh. Progress is kept in a watermark file so a restart
//! resumes where the last run stopped.
//!
//! # Key Expressions
//!
//! ```text
//! <prefix>/<instance>/<sensor>      reading
//! <prefix>/<instance>/@/status      running / offline
//! ```

pub mod config;
pub mod error;
pub mod publisher;
pub mod republisher;
pub mod session;
pub mod status;
pub mod tail;
pub mod watermark;

pub use config::RepublisherConfig;
pub use error::{PublishError, RepublishError};
pub use republisher::{Republisher, ScanStats};

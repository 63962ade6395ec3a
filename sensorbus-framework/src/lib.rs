//! SensorBus Service Framework
//!
//! Common lifecycle pieces shared by the poller and the republisher.
//!
//! # Overview
//!
//! This framework provides:
//! - [`ServiceConfig`] trait for configuration loading and validation
//! - [`ServiceRunner`] for managing service lifecycle (startup, shutdown, signal handling)
//! - [`Shutdown`] for cooperative shutdown checks between units of work
//! - [`ServiceArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use sensorbus_framework::{ServiceArgs, ServiceConfig, ServiceRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ServiceArgs::parse_with_default("myservice.json5");
//!     let config = MyConfig::load(&args.config)?;
//!
//!     let mut runner = ServiceRunner::new_with_args("myservice", config, Some(&args))?;
//!
//!     // Spawn workers
//!     runner.spawn(my_worker(runner.shutdown()));
//!
//!     // Run until Ctrl+C
//!     runner.run().await
//! }
//! ```

mod args;
mod config;
mod error;
mod runner;
pub mod shutdown;

pub use args::ServiceArgs;
pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use runner::ServiceRunner;
pub use shutdown::{Shutdown, ShutdownTrigger};

// Re-export commonly used types from sensorbus-common
pub use sensorbus_common::{LogFormat, LoggingConfig};

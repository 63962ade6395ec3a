//! Service runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;

use sensorbus_common::init_tracing;

use crate::ServiceArgs;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::shutdown::{self, Shutdown, ShutdownTrigger};

/// How long workers get to finish their current unit of work after Ctrl+C.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runner that manages the lifecycle of a SensorBus service.
///
/// Handles:
/// - Logging initialization (with optional CLI override)
/// - Task spawning and management
/// - Cooperative shutdown on Ctrl+C, with a grace period before tasks are aborted
///
/// # Example
///
/// ```ignore
/// use sensorbus_framework::{ServiceArgs, ServiceConfig, ServiceRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = ServiceArgs::parse_with_default("myservice.json5");
///     let config = MyConfig::load(&args.config)?;
///
///     let mut runner = ServiceRunner::new_with_args("myservice", config, Some(&args))?;
///
///     let shutdown = runner.shutdown();
///     runner.spawn(async move {
///         // Worker logic here, checking `shutdown` between units of work
///     });
///
///     runner.run().await
/// }
/// ```
pub struct ServiceRunner<C: ServiceConfig> {
    /// Service name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
    /// Shutdown sender.
    trigger: ShutdownTrigger,
    /// Time allowed for workers to stop before they are aborted.
    grace: Duration,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: ServiceConfig> ServiceRunner<C> {
    /// Create a new runner with CLI args for log level override.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&ServiceArgs>,
    ) -> Result<Self> {
        let log_config = config
            .logging()
            .with_level_override(args.and_then(|a| a.log_level.as_deref()));

        init_tracing(&log_config).map_err(|e| ServiceError::config(e.to_string()))?;

        Ok(Self::without_logging(name, config))
    }

    /// Create a runner without touching the global tracing subscriber.
    pub fn without_logging(name: impl Into<String>, config: C) -> Self {
        let name = name.into();
        let (trigger, _) = shutdown::channel();

        tracing::info!(service = %name, version = env!("CARGO_PKG_VERSION"), "Starting service");

        Self {
            name,
            config,
            trigger,
            grace: DEFAULT_SHUTDOWN_GRACE,
            tasks: Vec::new(),
        }
    }

    /// Override the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a shutdown receiver for a worker.
    pub fn shutdown(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    /// Spawn a worker task.
    ///
    /// The task is given the grace period to finish after shutdown, then aborted.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the service until Ctrl+C is received.
    pub async fn run(self) -> Result<()> {
        let name = self.name.clone();
        self.run_until(async move {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!(service = %name, "Received shutdown signal");
        })
        .await
    }

    /// Run the service until `stop` completes or every worker has exited.
    ///
    /// This will:
    /// 1. Wait for `stop` (or for all workers to finish on their own)
    /// 2. Signal shutdown to every worker
    /// 3. Wait up to the grace period for workers to return
    /// 4. Abort the remaining tasks
    pub async fn run_until<S>(mut self, stop: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(
            service = %self.name,
            tasks = self.tasks.len(),
            "Service running. Press Ctrl+C to stop."
        );

        let tasks = std::mem::take(&mut self.tasks);
        let mut all_done = Box::pin(join_workers(tasks));

        let finished_early = tokio::select! {
            _ = stop => false,
            _ = &mut all_done => true,
        };

        if finished_early {
            tracing::warn!(service = %self.name, "All workers exited");
            return Ok(());
        }

        self.trigger.trigger();

        if tokio::time::timeout(self.grace, &mut all_done).await.is_err() {
            tracing::warn!(
                service = %self.name,
                grace_secs = self.grace.as_secs(),
                "Workers did not stop in time, aborting"
            );
        }

        tracing::info!(service = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Await every handle, aborting them all if this future is dropped.
async fn join_workers(tasks: Vec<JoinHandle<()>>) {
    let mut guard = AbortOnDrop(tasks);
    for task in guard.0.iter_mut() {
        if let Err(e) = task.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Worker panicked");
            }
        }
    }
}

struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

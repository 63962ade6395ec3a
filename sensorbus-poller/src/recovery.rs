//! Fault recovery by power-cycling the bus devices.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::fault::FaultTally;

/// Logic level of a control output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// The opposite level.
    pub fn inverse(self) -> Self {
        match self {
            Level::High => Level::Low,
            Level::Low => Level::High,
        }
    }

    /// Value written to a sysfs `value` file.
    pub fn as_value(self) -> &'static str {
        match self {
            Level::High => "1",
            Level::Low => "0",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::High => f.write_str("high"),
            Level::Low => f.write_str("low"),
        }
    }
}

/// Failure to drive a control output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// A digital output switching power to the bus devices.
pub trait ControlOutput: Send {
    /// Drive the output to `level`.
    fn set_level(&mut self, level: Level) -> impl Future<Output = Result<(), OutputError>> + Send;
}

/// Timing and polarity of a power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerCycle {
    /// Level that powers the devices.
    pub on_level: Level,
    /// How long power stays off.
    pub off_duration: Duration,
    /// How long to wait after power returns.
    pub settle_duration: Duration,
}

impl PowerCycle {
    /// Level that cuts power.
    pub fn off_level(&self) -> Level {
        self.on_level.inverse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Normal,
    Recovering,
    /// Switching power back on failed; the devices may be unpowered.
    PowerLost,
}

/// What the controller did with a cycle's faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No faults.
    Clean,
    /// Faults reported, power control disabled.
    Diagnosed,
    /// Faults reported and the devices were power-cycled.
    PowerCycled,
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("failed to switch bus power off: {0}")]
    Deassert(#[source] OutputError),

    #[error("failed to switch bus power back on: {0}")]
    Reassert(#[source] OutputError),
}

/// Decides, once per cycle, whether the bus devices need a power cycle.
pub struct FaultRecovery<O> {
    power: Option<(O, PowerCycle)>,
    state: RecoveryState,
}

impl<O: ControlOutput> FaultRecovery<O> {
    /// A controller that only reports faults.
    pub fn disabled() -> Self {
        Self {
            power: None,
            state: RecoveryState::Normal,
        }
    }

    /// A controller that power-cycles through `output` on faults.
    pub fn power_cycling(output: O, cycle: PowerCycle) -> Self {
        Self {
            power: Some((output, cycle)),
            state: RecoveryState::Normal,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Whether a control output is configured.
    pub fn is_enabled(&self) -> bool {
        self.power.is_some()
    }

    /// The control output, when configured.
    pub fn output(&self) -> Option<&O> {
        self.power.as_ref().map(|(output, _)| output)
    }

    /// Drive the output to the "on" level. A no-op when disabled.
    pub async fn power_on(&mut self) -> Result<(), OutputError> {
        match &mut self.power {
            Some((output, cycle)) => output.set_level(cycle.on_level).await,
            None => Ok(()),
        }
    }

    /// Retry switching power on after a failed reassert.
    ///
    /// Unpowered devices do not answer the scan, so a lost reassert never
    /// shows up as a fault. Call this before every scan. Returns `Ok(true)`
    /// when this call brought power back.
    pub async fn restore(&mut self) -> Result<bool, OutputError> {
        if self.state != RecoveryState::PowerLost {
            return Ok(false);
        }
        let Some((output, cycle)) = &mut self.power else {
            return Ok(false);
        };

        output.set_level(cycle.on_level).await?;
        tokio::time::sleep(cycle.settle_duration).await;
        self.state = RecoveryState::Normal;

        info!("Bus power restored");
        Ok(true)
    }

    /// Consume a cycle's fault tally and act on it.
    ///
    /// On return the output is at its "on" level and the controller is back
    /// in [`RecoveryState::Normal`], unless reasserting failed, which leaves
    /// it in [`RecoveryState::PowerLost`] until [`restore`](Self::restore)
    /// succeeds.
    pub async fn settle(&mut self, faults: FaultTally) -> Result<RecoveryOutcome, RecoveryError> {
        if faults.is_clean() {
            return Ok(RecoveryOutcome::Clean);
        }

        let Some((output, cycle)) = &mut self.power else {
            warn!(
                "Communication faults this cycle ({}); power control disabled, \
                 not resetting devices",
                faults
            );
            return Ok(RecoveryOutcome::Diagnosed);
        };

        warn!("Communication faults this cycle ({}); power-cycling bus devices", faults);
        self.state = RecoveryState::Recovering;

        let deasserted = output.set_level(cycle.off_level()).await;
        match &deasserted {
            Ok(()) => tokio::time::sleep(cycle.off_duration).await,
            Err(e) => error!("Could not switch bus power off: {}", e),
        }

        let reasserted = output.set_level(cycle.on_level).await;
        self.state = match &reasserted {
            Ok(()) => {
                tokio::time::sleep(cycle.settle_duration).await;
                RecoveryState::Normal
            }
            Err(_) => RecoveryState::PowerLost,
        };

        reasserted.map_err(RecoveryError::Reassert)?;
        deasserted.map_err(RecoveryError::Deassert)?;

        info!("Bus devices power-cycled");
        Ok(RecoveryOutcome::PowerCycled)
    }
}

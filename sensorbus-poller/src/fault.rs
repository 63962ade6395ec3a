//! Per-cycle fault accounting.

use std::fmt;

use crate::exchange::ExchangeError;

/// Faults observed during one scan/poll cycle.
///
/// A fresh tally starts every cycle. The scanner and the poll cycle each
/// return one, the orchestrator merges them, and the recovery controller
/// consumes the result by value, so nothing carries over to the next cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct FaultTally {
    /// Exchanges that hit their deadline.
    pub timeouts: u32,
    /// Exchanges the bus rejected on a present device.
    pub communication_failures: u32,
}

impl FaultTally {
    /// An empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failed exchange.
    pub fn record(&mut self, error: &ExchangeError) {
        match error {
            ExchangeError::Timeout(_) => self.timeouts += 1,
            ExchangeError::Bus(_) => self.communication_failures += 1,
        }
    }

    /// Fold another tally into this one.
    pub fn merge(mut self, other: FaultTally) -> Self {
        self.timeouts += other.timeouts;
        self.communication_failures += other.communication_failures;
        self
    }

    /// Total number of faults.
    pub fn total(&self) -> u32 {
        self.timeouts + self.communication_failures
    }

    /// Whether no fault was recorded.
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for FaultTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} timeout(s), {} communication failure(s)",
            self.timeouts, self.communication_failures
        )
    }
}

//! The scan → diff → poll → record → recover control loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sensorbus_framework::Shutdown;
use tracing::{debug, error, info, warn};

use crate::bus::{AddressRange, Bus};
use crate::device::DeviceMap;
use crate::exchange::TimedExchange;
use crate::fault::FaultTally;
use crate::poll::{PollResult, poll_devices};
use crate::recovery::{ControlOutput, FaultRecovery, OutputError, RecoveryError, RecoveryOutcome};
use crate::scanner::scan;
use crate::sink::ReadingSink;
use crate::topology::TopologyDiff;

/// Everything one cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Timestamp shared by every row of this cycle.
    pub timestamp: DateTime<Utc>,
    pub devices: DeviceMap,
    pub topology: TopologyDiff,
    pub readings: PollResult,
    /// Scan and poll faults together.
    pub faults: FaultTally,
    pub recovery: Result<RecoveryOutcome, RecoveryError>,
}

/// Drives the bus through repeated cycles.
pub struct Orchestrator<B, O> {
    exchange: TimedExchange<B>,
    range: AddressRange,
    interval: Duration,
    recovery: FaultRecovery<O>,
    sinks: Vec<Box<dyn ReadingSink>>,
    previous: DeviceMap,
    cycles: u64,
}

impl<B: Bus, O: ControlOutput> Orchestrator<B, O> {
    pub fn new(
        exchange: TimedExchange<B>,
        range: AddressRange,
        interval: Duration,
        recovery: FaultRecovery<O>,
    ) -> Self {
        Self {
            exchange,
            range,
            interval,
            recovery,
            sinks: Vec::new(),
            previous: DeviceMap::new(),
            cycles: 0,
        }
    }

    /// Add a sink receiving every cycle's readings.
    pub fn with_sink(mut self, sink: impl ReadingSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Devices found by the last scan.
    pub fn devices(&self) -> &DeviceMap {
        &self.previous
    }

    /// Switch bus power on before the first cycle.
    pub async fn power_on(&mut self) -> Result<(), OutputError> {
        self.recovery.power_on().await
    }

    /// Run one full cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;
        debug!(cycle, range = %self.range, "Starting cycle");

        if let Err(e) = self.recovery.restore().await {
            error!(cycle, "Bus power is still off: {}", e);
        }

        let scanned = scan(&mut self.exchange, self.range).await;
        let topology = TopologyDiff::compute(&scanned.devices, &self.previous);
        topology.log();

        let polled = poll_devices(&mut self.exchange, &scanned.devices).await;
        let timestamp = Utc::now();

        for sink in &mut self.sinks {
            if let Err(e) = sink.record(timestamp, &polled.readings) {
                error!(sink = sink.name(), error = %e, "Failed to record readings");
            }
        }

        let faults = scanned.faults.merge(polled.faults);
        let recovery = self.recovery.settle(faults).await;
        if let Err(e) = &recovery {
            error!(cycle, "Fault recovery failed: {}", e);
        }

        debug!(
            cycle,
            devices = scanned.devices.len(),
            readings = polled.readings.reading_count(),
            faults = faults.total(),
            "Cycle complete"
        );

        self.previous = scanned.devices.clone();

        CycleReport {
            cycle,
            timestamp,
            devices: scanned.devices,
            topology,
            readings: polled.readings,
            faults,
            recovery,
        }
    }

    /// Run cycles until `shutdown` fires.
    ///
    /// The signal is checked between cycles only; a cycle in progress always
    /// completes.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            "Polling addresses {} every {}s (timeout: {}ms, power control: {})",
            self.range,
            self.interval.as_secs(),
            self.exchange.timeout().as_millis(),
            if self.recovery.is_enabled() { "enabled" } else { "disabled" }
        );

        while !shutdown.is_triggered() {
            let report = self.run_cycle().await;
            if !report.faults.is_clean() {
                warn!(cycle = report.cycle, "Cycle finished with {}", report.faults);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.triggered() => break,
            }
        }

        info!("Poller stopped after {} cycle(s)", self.cycles);
    }
}

//! Change detection between two successive scans.
//!
//! Purely informational: polling always uses the current map.

use tracing::info;

use crate::bus::Address;
use crate::device::{Device, DeviceMap};

/// Sensor set difference for an address present in both scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorChange {
    pub address: Address,
    /// Sensors advertised now but not before, in current order.
    pub added: Vec<String>,
    /// Sensors advertised before but not now, in previous order.
    pub removed: Vec<String>,
}

impl SensorChange {
    /// Whether the sensor sets are identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Classification of every address seen in either scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyDiff {
    pub connected: Vec<Device>,
    pub detached: Vec<Address>,
    /// One entry per address present in both scans, changed or not.
    pub unchanged: Vec<SensorChange>,
}

impl TopologyDiff {
    /// Compare `current` against `previous`.
    pub fn compute(current: &DeviceMap, previous: &DeviceMap) -> Self {
        let mut diff = TopologyDiff::default();

        for device in current {
            match previous.get(device.address()) {
                None => diff.connected.push(device.clone()),
                Some(old) => diff.unchanged.push(SensorChange {
                    address: device.address(),
                    added: missing_from(device.sensors(), old),
                    removed: missing_from(old.sensors(), device),
                }),
            }
        }

        diff.detached = previous
            .addresses()
            .filter(|address| !current.contains(*address))
            .collect();

        diff
    }

    /// Unchanged addresses whose sensor set did change.
    pub fn sensor_changes(&self) -> impl Iterator<Item = &SensorChange> {
        self.unchanged.iter().filter(|c| !c.is_empty())
    }

    /// Whether nothing worth reporting happened.
    pub fn is_quiet(&self) -> bool {
        self.connected.is_empty() && self.detached.is_empty() && self.sensor_changes().count() == 0
    }

    /// One line per address that changed.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for device in &self.connected {
            lines.push(format!(
                "Address {}: Device connected, with sensors: {}",
                device.address(),
                device.sensor_list()
            ));
        }

        for address in &self.detached {
            lines.push(format!("Address {}: Device detached", address));
        }

        for change in self.sensor_changes() {
            let mut parts = Vec::new();
            if !change.added.is_empty() {
                parts.push(format!("added {}", change.added.join("\t")));
            }
            if !change.removed.is_empty() {
                parts.push(format!("removed {}", change.removed.join("\t")));
            }
            lines.push(format!("Address {}: {}", change.address, parts.join(",")));
        }

        lines
    }

    /// Emit [`describe`](Self::describe) to the diagnostic channel.
    pub fn log(&self) {
        for line in self.describe() {
            info!("{}", line);
        }
    }
}

fn missing_from(sensors: &[String], other: &Device) -> Vec<String> {
    sensors
        .iter()
        .filter(|s| !other.has_sensor(s))
        .cloned()
        .collect()
}

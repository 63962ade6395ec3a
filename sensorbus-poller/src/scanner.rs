//! Address-range discovery.

use tracing::{debug, warn};

use crate::bus::{AddressRange, Bus};
use crate::device::{Device, DeviceMap};
use crate::exchange::{DISCOVERY_REQUEST, ExchangeError, TimedExchange};
use crate::fault::FaultTally;

/// Result of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Devices that answered the discovery request.
    pub devices: DeviceMap,
    /// Discovery timeouts.
    pub faults: FaultTally,
}

/// Probe every address in `range` with a discovery request.
///
/// A rejected transfer means nothing lives at that address and is not a
/// fault. A timeout means something acknowledged but never finished its
/// answer; it is reported, counted, and the address is left out of the map.
pub async fn scan<B: Bus>(exchange: &mut TimedExchange<B>, range: AddressRange) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for address in range.iter() {
        match exchange.exchange(address, &[DISCOVERY_REQUEST]).await {
            Ok(response) => {
                let device = Device::from_advertisement(address, &response);
                debug!(
                    address,
                    sensors = device.sensors().len(),
                    "Device answered discovery"
                );
                outcome.devices.insert(device);
            }
            Err(ExchangeError::Bus(e)) => {
                debug!(address, error = %e, "No device at address");
            }
            Err(e @ ExchangeError::Timeout(_)) => {
                warn!(
                    "Timed out reading from address {}. Incorrectly configured device?",
                    address
                );
                outcome.faults.record(&e);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Behaviour, SimBus};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_scan_builds_device_map() {
        let bus = SimBus::new().with_device(8, [("?", Behaviour::reply("tempA\ttempB\t"))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let outcome = scan(&mut exchange, AddressRange::new(8, 9).unwrap()).await;

        assert_eq!(outcome.devices.len(), 1);
        assert_eq!(outcome.devices.get(8).unwrap().sensors(), ["tempA", "tempB"]);
        assert!(outcome.faults.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_never_leaves_range() {
        let bus = SimBus::new()
            .with_device(7, [("?", Behaviour::reply("below"))])
            .with_device(10, [("?", Behaviour::reply("above"))])
            .with_device(9, [("?", Behaviour::reply("inside"))]);
        let probe = bus.clone();
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let outcome = scan(&mut exchange, AddressRange::new(8, 9).unwrap()).await;

        assert_eq!(outcome.devices.addresses().collect::<Vec<_>>(), vec![9]);
        assert!(probe.touched().iter().all(|a| (8..=9).contains(a)));
        assert!(probe.touched().contains(&8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_and_excludes() {
        let bus = SimBus::new()
            .with_device(8, [("?", Behaviour::Stall)])
            .with_device(9, [("?", Behaviour::reply("tempA"))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let outcome = scan(&mut exchange, AddressRange::new(8, 9).unwrap()).await;

        assert!(!outcome.devices.contains(8));
        assert!(outcome.devices.contains(9));
        assert_eq!(outcome.faults.timeouts, 1);
        assert_eq!(outcome.faults.communication_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_without_sensors_is_kept() {
        let bus = SimBus::new().with_device(8, [("?", Behaviour::reply(""))]);
        let mut exchange = TimedExchange::new(bus, TIMEOUT);

        let outcome = scan(&mut exchange, AddressRange::new(8, 8).unwrap()).await;

        assert!(outcome.devices.get(8).unwrap().sensors().is_empty());
    }
}

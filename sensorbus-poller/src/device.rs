//! Device snapshots produced by a scan.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::bus::Address;

/// Separator between sensor names in a discovery response.
pub const SENSOR_DELIMITER: char = '\t';

/// A responsive slave and the sensors it advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    address: Address,
    sensors: Vec<String>,
}

impl Device {
    /// Create a device, dropping empty and repeated sensor names.
    ///
    /// The first occurrence of each name keeps its position.
    pub fn new<I, S>(address: Address, sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for sensor in sensors {
            let sensor = sensor.into();
            if !sensor.is_empty() && !unique.contains(&sensor) {
                unique.push(sensor);
            }
        }

        Self {
            address,
            sensors: unique,
        }
    }

    /// Build a device from its discovery response.
    ///
    /// The response is a tab-separated list of sensor names, possibly with
    /// trailing tabs. An empty response is a device without sensors.
    pub fn from_advertisement(address: Address, response: &[u8]) -> Self {
        let text = String::from_utf8_lossy(response);
        let list = text.trim_end_matches(SENSOR_DELIMITER);
        Self::new(address, list.split(SENSOR_DELIMITER))
    }

    /// Bus address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Advertised sensors, in advertisement order.
    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    /// Whether the device advertised `sensor`.
    pub fn has_sensor(&self, sensor: &str) -> bool {
        self.sensors.iter().any(|s| s == sensor)
    }

    /// Sensor names joined with the advertisement delimiter.
    pub fn sensor_list(&self) -> String {
        self.sensors.join("\t")
    }
}

/// Devices found by one scan, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMap {
    devices: BTreeMap<Address, Device>,
}

impl DeviceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, replacing any previous entry at its address.
    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.address(), device);
    }

    /// Look up the device at `address`.
    pub fn get(&self, address: Address) -> Option<&Device> {
        self.devices.get(&address)
    }

    /// Whether a device was found at `address`.
    pub fn contains(&self, address: Address) -> bool {
        self.devices.contains_key(&address)
    }

    /// Addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.devices.keys().copied()
    }

    /// Devices in address order.
    pub fn iter(&self) -> btree_map::Values<'_, Address, Device> {
        self.devices.values()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device was found.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of sensors across all devices.
    pub fn sensor_count(&self) -> usize {
        self.devices.values().map(|d| d.sensors().len()).sum()
    }
}

impl FromIterator<Device> for DeviceMap {
    fn from_iter<T: IntoIterator<Item = Device>>(iter: T) -> Self {
        let mut map = DeviceMap::new();
        for device in iter {
            map.insert(device);
        }
        map
    }
}

impl<'a> IntoIterator for &'a DeviceMap {
    type Item = &'a Device;
    type IntoIter = btree_map::Values<'a, Address, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

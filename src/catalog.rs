use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status value that marks a device as streaming.
pub const ACTIVE_STATUS: &str = "active";

/// A device whose running config is fetched and indexed.
///
/// Identity is the serial number; `config` is filled in by
/// [`crate::pipeline::populate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub hostname: String,
    pub serial_number: String,
    #[serde(default)]
    pub config: Option<String>,
}

impl Device {
    pub fn new(
        hostname: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            serial_number: serial_number.into(),
            config: None,
        }
    }
}

/// One entry of the device status feed. Any other attributes the feed
/// carries are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub serial_number: String,
    pub hostname: String,
    pub status: String,
}

impl StatusEntry {
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

/// Select the devices to process from a status feed.
///
/// Keeps feed order. Inactive devices are dropped unless
/// `include_inactive` is set. When a serial number appears more than once
/// the later entry replaces the earlier one in place, and a warning names
/// the serial.
pub fn list_devices<I>(feed: I, include_inactive: bool) -> Vec<Device>
where
    I: IntoIterator<Item = StatusEntry>,
{
    let mut entries: Vec<StatusEntry> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in feed {
        if let Some(&pos) = positions.get(&entry.serial_number) {
            tracing::warn!(
                serial = %entry.serial_number,
                previous_status = %entries[pos].status,
                status = %entry.status,
                "duplicate serial number in status feed, keeping the later entry"
            );
            entries[pos] = entry;
        } else {
            positions.insert(entry.serial_number.clone(), entries.len());
            entries.push(entry);
        }
    }

    let total = entries.len();
    let devices: Vec<Device> = entries
        .into_iter()
        .filter(|e| include_inactive || e.is_active())
        .map(|e| Device::new(e.hostname, e.serial_number))
        .collect();

    tracing::info!(
        total,
        selected = devices.len(),
        include_inactive,
        "listed devices"
    );
    devices
}

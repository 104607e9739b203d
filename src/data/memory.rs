//! In-memory reading source

use super::{distinct_devices, filter_and_order, RawReading, ReadingSource};
use crate::error::Result;

/// Reading source over rows already held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReadingSource {
    rows: Vec<RawReading>,
    devices: Option<Vec<String>>,
}

impl MemoryReadingSource {
    /// Create a source; known devices are derived from the rows
    pub fn new(rows: Vec<RawReading>) -> Self {
        Self { rows, devices: None }
    }

    /// Override the known device list (e.g. devices that have no usable rows)
    pub fn with_devices(mut self, devices: Vec<String>) -> Self {
        self.devices = Some(devices);
        self
    }
}

impl ReadingSource for MemoryReadingSource {
    fn fetch_readings(&mut self, min_power: f64) -> Result<Vec<RawReading>> {
        Ok(filter_and_order(self.rows.clone(), min_power))
    }

    fn device_ids(&mut self) -> Result<Vec<String>> {
        Ok(match &self.devices {
            Some(devices) => devices.clone(),
            None => distinct_devices(self.rows.iter().map(|r| r.device_id.as_deref())),
        })
    }
}

//! Historical telemetry access
//!
//! Provides:
//! - [`Reading`] / [`RawReading`] records for the `electricity_monitor` table
//! - The [`ReadingSource`] provider trait with CSV, SQLite and in-memory backends
//! - Global data hygiene ([`imputation`]) and the canonical train/test split ([`split`])

mod csv;
mod memory;
mod sqlite;
pub mod imputation;
pub mod split;

pub use self::csv::CsvReadingSource;
pub use memory::MemoryReadingSource;
pub use sqlite::SqliteReadingSource;
pub use imputation::{impute, ImputationSummary};
pub use split::TrainTestSplit;

use crate::error::Result;
use crate::features::FeatureVector;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Minimum power for a reading to enter training
pub const DEFAULT_MIN_POWER: f64 = 0.5;

/// Timestamp formats accepted from text columns
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A row as stored upstream, before imputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub data_id: i64,
    pub device_id: Option<String>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub energy: Option<f64>,
    pub frequency: Option<f64>,
    pub power_factor: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
}

impl RawReading {
    /// Feature values in contract order
    pub fn feature_values(&self) -> [Option<f64>; 6] {
        [
            self.voltage,
            self.current,
            self.power,
            self.energy,
            self.frequency,
            self.power_factor,
        ]
    }

    /// A complete row with no missing fields
    pub fn complete(
        data_id: i64,
        device_id: &str,
        features: FeatureVector,
        created_at: NaiveDateTime,
    ) -> Self {
        let [voltage, current, power, energy, frequency, power_factor] = features.to_array();
        Self {
            data_id,
            device_id: Some(device_id.to_string()),
            voltage: Some(voltage),
            current: Some(current),
            power: Some(power),
            energy: Some(energy),
            frequency: Some(frequency),
            power_factor: Some(power_factor),
            created_at: Some(created_at),
        }
    }
}

/// A feature-complete reading ready for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub data_id: i64,
    pub device_id: String,
    pub features: FeatureVector,
    pub created_at: NaiveDateTime,
}

/// Supplier of historical readings and known devices
///
/// A source is opened for one training run and closed when the run ends.
pub trait ReadingSource {
    /// Readings with `power > min_power`, newest first
    fn fetch_readings(&mut self, min_power: f64) -> Result<Vec<RawReading>>;

    /// Distinct known device identities
    fn device_ids(&mut self) -> Result<Vec<String>>;

    /// Release the underlying connection or file handle
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Apply the provider contract to rows a backend could not filter itself
pub(crate) fn filter_and_order(mut rows: Vec<RawReading>, min_power: f64) -> Vec<RawReading> {
    rows.retain(|r| r.power.map_or(false, |p| p > min_power));
    // Newest first; rows without a timestamp sort last
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

/// Distinct device ids in first-seen order
pub(crate) fn distinct_devices<'a, I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = Vec::new();
    for id in ids.into_iter().flatten() {
        if !seen.iter().any(|s: &String| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// Parse a timestamp from a text column
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

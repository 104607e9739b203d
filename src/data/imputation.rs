//! Global data hygiene applied once before any per-device split
//!
//! - Missing feature values take the median of that feature over the whole dataset
//! - Missing device ids take the last entry of the known-device list
//! - Missing timestamps take the run's `now`

use super::{RawReading, Reading};
use crate::error::{IdsError, Result};
use crate::features::{FeatureVector, FEATURES, N_FEATURES};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Counts of values filled during imputation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationSummary {
    /// Missing values filled per feature, in contract order
    pub features_filled: [usize; N_FEATURES],
    /// Per-feature medians used as fill values
    pub medians: [f64; N_FEATURES],
    pub device_ids_filled: usize,
    pub timestamps_filled: usize,
    /// Rows dropped because no device id could be recovered
    pub rows_dropped: usize,
}

impl ImputationSummary {
    /// Whether anything was filled or dropped
    pub fn is_clean(&self) -> bool {
        self.features_filled.iter().all(|&n| n == 0)
            && self.device_ids_filled == 0
            && self.timestamps_filled == 0
            && self.rows_dropped == 0
    }
}

/// Median of the present values (average of the middle pair for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Turn raw rows into feature-complete readings
pub fn impute(
    rows: Vec<RawReading>,
    known_devices: &[String],
    now: NaiveDateTime,
) -> Result<(Vec<Reading>, ImputationSummary)> {
    let mut summary = ImputationSummary::default();

    for (j, name) in FEATURES.iter().enumerate() {
        let present: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.feature_values()[j])
            .filter(|v| v.is_finite())
            .collect();

        let has_missing = present.len() < rows.len();
        summary.medians[j] = match median(&present) {
            Some(m) => m,
            None if has_missing => {
                return Err(IdsError::DataError(format!(
                    "Feature '{}' has no values to impute from",
                    name
                )))
            }
            None => 0.0,
        };
    }

    let fallback_device = known_devices.last();
    let mut readings = Vec::with_capacity(rows.len());

    for row in rows {
        let mut values = [0.0; N_FEATURES];
        for (j, value) in row.feature_values().into_iter().enumerate() {
            values[j] = match value.filter(|v| v.is_finite()) {
                Some(v) => v,
                None => {
                    summary.features_filled[j] += 1;
                    summary.medians[j]
                }
            };
        }

        let device_id = match (row.device_id, fallback_device) {
            (Some(id), _) => id,
            (None, Some(fallback)) => {
                summary.device_ids_filled += 1;
                fallback.clone()
            }
            (None, None) => {
                summary.rows_dropped += 1;
                continue;
            }
        };

        let created_at = row.created_at.unwrap_or_else(|| {
            summary.timestamps_filled += 1;
            now
        });

        readings.push(Reading {
            data_id: row.data_id,
            device_id,
            features: FeatureVector::from_array(values),
            created_at,
        });
    }

    if !summary.is_clean() {
        tracing::debug!(
            features_filled = ?summary.features_filled,
            device_ids_filled = summary.device_ids_filled,
            timestamps_filled = summary.timestamps_filled,
            rows_dropped = summary.rows_dropped,
            "Imputed missing values"
        );
    }

    Ok((readings, summary))
}

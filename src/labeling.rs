//! Pseudo-label bootstrapping
//!
//! For each device an Isolation Forest is fitted on that device's rows in the
//! training partition, then every row of the device (train and test) is
//! labeled by the detector: `+1` becomes [`PseudoLabel::Normal`], anything
//! else [`PseudoLabel::Anomaly`]. Devices with no training rows get no
//! detector and no labels.

use crate::anomaly::{AnomalyDetector, IsolationForest, INLIER};
use crate::data::{Reading, TrainTestSplit};
use crate::error::Result;
use crate::features::to_matrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Training target manufactured by the novelty detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PseudoLabel {
    Normal,
    Anomaly,
}

impl PseudoLabel {
    /// All labels in class-index order
    pub const ALL: [PseudoLabel; 2] = [PseudoLabel::Normal, PseudoLabel::Anomaly];

    /// Map a detector output to a label
    pub fn from_detector(output: i32) -> Self {
        if output == INLIER {
            PseudoLabel::Normal
        } else {
            PseudoLabel::Anomaly
        }
    }

    /// Class index used by the classifier
    pub fn class_index(self) -> usize {
        match self {
            PseudoLabel::Normal => 0,
            PseudoLabel::Anomaly => 1,
        }
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PseudoLabel::Normal => "normal",
            PseudoLabel::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for PseudoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted novelty detector bound to one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyModel {
    pub device_id: String,
    pub detector: IsolationForest,
}

/// One labeled row of a device, by index into the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledRow {
    pub index: usize,
    pub label: PseudoLabel,
    pub in_train: bool,
}

/// Bootstrapping output for one device
#[derive(Debug, Clone)]
pub struct DeviceLabels {
    pub device_id: String,
    pub model: NoveltyModel,
    /// Every row of the device, in dataset order
    pub rows: Vec<LabeledRow>,
}

impl DeviceLabels {
    /// Rows in the training partition
    pub fn train_rows(&self) -> impl Iterator<Item = &LabeledRow> {
        self.rows.iter().filter(|r| r.in_train)
    }

    /// Rows in the test partition
    pub fn test_rows(&self) -> impl Iterator<Item = &LabeledRow> {
        self.rows.iter().filter(|r| !r.in_train)
    }

    /// Fraction of training rows labeled anomalous
    pub fn train_anomaly_rate(&self) -> f64 {
        let (n, anomalies) = self.train_rows().fold((0usize, 0usize), |(n, a), r| {
            (n + 1, a + usize::from(r.label == PseudoLabel::Anomaly))
        });
        if n == 0 {
            0.0
        } else {
            anomalies as f64 / n as f64
        }
    }
}

/// Detector hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Fits per-device detectors and assigns pseudo-labels
#[derive(Debug, Clone, Default)]
pub struct LabelBootstrapper {
    config: BootstrapConfig,
}

impl LabelBootstrapper {
    pub fn new(config: BootstrapConfig) -> Self {
        Self { config }
    }

    fn detector(&self) -> IsolationForest {
        IsolationForest::new()
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.max_samples)
            .with_contamination(self.config.contamination)
            .with_seed(self.config.seed)
    }

    /// Label every row of `device_id`; `None` when the device has no training rows
    pub fn bootstrap_labels(
        &self,
        device_id: &str,
        readings: &[Reading],
        split: &TrainTestSplit,
    ) -> Result<Option<DeviceLabels>> {
        let device_rows: Vec<usize> = readings
            .iter()
            .enumerate()
            .filter(|(_, r)| r.device_id == device_id)
            .map(|(i, _)| i)
            .collect();

        let train_rows: Vec<usize> = device_rows
            .iter()
            .copied()
            .filter(|&i| split.is_train(i))
            .collect();

        if train_rows.is_empty() {
            tracing::debug!(
                device_id = %device_id,
                rows = device_rows.len(),
                "No training rows, skipping detector"
            );
            return Ok(None);
        }

        let mut detector = self.detector();
        detector.fit(&to_matrix(train_rows.iter().map(|&i| &readings[i].features)))?;

        let outputs = detector.predict(&to_matrix(device_rows.iter().map(|&i| &readings[i].features)))?;

        let rows: Vec<LabeledRow> = device_rows
            .iter()
            .zip(outputs.iter())
            .map(|(&index, &output)| LabeledRow {
                index,
                label: PseudoLabel::from_detector(output),
                in_train: split.is_train(index),
            })
            .collect();

        let labels = DeviceLabels {
            device_id: device_id.to_string(),
            model: NoveltyModel {
                device_id: device_id.to_string(),
                detector,
            },
            rows,
        };

        tracing::debug!(
            device_id = %device_id,
            rows = labels.rows.len(),
            train_rows = train_rows.len(),
            anomaly_rate = labels.train_anomaly_rate(),
            "Bootstrapped pseudo-labels"
        );

        Ok(Some(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_timestamp;
    use crate::features::FeatureVector;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Box-Muller standard normal
    fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn cluster(device: &str, n: usize, seed: u64) -> Vec<Reading> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ts = parse_timestamp("2024-01-01 00:00:00").unwrap();
        (0..n)
            .map(|i| Reading {
                data_id: i as i64,
                device_id: device.to_string(),
                features: FeatureVector::from_array([
                    230.0 + 2.0 * gaussian(&mut rng),
                    1.2 + 0.05 * gaussian(&mut rng),
                    276.0 + 10.0 * gaussian(&mut rng),
                    12.5 + 0.5 * gaussian(&mut rng),
                    50.0 + 0.1 * gaussian(&mut rng),
                    0.95 + 0.01 * gaussian(&mut rng),
                ]),
                created_at: ts,
            })
            .collect()
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(PseudoLabel::from_detector(1), PseudoLabel::Normal);
        assert_eq!(PseudoLabel::from_detector(-1), PseudoLabel::Anomaly);
        assert_eq!(PseudoLabel::from_detector(0), PseudoLabel::Anomaly);
        assert_eq!(serde_json::to_string(&PseudoLabel::Anomaly).unwrap(), "\"anomaly\"");
        assert_eq!(PseudoLabel::from_class_index(0), Some(PseudoLabel::Normal));
        assert_eq!(PseudoLabel::from_class_index(2), None);
    }

    #[test]
    fn test_anomaly_rate_near_contamination() {
        let readings = cluster("AA:BB", 600, 11);
        let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();

        let labels = LabelBootstrapper::default()
            .bootstrap_labels("AA:BB", &readings, &split)
            .unwrap()
            .unwrap();

        assert_eq!(labels.rows.len(), 600);
        let rate = labels.train_anomaly_rate();
        assert!((0.07..=0.13).contains(&rate), "anomaly rate {}", rate);
    }

    #[test]
    fn test_labels_cover_train_and_test_rows() {
        let mut readings = cluster("AA:BB", 60, 1);
        readings.extend(cluster("CC:DD", 40, 2));
        let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();

        let labels = LabelBootstrapper::default()
            .bootstrap_labels("CC:DD", &readings, &split)
            .unwrap()
            .unwrap();

        assert_eq!(labels.rows.len(), 40);
        assert!(labels.rows.iter().all(|r| readings[r.index].device_id == "CC:DD"));
        assert!(labels.test_rows().count() > 0);
        assert!(labels.train_rows().count() > 0);
    }

    #[test]
    fn test_device_without_training_rows_is_skipped() {
        let readings = cluster("AA:BB", 30, 3);
        let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();

        let out = LabelBootstrapper::default()
            .bootstrap_labels("EE:FF", &readings, &split)
            .unwrap();
        assert!(out.is_none());
    }
}

//! Per-device classifier training

use super::random_forest::RandomForest;
use crate::data::Reading;
use crate::error::{IdsError, Result};
use crate::features::{to_matrix, FeatureVector, FEATURES};
use crate::labeling::{DeviceLabels, PseudoLabel};
use serde::{Deserialize, Serialize};

/// Random Forest bound to one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceClassifier {
    pub device_id: String,
    pub forest: RandomForest,
    /// Number of training rows the forest saw
    pub n_train: usize,
}

impl DeviceClassifier {
    /// Label one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<PseudoLabel> {
        let class = self
            .forest
            .predict(&features.to_row())?
            .first()
            .copied()
            .ok_or_else(|| IdsError::TrainingError("Classifier returned no prediction".to_string()))?;

        PseudoLabel::from_class_index(class).ok_or_else(|| {
            IdsError::TrainingError(format!("Classifier produced unknown class {}", class))
        })
    }

    /// Label many feature vectors
    pub fn predict_many<'a, I>(&self, rows: I) -> Result<Vec<PseudoLabel>>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let x = to_matrix(rows);
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        self.forest
            .predict(&x)?
            .into_iter()
            .map(|c| {
                PseudoLabel::from_class_index(c).ok_or_else(|| {
                    IdsError::TrainingError(format!("Classifier produced unknown class {}", c))
                })
            })
            .collect()
    }

    /// Feature importances paired with their contract names
    pub fn feature_importances(&self) -> Vec<(&'static str, f64)> {
        match self.forest.feature_importances() {
            Some(imp) => FEATURES.iter().copied().zip(imp.iter().copied()).collect(),
            None => FEATURES.iter().map(|&f| (f, 0.0)).collect(),
        }
    }
}

/// Result of training one device
#[derive(Debug, Clone)]
pub enum TrainOutcome {
    Trained(DeviceClassifier),
    /// Not enough history; no artifact is produced
    Skipped { reason: String },
}

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
        }
    }
}

/// Fits one classifier per device from pseudo-labeled training rows
#[derive(Debug, Clone, Default)]
pub struct ClassifierTrainer {
    config: ClassifierConfig,
}

impl ClassifierTrainer {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Fit on `(features, label)` pairs; an empty slice is a skip, not an error
    pub fn train_classifier(
        &self,
        device_id: &str,
        features: &[FeatureVector],
        labels: &[PseudoLabel],
    ) -> Result<TrainOutcome> {
        if features.is_empty() || labels.is_empty() {
            return Ok(TrainOutcome::Skipped {
                reason: format!("no training rows for device {}", device_id),
            });
        }
        if features.len() != labels.len() {
            return Err(IdsError::ShapeError {
                expected: format!("{} labels", features.len()),
                actual: format!("{} labels", labels.len()),
            });
        }

        let x = to_matrix(features);
        let y: Vec<usize> = labels.iter().map(|l| l.class_index()).collect();

        let mut forest = RandomForest::new(self.config.n_estimators)
            .with_random_state(self.config.seed);
        forest.fit(&x, &y, PseudoLabel::ALL.len())?;

        Ok(TrainOutcome::Trained(DeviceClassifier {
            device_id: device_id.to_string(),
            forest,
            n_train: features.len(),
        }))
    }

    /// Train on the training partition of a bootstrapped device
    pub fn train_device(&self, readings: &[Reading], labels: &DeviceLabels) -> Result<TrainOutcome> {
        let (features, targets): (Vec<FeatureVector>, Vec<PseudoLabel>) = labels
            .train_rows()
            .map(|row| (readings[row.index].features, row.label))
            .unzip();
        self.train_classifier(&labels.device_id, &features, &targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> (Vec<FeatureVector>, Vec<PseudoLabel>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let v = 230.0 + (i % 5) as f64 * 0.1;
            features.push(FeatureVector::from_array([v, 1.2, 276.0, 12.5, 50.0, 0.98]));
            labels.push(PseudoLabel::Normal);
        }
        for _ in 0..3 {
            features.push(FeatureVector::from_array([180.0, 9.0, 1600.0, 12.5, 47.0, 0.4]));
            labels.push(PseudoLabel::Anomaly);
        }
        (features, labels)
    }

    #[test]
    fn test_train_and_predict() {
        let (features, labels) = vectors();
        let outcome = ClassifierTrainer::default()
            .train_classifier("AA:BB", &features, &labels)
            .unwrap();

        let TrainOutcome::Trained(classifier) = outcome else {
            panic!("expected a trained classifier");
        };
        assert_eq!(classifier.n_train, 23);
        assert_eq!(classifier.predict(&features[0]).unwrap(), PseudoLabel::Normal);
        assert_eq!(classifier.predict(&features[21]).unwrap(), PseudoLabel::Anomaly);

        let importances = classifier.feature_importances();
        assert_eq!(importances.len(), FEATURES.len());
        let total: f64 = importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_slice_is_skipped() {
        let outcome = ClassifierTrainer::default()
            .train_classifier("AA:BB", &[], &[])
            .unwrap();
        assert!(matches!(outcome, TrainOutcome::Skipped { .. }));
    }

    #[test]
    fn test_mismatched_labels_is_an_error() {
        let (features, labels) = vectors();
        let result = ClassifierTrainer::default().train_classifier("AA:BB", &features, &labels[..5]);
        assert!(matches!(result, Err(IdsError::ShapeError { .. })));
    }
}

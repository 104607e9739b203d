//! Training run configuration

use crate::data::DEFAULT_MIN_POWER;
use crate::error::{IdsError, Result};
use crate::labeling::BootstrapConfig;
use crate::training::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hyperparameters for one training run
///
/// Missing fields in a JSON config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Expected fraction of anomalies per device, in `(0, 0.5]`
    pub contamination: f64,

    /// Trees in each novelty detector
    pub detector_estimators: usize,

    /// Sub-sample size per detector tree (capped at the device's row count)
    pub detector_max_samples: usize,

    /// Trees in each classifier
    pub classifier_estimators: usize,

    /// Seed shared by the split, the detector and the classifier
    pub seed: u64,

    /// Fraction of the dataset held out as the test partition
    pub test_size: f64,

    /// Readings at or below this power are not fetched
    pub min_power: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            detector_estimators: 100,
            detector_max_samples: 256,
            classifier_estimators: 100,
            seed: 42,
            test_size: 0.33,
            min_power: DEFAULT_MIN_POWER,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file and validate
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IdsError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            IdsError::ConfigError(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_detector_estimators(mut self, n: usize) -> Self {
        self.detector_estimators = n;
        self
    }

    pub fn with_detector_max_samples(mut self, n: usize) -> Self {
        self.detector_max_samples = n;
        self
    }

    pub fn with_classifier_estimators(mut self, n: usize) -> Self {
        self.classifier_estimators = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_min_power(mut self, min_power: f64) -> Self {
        self.min_power = min_power;
        self
    }

    /// Check ranges before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(IdsError::ConfigError(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(IdsError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.detector_estimators == 0 || self.classifier_estimators == 0 {
            return Err(IdsError::ConfigError(
                "estimator counts must be at least 1".to_string(),
            ));
        }
        if self.detector_max_samples == 0 {
            return Err(IdsError::ConfigError(
                "detector_max_samples must be at least 1".to_string(),
            ));
        }
        if !self.min_power.is_finite() {
            return Err(IdsError::ConfigError("min_power must be finite".to_string()));
        }
        Ok(())
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            contamination: self.contamination,
            n_estimators: self.detector_estimators,
            max_samples: self.detector_max_samples,
            seed: self.seed,
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            n_estimators: self.classifier_estimators,
            seed: self.seed,
        }
    }
}

//! End-to-end training run
//!
//! `open source → fetch → impute → split → per device (bootstrap, train,
//! persist, score held-out rows) → close source`. Devices are trained in
//! parallel and write disjoint keys; a failing device is recorded in the
//! report and never aborts the others. Device ids that differ only in ways
//! the artifact key erases (e.g. `aa:bb` and `AA:BB`) would share keys, so
//! all of them fail and none is persisted.

use crate::config::PipelineConfig;
use crate::data::{impute, ImputationSummary, RawReading, Reading, ReadingSource, TrainTestSplit};
use crate::error::Result;
use crate::labeling::{DeviceLabels, LabelBootstrapper, PseudoLabel};
use crate::store::{sanitize_device_id, ModelStore};
use crate::training::{ClassifierTrainer, DeviceClassifier, TrainOutcome};
use chrono::{NaiveDateTime, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// What happened to one device during a run
#[derive(Debug, Clone)]
pub enum DeviceOutcome {
    Trained {
        device_id: String,
        /// Feature importances in contract order
        importances: Vec<(&'static str, f64)>,
        n_train: usize,
        n_test: usize,
        /// Fraction of training rows the detector labeled anomalous
        train_anomaly_rate: f64,
        /// Fraction of test rows where the classifier reproduces the
        /// pseudo-label; `None` when the device has no test rows
        holdout_agreement: Option<f64>,
        novelty_key: String,
        classifier_key: String,
    },
    Skipped {
        device_id: String,
        reason: String,
    },
    Failed {
        device_id: String,
        error: String,
    },
}

impl DeviceOutcome {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceOutcome::Trained { device_id, .. }
            | DeviceOutcome::Skipped { device_id, .. }
            | DeviceOutcome::Failed { device_id, .. } => device_id,
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, DeviceOutcome::Trained { .. })
    }
}

/// Summary of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// One entry per known device, in provider order
    pub outcomes: Vec<DeviceOutcome>,
    pub imputation: ImputationSummary,
    pub n_readings: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub elapsed_secs: f64,
}

impl TrainingReport {
    fn count(&self, pred: impl Fn(&DeviceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|&o| pred(o)).count()
    }

    pub fn n_trained(&self) -> usize {
        self.count(DeviceOutcome::is_trained)
    }

    pub fn n_skipped(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::Skipped { .. }))
    }

    pub fn n_failed(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::Failed { .. }))
    }
}

/// Orchestrates training for every known device
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    bootstrapper: LabelBootstrapper,
    trainer: ClassifierTrainer,
}

impl TrainingPipeline {
    /// Create a pipeline; the config is validated up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bootstrapper: LabelBootstrapper::new(config.bootstrap_config()),
            trainer: ClassifierTrainer::new(config.classifier_config()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run against a provider; the provider is closed before returning
    pub fn run(&self, mut source: Box<dyn ReadingSource>, store: &dyn ModelStore) -> Result<TrainingReport> {
        let fetched = fetch(source.as_mut(), self.config.min_power);
        source.close()?;
        let (rows, devices) = fetched?;
        self.run_rows(rows, &devices, store, Utc::now().naive_utc())
    }

    /// Run against rows already fetched; `now` fills missing timestamps
    pub fn run_rows(
        &self,
        rows: Vec<RawReading>,
        devices: &[String],
        store: &dyn ModelStore,
        now: NaiveDateTime,
    ) -> Result<TrainingReport> {
        let start = Instant::now();

        let (readings, imputation) = impute(rows, devices, now)?;
        if !imputation.is_clean() {
            tracing::debug!(summary = ?imputation, "Imputed missing values");
        }

        let split = TrainTestSplit::new(readings.len(), self.config.test_size, self.config.seed)?;
        tracing::info!(
            readings = readings.len(),
            devices = devices.len(),
            train = split.train_indices().len(),
            test = split.test_indices().len(),
            "Training started"
        );

        let mut seen = HashSet::new();
        let devices: Vec<&String> = devices.iter().filter(|d| seen.insert(d.as_str())).collect();
        let mut by_key: HashMap<String, Vec<&str>> = HashMap::new();
        for device_id in &devices {
            by_key
                .entry(sanitize_device_id(device_id))
                .or_default()
                .push(device_id.as_str());
        }

        let outcomes: Vec<DeviceOutcome> = devices
            .par_iter()
            .map(|&device_id| {
                let key = sanitize_device_id(device_id);
                let group = by_key.get(&key).map(Vec::as_slice).unwrap_or_default();
                if group.len() > 1 {
                    let others: Vec<&str> = group
                        .iter()
                        .copied()
                        .filter(|d| *d != device_id.as_str())
                        .collect();
                    tracing::error!(device_id = %device_id, others = ?others, "Device id collides on artifact key");
                    return DeviceOutcome::Failed {
                        device_id: device_id.clone(),
                        error: format!("device id collides with {} on key {}", others.join(", "), key),
                    };
                }
                self.train_device(device_id, &readings, &split, store)
                    .unwrap_or_else(|e| {
                        tracing::error!(device_id = %device_id, error = %e, "Device training failed");
                        DeviceOutcome::Failed {
                            device_id: device_id.clone(),
                            error: e.to_string(),
                        }
                    })
            })
            .collect();

        let report = TrainingReport {
            outcomes,
            imputation,
            n_readings: readings.len(),
            n_train: split.train_indices().len(),
            n_test: split.test_indices().len(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            trained = report.n_trained(),
            skipped = report.n_skipped(),
            failed = report.n_failed(),
            elapsed_secs = report.elapsed_secs,
            "Training finished"
        );
        Ok(report)
    }

    fn train_device(
        &self,
        device_id: &str,
        readings: &[Reading],
        split: &TrainTestSplit,
        store: &dyn ModelStore,
    ) -> Result<DeviceOutcome> {
        let labels = match self.bootstrapper.bootstrap_labels(device_id, readings, split)? {
            Some(labels) => labels,
            None => {
                tracing::info!(device_id = %device_id, "No training rows, skipping");
                return Ok(DeviceOutcome::Skipped {
                    device_id: device_id.to_string(),
                    reason: "no training rows".to_string(),
                });
            }
        };

        let classifier = match self.trainer.train_device(readings, &labels)? {
            TrainOutcome::Trained(classifier) => classifier,
            TrainOutcome::Skipped { reason } => {
                tracing::info!(device_id = %device_id, reason = %reason, "Classifier skipped");
                return Ok(DeviceOutcome::Skipped {
                    device_id: device_id.to_string(),
                    reason,
                });
            }
        };

        let holdout_agreement = holdout_agreement(&classifier, readings, &labels)?;
        let (novelty_key, classifier_key) = store.save_pair(&labels.model, &classifier)?;

        tracing::info!(
            device_id = %device_id,
            n_train = classifier.n_train,
            anomaly_rate = labels.train_anomaly_rate(),
            holdout_agreement = ?holdout_agreement,
            "Device trained"
        );

        Ok(DeviceOutcome::Trained {
            device_id: device_id.to_string(),
            importances: classifier.feature_importances(),
            n_train: classifier.n_train,
            n_test: labels.test_rows().count(),
            train_anomaly_rate: labels.train_anomaly_rate(),
            holdout_agreement,
            novelty_key,
            classifier_key,
        })
    }
}

fn fetch(source: &mut dyn ReadingSource, min_power: f64) -> Result<(Vec<RawReading>, Vec<String>)> {
    let rows = source.fetch_readings(min_power)?;
    let devices = source.device_ids()?;
    Ok((rows, devices))
}

/// Share of the device's test rows whose prediction matches the pseudo-label
fn holdout_agreement(
    classifier: &DeviceClassifier,
    readings: &[Reading],
    labels: &DeviceLabels,
) -> Result<Option<f64>> {
    let test: Vec<(usize, PseudoLabel)> = labels.test_rows().map(|r| (r.index, r.label)).collect();
    if test.is_empty() {
        return Ok(None);
    }
    let predicted = classifier.predict_many(test.iter().map(|&(i, _)| &readings[i].features))?;
    let agree = predicted
        .iter()
        .zip(&test)
        .filter(|(p, (_, label))| *p == label)
        .count();
    Ok(Some(agree as f64 / test.len() as f64))
}

//! energy-ids - Per-device anomaly detection for electricity telemetry
//!
//! Training builds two models per device: an Isolation Forest that
//! manufactures `normal`/`anomaly` pseudo-labels from unlabeled history, and a
//! Random Forest trained on those labels. Inference loads a device's
//! classifier and labels one reading.
//!
//! # Modules
//!
//! ## Data
//! - [`features`] - The six-field feature contract
//! - [`data`] - Reading sources (CSV, SQLite, memory), imputation, train/test split
//!
//! ## Models
//! - [`anomaly`] - Isolation Forest novelty detection
//! - [`labeling`] - Per-device pseudo-label bootstrapping
//! - [`training`] - Decision trees, Random Forests, per-device classifiers
//!
//! ## Runtime
//! - [`store`] - Model artifact storage keyed by device
//! - [`inference`] - Single-reading prediction
//! - [`pipeline`] - End-to-end training run
//! - [`config`] - Training run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod features;
pub mod data;

// Models
pub mod anomaly;
pub mod labeling;
pub mod training;

// Runtime
pub mod store;
pub mod inference;
pub mod pipeline;
pub mod config;

// Services
pub mod cli;

pub use error::{IdsError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{IdsError, Result};

    // Data
    pub use crate::features::{FeatureVector, FEATURES};
    pub use crate::data::{
        CsvReadingSource, MemoryReadingSource, RawReading, Reading, ReadingSource,
        SqliteReadingSource, TrainTestSplit,
    };

    // Models
    pub use crate::anomaly::{AnomalyDetector, IsolationForest};
    pub use crate::labeling::{LabelBootstrapper, NoveltyModel, PseudoLabel};
    pub use crate::training::{ClassifierTrainer, DeviceClassifier, RandomForest, TrainOutcome};

    // Storage and inference
    pub use crate::store::{artifact_key, FileModelStore, MemoryModelStore, ModelKind, ModelStore};
    pub use crate::inference::{InferenceEngine, PredictRequest, PredictionResult};

    // Pipeline
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{DeviceOutcome, TrainingPipeline, TrainingReport};
}

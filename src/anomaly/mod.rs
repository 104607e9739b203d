//! Unsupervised novelty detection
//!
//! Detectors follow the `+1` inlier / `-1` outlier convention.

mod isolation_forest;

pub use isolation_forest::{average_path_length, IsolationForest, IsolationTree};

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Detector output for a normal sample
pub const INLIER: i32 = 1;
/// Detector output for an anomalous sample
pub const OUTLIER: i32 = -1;

/// Trait for novelty detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit on unlabeled samples
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Anomaly score per sample, higher means more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// `INLIER` or `OUTLIER` per sample
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Score threshold learned during fit
    fn threshold(&self) -> Option<f64>;
}

//! Isolation Forest novelty detection

use crate::error::{IdsError, Result};
use crate::anomaly::{AnomalyDetector, INLIER, OUTLIER};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Euler–Mascheroni constant used by the harmonic-number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Random axis-aligned split
    Internal {
        feature: usize,
        threshold: f64,
        /// Samples with `x[feature] < threshold`
        left: Box<IsolationTree>,
        right: Box<IsolationTree>,
    },
    /// Leaf holding the number of samples that reached it
    External { size: usize },
}

impl IsolationTree {
    /// Grow a tree over `indices` until isolation or `max_height`
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();
        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        // Only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (lo, hi) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
                );
                (hi - lo > 1e-10).then_some((feature, lo, hi))
            })
            .collect();

        let Some(&(feature, lo, hi)) = candidates.choose(rng) else {
            return IsolationTree::External { size: n_samples };
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        IsolationTree::Internal {
            feature,
            threshold,
            left: Box::new(Self::build(x, &left_indices, height + 1, max_height, rng)),
            right: Box::new(Self::build(x, &right_indices, height + 1, max_height, rng)),
        }
    }

    /// Depth at which `sample` is isolated, corrected for unsplit leaves
    pub fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                IsolationTree::External { size } => return depth + average_path_length(*size),
                IsolationTree::Internal { feature, threshold, left, right } => {
                    node = if sample[*feature] < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
///
/// c(n) = 2 H(n-1) - 2(n-1)/n, with H approximated by ln + Euler's constant.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile (`q` in [0, 1]) of unsorted values
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Isolation Forest novelty detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    /// Expected proportion of outliers in the fit data
    contamination: f64,
    seed: u64,
    trees: Vec<IsolationTree>,
    /// Anomaly score above which a sample is an outlier
    threshold: Option<f64>,
    /// Sub-sample size each tree was grown on
    samples_per_tree: usize,
    n_features: usize,
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
            trees: Vec::new(),
            threshold: None,
            samples_per_tree: 0,
            n_features: 0,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set maximum sub-sample size per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(1);
        self
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(IdsError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(IdsError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        // A single-sample fit has c(n) = 0; every sample is then equally normal
        let c_n = average_path_length(self.samples_per_tree).max(f64::EPSILON);
        let n_trees = self.trees.len() as f64;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mean_path: f64 =
                    self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                // s(x, n) = 2^(-E[h(x)] / c(n))
                2.0_f64.powf(-mean_path / c_n)
            })
            .collect())
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(IdsError::ValidationError(
                "Cannot fit an isolation forest on zero samples".to_string(),
            ));
        }

        let samples_per_tree = self.max_samples.min(n_samples);
        let max_height = (samples_per_tree as f64).log2().ceil().max(1.0) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                // Sub-sample without replacement
                let indices = rand::seq::index::sample(&mut rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut rng)
            })
            .collect();
        self.samples_per_tree = samples_per_tree;
        self.n_features = x.ncols();

        let scores = self.compute_scores(x)?;
        let scores: Vec<f64> = scores.to_vec();
        self.threshold = Some(percentile(&scores, 1.0 - self.contamination));

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let threshold = self.threshold.ok_or(IdsError::ModelNotFitted)?;
        let scores = self.score_samples(x)?;
        Ok(scores.mapv(|s| if s > threshold { OUTLIER } else { INLIER }))
    }

    fn threshold(&self) -> Option<f64> {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outliers() -> Array2<f64> {
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 10) + 1) as f64);
        }
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);
        Array2::from_shape_vec((52, 2), data).unwrap()
    }

    #[test]
    fn test_isolation_forest_basic() {
        let x = cluster_with_outliers();
        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.05)
            .with_seed(42);
        iforest.fit(&x).unwrap();

        let scores = iforest.score_samples(&x).unwrap();
        let labels = iforest.predict(&x).unwrap();

        assert!(scores[50] > scores[0]);
        assert!(scores[51] > scores[0]);
        assert_eq!(labels[50], OUTLIER);
        assert_eq!(labels[51], OUTLIER);
        assert!(labels.iter().all(|&l| l == INLIER || l == OUTLIER));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let x = cluster_with_outliers();
        let mut a = IsolationForest::new().with_seed(7);
        let mut b = IsolationForest::new().with_seed(7);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.threshold(), b.threshold());
    }

    #[test]
    fn test_fit_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 2));
        let mut iforest = IsolationForest::new();
        assert!(iforest.fit(&x).is_err());
    }

    #[test]
    fn test_single_sample_is_inlier() {
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        let mut iforest = IsolationForest::new();
        iforest.fit(&x).unwrap();
        assert_eq!(iforest.predict(&x).unwrap()[0], INLIER);
    }

    #[test]
    fn test_constant_data_is_all_inliers() {
        let x = Array2::from_elem((20, 3), 5.0);
        let mut iforest = IsolationForest::new();
        iforest.fit(&x).unwrap();
        assert!(iforest.predict(&x).unwrap().iter().all(|&l| l == INLIER));
    }

    #[test]
    fn test_predict_before_fit() {
        let iforest = IsolationForest::new();
        let x = Array2::from_elem((1, 2), 1.0);
        assert!(matches!(iforest.predict(&x), Err(IdsError::ModelNotFitted)));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }
}

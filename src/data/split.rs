//! Canonical train/test partition
//!
//! One seeded shuffle over the whole dataset, computed before per-device
//! iteration and shared by label bootstrapping and classifier training.

use crate::error::{IdsError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row-index partition of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    /// Per-row membership, `true` when the row is in the training partition
    in_train: Vec<bool>,
    train: Vec<usize>,
    test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `n_samples` indices and hold out `ceil(test_size * n)` of them
    pub fn new(n_samples: usize, test_size: f64, seed: u64) -> Result<Self> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(IdsError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n_samples as f64) * test_size).ceil() as usize;
        let n_test = n_test.min(n_samples);
        let (test, train) = indices.split_at(n_test);

        let mut in_train = vec![false; n_samples];
        for &i in train {
            in_train[i] = true;
        }

        let mut train = train.to_vec();
        let mut test = test.to_vec();
        train.sort_unstable();
        test.sort_unstable();

        Ok(Self { in_train, train, test })
    }

    /// Whether row `index` belongs to the training partition
    pub fn is_train(&self, index: usize) -> bool {
        self.in_train.get(index).copied().unwrap_or(false)
    }

    /// Training row indices, ascending
    pub fn train_indices(&self) -> &[usize] {
        &self.train
    }

    /// Test row indices, ascending
    pub fn test_indices(&self) -> &[usize] {
        &self.test
    }

    pub fn len(&self) -> usize {
        self.in_train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_train.is_empty()
    }
}

//! Supervised training
//!
//! Provides:
//! - CART classification trees and Random Forests
//! - Per-device classifier training on pseudo-labeled rows

pub mod decision_tree;
pub mod random_forest;
mod trainer;

pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::RandomForest;
pub use trainer::{ClassifierConfig, ClassifierTrainer, DeviceClassifier, TrainOutcome};

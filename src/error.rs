//! Error types for the energy-ids pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IdsError>;

/// Main error type for training, storage and inference
#[derive(Error, Debug)]
pub enum IdsError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Artifact not found: {key}")]
    ArtifactNotFound { key: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl IdsError {
    /// Short machine-readable tag used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            IdsError::DataError(_) => "data_error",
            IdsError::ValidationError(_) => "validation_error",
            IdsError::ArtifactNotFound { .. } => "artifact_not_found",
            IdsError::TrainingError(_) => "training_error",
            IdsError::ModelNotFitted => "model_not_fitted",
            IdsError::ShapeError { .. } => "shape_error",
            IdsError::ConfigError(_) => "config_error",
            IdsError::IoError(_) => "io_error",
            IdsError::SerializationError(_) => "serialization_error",
        }
    }
}

impl From<polars::error::PolarsError> for IdsError {
    fn from(err: polars::error::PolarsError) -> Self {
        IdsError::DataError(err.to_string())
    }
}

impl From<rusqlite::Error> for IdsError {
    fn from(err: rusqlite::Error) -> Self {
        IdsError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for IdsError {
    fn from(err: serde_json::Error) -> Self {
        IdsError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for IdsError {
    fn from(err: bincode::Error) -> Self {
        IdsError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for IdsError {
    fn from(err: ndarray::ShapeError) -> Self {
        IdsError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

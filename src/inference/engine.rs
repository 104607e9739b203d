//! Inference engine implementation

use super::{PredictRequest, PredictionResult};
use crate::error::{IdsError, Result};
use crate::features::FeatureVector;
use crate::store::ModelStore;
use std::time::Instant;

/// Labels single readings with the classifier persisted for their device
///
/// Holds no model state of its own; each call loads the artifact from the
/// store, so re-training is picked up without a restart.
#[derive(Debug)]
pub struct InferenceEngine<S: ModelStore> {
    store: S,
}

impl<S: ModelStore> InferenceEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Label one feature vector for `device_id`
    pub fn predict(&self, device_id: &str, features: &FeatureVector) -> Result<PredictionResult> {
        if device_id.trim().is_empty() {
            return Err(IdsError::ValidationError("device_id must not be empty".to_string()));
        }
        features.validate()?;

        let start = Instant::now();
        let artifact = self.store.load_classifier(device_id)?;
        let label = artifact.model.predict(features)?;

        tracing::debug!(
            device_id = %device_id,
            label = %label,
            trained_at = %artifact.trained_at,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );

        Ok(PredictionResult::new(features, label))
    }

    /// Parse a JSON request, predict, and render the JSON response body
    pub fn handle_request(&self, input: &str) -> Result<String> {
        let request = PredictRequest::from_json(input)?;
        self.predict(&request.device_id, &request.data)?.to_response()
    }
}

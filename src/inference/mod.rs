//! Single-sample inference
//!
//! Provides:
//! - [`PredictRequest`] parsing with strict validation of the feature contract
//! - [`InferenceEngine`] that loads a device's classifier and labels one reading
//! - [`PredictionResult`], serialized as the rounded features plus `label`

mod engine;

pub use engine::InferenceEngine;

use crate::error::{IdsError, Result};
use crate::features::{FeatureVector, FEATURES};
use crate::labeling::PseudoLabel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inference request as read from the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub device_id: String,
    pub data: FeatureVector,
}

impl PredictRequest {
    /// Parse and validate a raw JSON request
    ///
    /// Extra fields are ignored. A missing or non-numeric feature, or a
    /// missing or empty `device_id`, is a [`IdsError::ValidationError`].
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| IdsError::ValidationError(format!("Request is not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| IdsError::ValidationError("Request must be a JSON object".to_string()))?;

        let device_id = match object.get("device_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::String(_)) => {
                return Err(IdsError::ValidationError("device_id must not be empty".to_string()))
            }
            Some(_) => {
                return Err(IdsError::ValidationError("device_id must be a string".to_string()))
            }
            None => return Err(IdsError::ValidationError("device_id is required".to_string())),
        };

        let data = object
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| IdsError::ValidationError("data must be a JSON object".to_string()))?;

        let mut values = [0.0; FEATURES.len()];
        for (slot, name) in values.iter_mut().zip(FEATURES) {
            *slot = match data.get(name) {
                Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
                    IdsError::ValidationError(format!("{} is not representable as f64", name))
                })?,
                Some(other) => {
                    return Err(IdsError::ValidationError(format!(
                        "{} must be a number, got {}",
                        name, other
                    )))
                }
                None => return Err(IdsError::ValidationError(format!("{} is required", name))),
            };
        }

        Ok(Self {
            device_id,
            data: FeatureVector::from_array(values),
        })
    }
}

/// Rounded feature vector plus the assigned label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(flatten)]
    pub features: FeatureVector,
    pub label: PseudoLabel,
}

impl PredictionResult {
    pub fn new(features: &FeatureVector, label: PseudoLabel) -> Self {
        Self {
            features: features.rounded(),
            label,
        }
    }

    /// Response body: a JSON array holding this single result
    pub fn to_response(&self) -> Result<String> {
        Ok(serde_json::to_string(&[self])?)
    }
}

/// Error body written in place of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&IdsError> for ErrorResponse {
    fn from(err: &IdsError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"device_id":"AA:BB:CC:DD:EE:FF","data":{"voltage":230.0,"current":1.2,
        "power":276.0,"energy":12.5,"frequency":50.0,"power_factor":0.98,"note":"x"}}"#;

    #[test]
    fn test_parse_valid_request() {
        let req = PredictRequest::from_json(VALID).unwrap();
        assert_eq!(req.device_id, "AA:BB:CC:DD:EE:FF");
        assert_eq!(req.data.power_factor, 0.98);
    }

    #[test]
    fn test_missing_feature() {
        let input = r#"{"device_id":"A","data":{"voltage":230.0,"current":1.2,"power":276.0,
            "energy":12.5,"frequency":50.0}}"#;
        let err = PredictRequest::from_json(input).unwrap_err();
        assert!(matches!(err, IdsError::ValidationError(ref m) if m.contains("power_factor")));
    }

    #[test]
    fn test_non_numeric_feature() {
        let input = r#"{"device_id":"A","data":{"voltage":"230","current":1.2,"power":276.0,
            "energy":12.5,"frequency":50.0,"power_factor":0.98}}"#;
        assert!(matches!(
            PredictRequest::from_json(input),
            Err(IdsError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_device_id() {
        let input = r#"{"data":{"voltage":230.0}}"#;
        assert!(matches!(
            PredictRequest::from_json(input),
            Err(IdsError::ValidationError(ref m)) if m.contains("device_id")
        ));
        assert!(PredictRequest::from_json(r#"{"device_id":" ","data":{}}"#).is_err());
        assert!(PredictRequest::from_json("not json").is_err());
    }

    #[test]
    fn test_result_serialization() {
        let f = FeatureVector::from_array([230.004, 1.2, 276.0, 12.5, 50.0, 0.981]);
        let body = PredictionResult::new(&f, PseudoLabel::Normal).to_response().unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();

        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["voltage"], 230.0);
        assert_eq!(rows[0]["power_factor"], 0.98);
        assert_eq!(rows[0]["label"], "normal");
    }
}

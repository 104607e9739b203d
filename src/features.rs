//! Feature contract shared by training and inference
//!
//! Both phases operate on the same six measurements, always in the order
//! given by [`FEATURES`]. Wire payloads are matched by name, so field order
//! in JSON does not matter.

use crate::error::{IdsError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Ordered feature names
pub const FEATURES: [&str; 6] = [
    "voltage",
    "current",
    "power",
    "energy",
    "frequency",
    "power_factor",
];

/// Number of features in the contract
pub const N_FEATURES: usize = FEATURES.len();

/// One electrical measurement vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

impl FeatureVector {
    /// Build from values in contract order
    pub fn from_array(values: [f64; N_FEATURES]) -> Self {
        let [voltage, current, power, energy, frequency, power_factor] = values;
        Self {
            voltage,
            current,
            power,
            energy,
            frequency,
            power_factor,
        }
    }

    /// Values in contract order
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.voltage,
            self.current,
            self.power,
            self.energy,
            self.frequency,
            self.power_factor,
        ]
    }

    /// Single-row design matrix
    pub fn to_row(&self) -> Array2<f64> {
        let values = self.to_array();
        Array2::from_shape_fn((1, N_FEATURES), |(_, j)| values[j])
    }

    /// Every field rounded to 2 decimal places
    pub fn rounded(&self) -> Self {
        let mut values = self.to_array();
        for v in &mut values {
            *v = round2(*v);
        }
        Self::from_array(values)
    }

    /// Reject non-finite or negative measurements
    pub fn validate(&self) -> Result<()> {
        for (name, value) in FEATURES.iter().zip(self.to_array()) {
            if !value.is_finite() {
                return Err(IdsError::ValidationError(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
            if value < 0.0 {
                return Err(IdsError::ValidationError(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Stack feature vectors into an `n x 6` matrix
pub fn to_matrix<'a, I>(rows: I) -> Array2<f64>
where
    I: IntoIterator<Item = &'a FeatureVector>,
{
    let rows: Vec<[f64; N_FEATURES]> = rows.into_iter().map(FeatureVector::to_array).collect();
    Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i][j])
}

/// Round half away from zero to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureVector {
        FeatureVector::from_array([230.456, 1.204, 276.0, 12.5, 50.001, 0.98])
    }

    #[test]
    fn test_contract_order() {
        let f = sample();
        assert_eq!(f.to_array()[0], f.voltage);
        assert_eq!(f.to_array()[5], f.power_factor);
        assert_eq!(FEATURES[5], "power_factor");
    }

    #[test]
    fn test_rounding() {
        let r = sample().rounded();
        assert_eq!(r.voltage, 230.46);
        assert_eq!(r.current, 1.2);
        assert_eq!(r.frequency, 50.0);
    }

    #[test]
    fn test_to_matrix_shape() {
        let rows = vec![sample(), sample(), sample()];
        let x = to_matrix(&rows);
        assert_eq!(x.dim(), (3, N_FEATURES));
        assert_eq!(x[[2, 2]], 276.0);
    }

    #[test]
    fn test_validate_rejects_negative() {
        let mut f = sample();
        f.current = -1.0;
        assert!(matches!(f.validate(), Err(IdsError::ValidationError(_))));
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_deserialize_ignores_extra_fields() {
        let json = r#"{"power_factor":0.9,"voltage":220,"current":1,"power":200,
            "energy":3,"frequency":50,"extra":"ignored"}"#;
        let f: FeatureVector = serde_json::from_str(json).unwrap();
        assert_eq!(f.voltage, 220.0);
        assert_eq!(f.power_factor, 0.9);
    }
}

use serde::{Deserialize, Serialize};

use crate::ml::{BACKGROUND_CLASS, ModelError, SIGNAL_CLASS, sigmoid};

const STD_FLOOR: f32 = 1e-6;

/// One hidden ReLU layer feeding a single sigmoid output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    pub model_version: i64,
    pub feature_len: usize,
    /// `[background, signal]`.
    pub classes: Vec<String>,
    pub hidden_size: usize,
    /// Row-major `hidden_size x feature_len`.
    pub weights1: Vec<f32>,
    pub bias1: Vec<f32>,
    pub weights2: Vec<f32>,
    pub bias2: f32,
    pub feature_mean: Vec<f32>,
    pub feature_std: Vec<f32>,
}

impl MlpModel {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.classes != [BACKGROUND_CLASS, SIGNAL_CLASS] {
            return Err(ModelError::Invalid(format!(
                "expected classes [{BACKGROUND_CLASS}, {SIGNAL_CLASS}], got {:?}",
                self.classes
            )));
        }
        let input = self.feature_len;
        let hidden = self.hidden_size;
        if input == 0 || hidden == 0 {
            return Err(ModelError::Invalid(
                "feature_len and hidden_size must be > 0".to_string(),
            ));
        }
        let shapes = [
            ("weights1", self.weights1.len(), input * hidden),
            ("bias1", self.bias1.len(), hidden),
            ("weights2", self.weights2.len(), hidden),
            ("feature_mean", self.feature_mean.len(), input),
            ("feature_std", self.feature_std.len(), input),
        ];
        for (field, found, expected) in shapes {
            if found != expected {
                return Err(ModelError::Invalid(format!(
                    "{field} has {found} values, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Probability that the row is signal. Callers check the row length.
    pub fn predict_signal_probability(&self, features: &[f32]) -> f32 {
        let input = self.feature_len;
        let normalized: Vec<f32> = features
            .iter()
            .zip(self.feature_mean.iter().zip(&self.feature_std))
            .map(|(&x, (&mean, &std))| (x - mean) / std.max(STD_FLOOR))
            .collect();

        let mut logit = self.bias2;
        for h in 0..self.hidden_size {
            let row = &self.weights1[h * input..(h + 1) * input];
            let pre = self.bias1[h]
                + row
                    .iter()
                    .zip(&normalized)
                    .map(|(w, x)| w * x)
                    .sum::<f32>();
            logit += self.weights2[h] * pre.max(0.0);
        }
        sigmoid(logit)
    }

    /// Response in `[0, 1]`.
    pub fn response(&self, features: &[f32]) -> f64 {
        self.predict_signal_probability(features) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_model() -> MlpModel {
        MlpModel {
            model_version: 1,
            feature_len: 1,
            classes: vec![BACKGROUND_CLASS.into(), SIGNAL_CLASS.into()],
            hidden_size: 1,
            weights1: vec![1.0],
            bias1: vec![0.0],
            weights2: vec![1.0],
            bias2: 0.0,
            feature_mean: vec![0.0],
            feature_std: vec![1.0],
        }
    }

    #[test]
    fn relu_clips_negative_activations() {
        let model = identity_model();
        model.validate().unwrap();
        assert_eq!(model.response(&[-3.0]), 0.5);
        assert!(model.response(&[3.0]) > 0.9);
    }

    #[test]
    fn zero_std_features_do_not_produce_nan() {
        let mut model = identity_model();
        model.feature_std = vec![0.0];
        assert!(model.response(&[0.0]).is_finite());
    }

    #[test]
    fn validate_reports_shape_mismatch() {
        let mut model = identity_model();
        model.weights2.push(0.0);
        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("weights2"));
    }
}

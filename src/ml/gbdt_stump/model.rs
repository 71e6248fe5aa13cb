use serde::{Deserialize, Serialize};

use crate::ml::{BACKGROUND_CLASS, ModelError, SIGNAL_CLASS, sigmoid};

/// Single-node decision tree used as a weak learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    /// Feature index used for the split.
    pub feature_index: u32,
    /// Threshold in feature units.
    pub threshold: f32,
    /// Prediction for `feature <= threshold`.
    pub left_value: f32,
    /// Prediction for `feature > threshold`.
    pub right_value: f32,
}

impl Stump {
    pub fn predict(&self, features: &[f32]) -> f32 {
        let value = features
            .get(self.feature_index as usize)
            .copied()
            .unwrap_or(0.0);
        if value <= self.threshold {
            self.left_value
        } else {
            self.right_value
        }
    }
}

/// Boosted stump ensemble over one signal logit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedStumps {
    pub model_version: i64,
    /// Number of `f32` values per feature row.
    pub feature_len: usize,
    /// `[background, signal]`.
    pub classes: Vec<String>,
    pub learning_rate: f32,
    /// Prior log-odds of signal.
    pub init_logit: f32,
    pub stumps: Vec<Stump>,
}

impl BoostedStumps {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.classes != [BACKGROUND_CLASS, SIGNAL_CLASS] {
            return Err(ModelError::Invalid(format!(
                "expected classes [{BACKGROUND_CLASS}, {SIGNAL_CLASS}], got {:?}",
                self.classes
            )));
        }
        if self.feature_len == 0 {
            return Err(ModelError::Invalid("feature_len must be > 0".to_string()));
        }
        if let Some(stump) = self
            .stumps
            .iter()
            .find(|stump| stump.feature_index as usize >= self.feature_len)
        {
            return Err(ModelError::Invalid(format!(
                "stump uses feature {} of {}",
                stump.feature_index, self.feature_len
            )));
        }
        if !self.init_logit.is_finite() || !self.learning_rate.is_finite() {
            return Err(ModelError::Invalid("non-finite parameters".to_string()));
        }
        Ok(())
    }

    /// Signal log-odds for a feature row.
    pub fn predict_logit(&self, features: &[f32]) -> f32 {
        self.init_logit
            + self
                .stumps
                .iter()
                .map(|stump| self.learning_rate * stump.predict(features))
                .sum::<f32>()
    }

    pub fn predict_signal_probability(&self, features: &[f32]) -> f32 {
        sigmoid(self.predict_logit(features))
    }

    /// Response in `[-1, 1]`: `2·p(signal) − 1`.
    pub fn response(&self, features: &[f32]) -> f64 {
        2.0 * self.predict_signal_probability(features) as f64 - 1.0
    }
}

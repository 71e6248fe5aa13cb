//! Training and inference engine for signal/background classifiers.
//!
//! Two methods are available behind the [`engine`] boundary: boosted decision
//! stumps (`bdt`) and a one-hidden-layer network (`dnn`). Both are binary
//! classifiers trained on linear feature rows and persisted as JSON
//! `<method>.model` files.

pub mod engine;
pub mod gbdt_stump;
pub mod metrics;
pub mod mlp;

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::DatasetError;

/// Class name of label `false`.
pub const BACKGROUND_CLASS: &str = "background";
/// Class name of label `true`.
pub const SIGNAL_CLASS: &str = "signal";

/// Labeled rows handed to a trainer. `y[i]` is `true` for signal.
#[derive(Debug, Clone, Default)]
pub struct TrainSet {
    pub feature_len: usize,
    pub x: Vec<Vec<f32>>,
    pub y: Vec<bool>,
}

impl TrainSet {
    pub fn new(feature_len: usize) -> Self {
        Self {
            feature_len,
            ..Self::default()
        }
    }

    pub fn push(&mut self, row: &[f32], signal: bool) {
        self.x.push(row.to_vec());
        self.y.push(signal);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn signal_count(&self) -> usize {
        self.y.iter().filter(|&&signal| signal).count()
    }

    fn check_trainable(&self) -> Result<(), ModelError> {
        if self.x.len() != self.y.len() {
            return Err(ModelError::Training("mismatched X/Y lengths".to_string()));
        }
        if self.x.iter().any(|row| row.len() != self.feature_len) {
            return Err(ModelError::Training("ragged feature rows".to_string()));
        }
        let signal = self.signal_count();
        if signal == 0 || signal == self.len() {
            return Err(ModelError::Training(format!(
                "need both classes, got {signal} signal and {} background rows",
                self.len() - signal
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    Invalid(String),
    #[error("model {model} expects {expected} features, got {found}")]
    SchemaMismatch {
        model: String,
        expected: usize,
        found: usize,
    },
    #[error("method name {0:?} is not a plain file name")]
    InvalidName(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }

    #[test]
    fn single_class_sets_are_not_trainable() {
        let mut set = TrainSet::new(1);
        set.push(&[1.0], true);
        set.push(&[2.0], true);
        assert!(matches!(set.check_trainable(), Err(ModelError::Training(_))));
        set.push(&[0.0], false);
        assert!(set.check_trainable().is_ok());
    }
}

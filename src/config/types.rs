use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{EncodingOptions, SplitPolicy};
use crate::gate::QualityThresholds;
use crate::ml::engine::{MethodConfig, MethodKind};
use crate::normalize::NormalizeOptions;

/// Every tunable of a pipeline run, persisted as `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub gate: QualityThresholds,
    pub normalize: NormalizeOptions,
    pub encoding: EncodingOptions,
    pub split: SplitPolicy,
    pub methods: Vec<MethodConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gate: QualityThresholds::default(),
            normalize: NormalizeOptions::default(),
            encoding: EncodingOptions::default(),
            split: SplitPolicy::default(),
            methods: vec![MethodConfig::bdt("BDT"), MethodConfig::dnn("DNN")],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    /// Reject contradictory or unusable settings before any pipeline I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;
        for (key, value) in [
            ("voltage_threshold", gate.voltage_threshold),
            ("min_peak_position", gate.min_peak_position),
            ("max_peak_position", gate.max_peak_position),
            ("right_edge_seconds", self.normalize.right_edge_seconds),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("{key} must be finite, got {value}")));
            }
        }
        if gate.min_peak_position > gate.max_peak_position {
            return Err(invalid(format!(
                "min_peak_position {} is after max_peak_position {}",
                gate.min_peak_position, gate.max_peak_position
            )));
        }
        if gate.expected_bin_count == 0 {
            return Err(invalid("expected_bin_count must be > 0"));
        }
        if self.encoding.resample_count == 0 {
            return Err(invalid("resample_count must be > 0"));
        }
        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(format!(
                "train_fraction must be in (0, 1], got {fraction}"
            )));
        }
        self.validate_methods()
    }

    fn validate_methods(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for method in &self.methods {
            let plain = !method.name.is_empty()
                && method
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !plain {
                return Err(invalid(format!(
                    "method name {:?} must be non-empty and use only letters, digits, '_' or '-'",
                    method.name
                )));
            }
            if !names.insert(method.name.as_str()) {
                return Err(invalid(format!("duplicate method name {}", method.name)));
            }
            match method.kind {
                MethodKind::Bdt => {
                    let bdt = &method.bdt;
                    if bdt.rounds == 0 || bdt.bins < 2 || !is_positive(bdt.learning_rate) {
                        return Err(invalid(format!(
                            "method {}: bdt needs rounds > 0, bins >= 2 and learning_rate > 0",
                            method.name
                        )));
                    }
                }
                MethodKind::Dnn => {
                    let dnn = &method.dnn;
                    if dnn.epochs == 0 || dnn.hidden_size == 0 || !is_positive(dnn.learning_rate) {
                        return Err(invalid(format!(
                            "method {}: dnn needs epochs > 0, hidden_size > 0 and learning_rate > 0",
                            method.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a configured method by name.
    pub fn method(&self, name: &str) -> Option<&MethodConfig> {
        self.methods.iter().find(|method| method.name == name)
    }
}

fn is_positive(value: f32) -> bool {
    value > 0.0
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

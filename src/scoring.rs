//! Classification scorer: every loaded model scores every normalized test
//! waveform, and each model's scores are accumulated into a response histogram.
//!
//! Models are keyed by method name (the model file stem), so the order in
//! which model files are found never changes which score lands under which
//! name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::dataset::encode::{EncodeError, linear_row, shared_bin_count};
use crate::ml::ModelError;
use crate::ml::engine::{ModelHandle, load_model, model_paths, score};
use crate::waveform::Histogram;

pub const RESPONSE_BINS: usize = 100;
pub const RESPONSE_LOW: f64 = -1.0;
pub const RESPONSE_HIGH: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("failed to list models in {path}: {source}")]
    ModelDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Schema(#[from] EncodeError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Distribution of one model's scores over a fixed `[-1, 1]` axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHistogram {
    pub method: String,
    pub low: f64,
    pub high: f64,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
    pub entries: u64,
}

impl ResponseHistogram {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            low: RESPONSE_LOW,
            high: RESPONSE_HIGH,
            counts: vec![0; RESPONSE_BINS],
            underflow: 0,
            overflow: 0,
            entries: 0,
        }
    }

    /// Add one score. The upper edge is closed so a saturated score of
    /// exactly `high` lands in the last bin.
    pub fn fill(&mut self, value: f64) {
        self.entries += 1;
        if value < self.low {
            self.underflow += 1;
        } else if value <= self.high {
            let width = (self.high - self.low) / self.counts.len() as f64;
            let bin = (((value - self.low) / width) as usize).min(self.counts.len() - 1);
            self.counts[bin] += 1;
        } else {
            // Above the axis, or NaN.
            self.overflow += 1;
        }
    }

    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Scores of one test waveform, keyed by method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub waveform: String,
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub results: Vec<ClassificationResult>,
    pub responses: BTreeMap<String, ResponseHistogram>,
    pub skipped_models: Vec<SkippedModel>,
}

impl ClassificationReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }
}

/// Models found in a directory, split into usable handles and skipped files.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub handles: Vec<ModelHandle>,
    pub skipped: Vec<SkippedModel>,
}

/// Load every `*.model` file in `dir`. Unreadable models are skipped and
/// recorded; only a missing or unlistable directory is an error.
pub fn load_models(dir: &Path) -> Result<ModelSet, ScoringError> {
    let paths = model_paths(dir).map_err(|source| ScoringError::ModelDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut set = ModelSet::default();
    for path in paths {
        match load_model(&path) {
            Ok(handle) if set.handles.iter().any(|known| known.name == handle.name) => {
                warn!("Skipping model {}: duplicate method name", path.display());
                set.skipped.push(SkippedModel {
                    path,
                    reason: format!("duplicate method name {}", handle.name),
                });
            }
            Ok(handle) => set.handles.push(handle),
            Err(err) => {
                warn!("Skipping model {}: {err}", path.display());
                set.skipped.push(SkippedModel {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }
    info!(
        loaded = set.handles.len(),
        skipped = set.skipped.len(),
        "Loaded models from {}",
        dir.display()
    );
    Ok(set)
}

/// Score one waveform with every model.
pub fn score_waveform(
    models: &[ModelHandle],
    hist: &Histogram,
) -> Result<ClassificationResult, ModelError> {
    let row = linear_row(hist);
    let mut scores = BTreeMap::new();
    for handle in models {
        scores.insert(handle.name.clone(), score(handle, &row)?);
    }
    Ok(ClassificationResult {
        waveform: hist.name().to_string(),
        scores,
    })
}

/// Score a batch of normalized waveforms. An empty batch yields an empty
/// report; a bin-count disagreement within the batch or with a model is fatal.
pub fn score_batch(models: ModelSet, batch: &[Histogram]) -> Result<ClassificationReport, ScoringError> {
    let ModelSet { handles, skipped } = models;
    let mut report = ClassificationReport {
        skipped_models: skipped,
        ..ClassificationReport::default()
    };
    let Some(bin_count) = shared_bin_count(batch)? else {
        info!("No test waveforms to classify");
        return Ok(report);
    };
    if handles.is_empty() {
        warn!(
            skipped = report.skipped_models.len(),
            "No usable model; {} test waveforms stay unscored",
            batch.len()
        );
    }
    if let Some(handle) = handles.iter().find(|handle| handle.feature_len() != bin_count) {
        return Err(ModelError::SchemaMismatch {
            model: handle.name.clone(),
            expected: handle.feature_len(),
            found: bin_count,
        }
        .into());
    }

    for handle in &handles {
        report
            .responses
            .insert(handle.name.clone(), ResponseHistogram::new(&handle.name));
    }
    for hist in batch {
        let result = score_waveform(&handles, hist)?;
        for (method, value) in &result.scores {
            if let Some(response) = report.responses.get_mut(method) {
                response.fill(*value);
            }
        }
        report.results.push(result);
    }
    info!(
        waveforms = report.results.len(),
        models = handles.len(),
        "Scored test waveforms"
    );
    Ok(report)
}

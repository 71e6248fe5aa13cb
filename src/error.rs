//! Run-level failures of the preparation and classification pipelines.
//!
//! Per-item parse failures and per-model load failures never reach this type:
//! they are recovered inside the batch and surface as counts and report
//! entries instead. An empty batch is an outcome, not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::dataset::{DatasetError, EncodeError};
use crate::ml::ModelError;
use crate::pipeline::{RunCounts, Stage};
use crate::report::ReportError;
use crate::scoring::ScoringError;
use crate::waveform::HistogramError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("failed to list waveforms in {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error(transparent)]
    Encode(EncodeError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Scoring(ScoringError),
    #[error(transparent)]
    Report(#[from] ReportError),
    /// A fatal failure after gating, with the counts reached so far.
    #[error("{stage} failed ({counts}): {source}")]
    Aborted {
        stage: Stage,
        counts: RunCounts,
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap `err` with the stage it aborted and the run's counts.
    pub fn aborted(stage: Stage, counts: RunCounts, err: impl Into<PipelineError>) -> Self {
        match err.into() {
            already @ PipelineError::Aborted { .. } => already,
            source => PipelineError::Aborted {
                stage,
                counts,
                source: Box::new(source),
            },
        }
    }

    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            PipelineError::SchemaMismatch(_) => true,
            PipelineError::Aborted { source, .. } => source.is_schema_mismatch(),
            _ => false,
        }
    }

    /// Counts of a run that aborted after gating.
    pub fn counts(&self) -> Option<&RunCounts> {
        match self {
            PipelineError::Aborted { counts, .. } => Some(counts),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Aborted { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<EncodeError> for PipelineError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::SchemaMismatch { .. } => PipelineError::SchemaMismatch(err.to_string()),
            other => PipelineError::Encode(other),
        }
    }
}

impl From<ScoringError> for PipelineError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Schema(inner) => inner.into(),
            ScoringError::Model(ModelError::SchemaMismatch { .. }) => {
                PipelineError::SchemaMismatch(err.to_string())
            }
            other => PipelineError::Scoring(other),
        }
    }
}

//! End-to-end runs: dataset preparation from a signal and a background
//! directory, and classification of a test directory against trained models.
//!
//! Both runs are sequential. Every waveform directory goes through
//! `INGESTING -> GATING -> NORMALIZING`, then `ENCODING` (preparation) or
//! `SCORING` (classification), and the run ends in `REPORTING`.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ConfigError, PipelineConfig};
use crate::dataset::{
    Dataset, DatasetManifest, EncodeError, Encoding, EncodingOptions, encode_with_bins, persist,
};
use crate::error::PipelineError;
use crate::gate::{GateReport, partition};
use crate::normalize::normalize_batch;
use crate::report;
use crate::scoring::{ClassificationReport, load_models, score_batch};
use crate::waveform::{Histogram, WaveformParameters, ingest_directory};

/// Table holding the signal class in a prepared dataset.
pub const SIGNAL_TABLE: &str = "signal";
/// Table holding the background class in a prepared dataset.
pub const BACKGROUND_TABLE: &str = "background";
const DATASET_NAME: &str = "dualreadout";
const TEST_LABEL: &str = "test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Ingesting,
    Gating,
    Normalizing,
    Encoding,
    Scoring,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingesting => "INGESTING",
            Stage::Gating => "GATING",
            Stage::Normalizing => "NORMALIZING",
            Stage::Encoding => "ENCODING",
            Stage::Scoring => "SCORING",
            Stage::Reporting => "REPORTING",
        };
        f.write_str(name)
    }
}

/// Logs stage transitions of one batch; stages only move forward.
#[derive(Debug)]
struct StageLog {
    label: String,
    current: Option<Stage>,
}

impl StageLog {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            current: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug_assert!(
            self.current.is_none_or(|current| current < stage),
            "stage {stage} entered after {:?}",
            self.current
        );
        info!("[{}] {stage}", self.label);
        self.current = Some(stage);
    }
}

/// Per-run counters, reported even when the run ends early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Sample files found.
    pub ingested: usize,
    pub parse_failures: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub scored: usize,
}

impl RunCounts {
    fn absorb(&mut self, other: &RunCounts) {
        self.ingested += other.ingested;
        self.parse_failures += other.parse_failures;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.scored += other.scored;
    }

    fn log(&self, run: &str) {
        info!(
            ingested = self.ingested,
            parse_failures = self.parse_failures,
            accepted = self.accepted,
            rejected = self.rejected,
            scored = self.scored,
            "{run} finished"
        );
    }
}

impl fmt::Display for RunCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ingested={} parse_failures={} accepted={} rejected={} scored={}",
            self.ingested, self.parse_failures, self.accepted, self.rejected, self.scored
        )
    }
}

/// Result of a run that may have had nothing to work on.
#[derive(Debug, Clone)]
pub enum PipelineOutcome<T> {
    Completed { counts: RunCounts, value: T },
    /// No waveform survived the quality gate.
    Empty { counts: RunCounts },
}

impl<T> PipelineOutcome<T> {
    pub fn counts(&self) -> &RunCounts {
        match self {
            PipelineOutcome::Completed { counts, .. } | PipelineOutcome::Empty { counts } => counts,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            PipelineOutcome::Completed { value, .. } => Some(value),
            PipelineOutcome::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PipelineOutcome::Empty { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub counts: RunCounts,
}

#[derive(Debug, Clone)]
pub struct PrepareSummary {
    pub dataset_dir: PathBuf,
    pub manifest: DatasetManifest,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone)]
pub struct ClassificationRun {
    pub counts: RunCounts,
    pub report: ClassificationReport,
    pub report_path: PathBuf,
}

/// One waveform directory after ingestion and gating.
struct GatedBatch {
    label: String,
    accepted: Vec<Histogram>,
    gate: GateReport,
    parameters: Vec<WaveformParameters>,
    counts: RunCounts,
}

impl GatedBatch {
    fn write_reports(&self, out_dir: &Path) -> Result<(), PipelineError> {
        report::write_gate_report(out_dir, &self.label, &self.gate)?;
        report::write_parameters(out_dir, &self.label, &self.parameters)?;
        Ok(())
    }
}

/// A gated batch after normalization, with its stage log.
struct NormalizedBatch {
    label: String,
    normalized: Vec<Histogram>,
    counts: RunCounts,
    stages: StageLog,
}

fn ingest_and_gate(
    label: &str,
    dir: &Path,
    config: &PipelineConfig,
    stages: &mut StageLog,
) -> Result<GatedBatch, PipelineError> {
    stages.enter(Stage::Ingesting);
    let batch = ingest_directory(dir).map_err(|source| PipelineError::ReadDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut counts = RunCounts {
        ingested: batch.items.len(),
        parse_failures: batch.failure_count(),
        ..RunCounts::default()
    };
    let parameters: Vec<WaveformParameters> =
        batch.waveforms().map(WaveformParameters::measure).collect();

    stages.enter(Stage::Gating);
    let outcome = partition(batch.into_waveforms(), &config.gate);
    counts.accepted = outcome.report.accepted;
    counts.rejected = outcome.report.rejected;
    Ok(GatedBatch {
        label: label.to_string(),
        accepted: outcome.accepted,
        gate: outcome.report,
        parameters,
        counts,
    })
}

/// Ingest and gate `dir`, write its gate and parameter reports, then
/// normalize the survivors. `totals` already holds every earlier batch.
fn gate_and_normalize(
    label: &str,
    dir: &Path,
    config: &PipelineConfig,
    out_dir: &Path,
    totals: &mut RunCounts,
) -> Result<NormalizedBatch, PipelineError> {
    let mut stages = StageLog::new(label);
    let batch = ingest_and_gate(label, dir, config, &mut stages)?;
    totals.absorb(&batch.counts);
    batch
        .write_reports(out_dir)
        .map_err(|err| PipelineError::aborted(Stage::Gating, *totals, err))?;

    stages.enter(Stage::Normalizing);
    let normalized = normalize_batch(&batch.accepted, &config.normalize)
        .map_err(|err| PipelineError::aborted(Stage::Normalizing, *totals, err))?;
    if let Some(first) = normalized.first() {
        debug!("[{label}] normalized waveforms have {} bins", first.bin_count());
    }
    Ok(NormalizedBatch {
        label: batch.label,
        normalized,
        counts: batch.counts,
        stages,
    })
}

fn require_dir(role: &str, dir: &Path) -> Result<(), ConfigError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{role} directory {} does not exist",
            dir.display()
        )))
    }
}

/// Fix the resample seed once so every table of a run shares it.
fn resolve_encoding(options: &EncodingOptions) -> EncodingOptions {
    let mut resolved = options.clone();
    if resolved.kind == Encoding::Resampled && resolved.resample_seed.is_none() {
        let seed: u64 = rand::rng().random();
        info!("No resample seed configured; drew {seed}");
        resolved.resample_seed = Some(seed);
    }
    resolved
}

/// Build a two-table (`signal`, `background`) dataset in `out_dir`, together
/// with a gate report and a parameter table per input directory.
///
/// Gate and parameter reports are written as soon as a directory is gated,
/// so they survive a later failure. Failures after gating carry the counts.
pub fn prepare_dataset(
    config: &PipelineConfig,
    signal_dir: &Path,
    background_dir: &Path,
    out_dir: &Path,
) -> Result<PipelineOutcome<PrepareSummary>, PipelineError> {
    config.validate()?;
    require_dir("signal", signal_dir)?;
    require_dir("background", background_dir)?;
    let encoding = resolve_encoding(&config.encoding);

    let mut counts = RunCounts::default();
    let mut batches = Vec::with_capacity(2);
    for (label, dir) in [(SIGNAL_TABLE, signal_dir), (BACKGROUND_TABLE, background_dir)] {
        batches.push(gate_and_normalize(label, dir, config, out_dir, &mut counts)?);
    }

    let bin_count = shared_bin_count_across(&batches)
        .map_err(|err| PipelineError::aborted(Stage::Encoding, counts, err))?;
    let Some(bin_count) = bin_count else {
        info!("No waveform survived the quality gate; no dataset written");
        counts.log("Preparation");
        return Ok(PipelineOutcome::Empty { counts });
    };

    let mut tables = Vec::with_capacity(batches.len());
    let mut summaries = Vec::with_capacity(batches.len());
    for batch in &mut batches {
        batch.stages.enter(Stage::Encoding);
        let encoded = encode_with_bins(&batch.label, &batch.normalized, &encoding, Some(bin_count))
            .map_err(|err| PipelineError::aborted(Stage::Encoding, counts, err))?;
        summaries.push(TableSummary {
            name: batch.label.clone(),
            rows: encoded.table.row_count(),
            counts: batch.counts,
        });
        tables.push(encoded.table);
    }

    let mut stages = StageLog::new("prepare");
    stages.enter(Stage::Reporting);
    let mut dataset = Dataset::new(DATASET_NAME, encoding.kind, bin_count);
    dataset.resample_seed = encoding.resample_seed.filter(|_| encoding.kind == Encoding::Resampled);
    dataset.tables = tables;
    let manifest = persist(&dataset, out_dir, &config.split)
        .map_err(|err| PipelineError::aborted(Stage::Reporting, counts, err))?;
    counts.log("Preparation");
    Ok(PipelineOutcome::Completed {
        counts,
        value: PrepareSummary {
            dataset_dir: out_dir.to_path_buf(),
            manifest,
            tables: summaries,
        },
    })
}

/// Bin count shared by the survivors of every batch; `None` when all are empty.
fn shared_bin_count_across(batches: &[NormalizedBatch]) -> Result<Option<usize>, EncodeError> {
    let mut reference: Option<&Histogram> = None;
    for hist in batches.iter().filter_map(|batch| batch.normalized.first()) {
        match reference {
            None => reference = Some(hist),
            Some(first) if first.bin_count() != hist.bin_count() => {
                return Err(EncodeError::SchemaMismatch {
                    first: first.name().to_string(),
                    expected: first.bin_count(),
                    name: hist.name().to_string(),
                    found: hist.bin_count(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(reference.map(Histogram::bin_count))
}

/// Score every surviving waveform of `test_dir` with every model in
/// `models_dir`, and write the reports into `out_dir`.
///
/// The gate and parameter reports are written right after gating; failures
/// after that point carry the counts reached so far.
pub fn classify_directory(
    config: &PipelineConfig,
    test_dir: &Path,
    models_dir: &Path,
    out_dir: &Path,
) -> Result<ClassificationRun, PipelineError> {
    config.validate()?;
    require_dir("test", test_dir)?;
    require_dir("models", models_dir)?;

    let mut counts = RunCounts::default();
    let mut batch = gate_and_normalize(TEST_LABEL, test_dir, config, out_dir, &mut counts)?;

    batch.stages.enter(Stage::Scoring);
    let models = load_models(models_dir)
        .map_err(|err| PipelineError::aborted(Stage::Scoring, counts, err))?;
    let classification = score_batch(models, &batch.normalized)
        .map_err(|err| PipelineError::aborted(Stage::Scoring, counts, err))?;
    counts.scored = classification
        .results
        .iter()
        .filter(|result| !result.scores.is_empty())
        .count();

    batch.stages.enter(Stage::Reporting);
    let report_path = report::write_classification(out_dir, &classification, &counts)
        .map_err(|err| PipelineError::aborted(Stage::Reporting, counts, err))?;
    counts.log("Classification");
    Ok(ClassificationRun {
        counts,
        report: classification,
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered_and_display_upper_case() {
        assert!(Stage::Ingesting < Stage::Gating);
        assert!(Stage::Normalizing < Stage::Encoding);
        assert!(Stage::Scoring < Stage::Reporting);
        assert_eq!(Stage::Normalizing.to_string(), "NORMALIZING");
    }

    #[test]
    fn counts_absorb_adds_fields() {
        let mut total = RunCounts::default();
        let part = RunCounts {
            ingested: 4,
            parse_failures: 1,
            accepted: 2,
            rejected: 1,
            scored: 0,
        };
        total.absorb(&part);
        total.absorb(&part);
        assert_eq!(total.ingested, 8);
        assert_eq!(total.accepted, 4);
    }

    #[test]
    fn aborted_errors_keep_the_first_stage_and_show_counts() {
        let counts = RunCounts {
            ingested: 3,
            accepted: 2,
            rejected: 1,
            ..RunCounts::default()
        };
        let inner = PipelineError::aborted(
            Stage::Encoding,
            counts,
            PipelineError::SchemaMismatch("bins differ".into()),
        );
        let outer = PipelineError::aborted(Stage::Reporting, RunCounts::default(), inner);
        assert_eq!(outer.stage(), Some(Stage::Encoding));
        assert_eq!(outer.counts(), Some(&counts));
        assert!(outer.is_schema_mismatch());
        assert_eq!(
            outer.to_string(),
            "ENCODING failed (ingested=3 parse_failures=0 accepted=2 rejected=1 scored=0): \
             schema mismatch: bins differ"
        );
    }

    #[test]
    fn resolve_encoding_draws_a_seed_only_for_resampling() {
        let linear = resolve_encoding(&EncodingOptions::default());
        assert_eq!(linear.resample_seed, None);
        let resampled = resolve_encoding(&EncodingOptions {
            kind: Encoding::Resampled,
            ..EncodingOptions::default()
        });
        assert!(resampled.resample_seed.is_some());
        let fixed = resolve_encoding(&EncodingOptions {
            kind: Encoding::Resampled,
            resample_seed: Some(9),
            ..EncodingOptions::default()
        });
        assert_eq!(fixed.resample_seed, Some(9));
    }

    #[test]
    fn missing_directories_fail_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent");
        let err = prepare_dataset(&PipelineConfig::default(), &absent, dir.path(), dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ConfigError::Invalid(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn contradictory_config_fails_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.gate.min_peak_position = 1.0;
        let err = classify_directory(&config, dir.path(), dir.path(), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(!dir.path().join("out").exists());
    }
}

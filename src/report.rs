//! Run artifacts: gate reports, waveform parameter tables and classification
//! results, written as JSON/JSONL into the run output directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::atomic_write::atomic_write;
use crate::gate::GateReport;
use crate::pipeline::RunCounts;
use crate::scoring::{ClassificationReport, ClassificationResult};
use crate::waveform::WaveformParameters;

pub const CLASSIFICATION_REPORT_FILE: &str = "classification-report.json";
pub const SCORES_FILE: &str = "scores.jsonl";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn gate_report_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("quality-gate-{label}.json"))
}

pub fn parameters_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("waveform-parameters-{label}.jsonl"))
}

/// Accepted/rejected counts, percentages and per-waveform reject reasons.
pub fn write_gate_report(dir: &Path, label: &str, report: &GateReport) -> Result<PathBuf, ReportError> {
    let path = gate_report_path(dir, label);
    write_json(&path, report)?;
    Ok(path)
}

pub fn write_parameters(
    dir: &Path,
    label: &str,
    parameters: &[WaveformParameters],
) -> Result<PathBuf, ReportError> {
    let path = parameters_path(dir, label);
    write_jsonl(&path, parameters)?;
    Ok(path)
}

#[derive(Serialize)]
struct ClassificationFile<'a> {
    counts: &'a RunCounts,
    #[serde(flatten)]
    report: &'a ClassificationReport,
}

/// Write `classification-report.json` and `scores.jsonl`.
pub fn write_classification(
    dir: &Path,
    report: &ClassificationReport,
    counts: &RunCounts,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(CLASSIFICATION_REPORT_FILE);
    write_json(&path, &ClassificationFile { counts, report })?;
    write_jsonl::<ClassificationResult>(&dir.join(SCORES_FILE), &report.results)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    ensure_parent(path)?;
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, &bytes).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    ensure_parent(path)?;
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{QualityThresholds, partition};
    use crate::scoring::ResponseHistogram;
    use crate::waveform::Histogram;
    use std::collections::BTreeMap;

    #[test]
    fn gate_report_is_named_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let hist = Histogram::from_contents("w", -1e-8, 1e-8, vec![0.0, -0.5]).unwrap();
        let thresholds = QualityThresholds {
            expected_bin_count: 2,
            ..QualityThresholds::default()
        };
        let outcome = partition(vec![hist], &thresholds);
        let path = write_gate_report(dir.path(), "signal", &outcome.report).unwrap();
        assert_eq!(path, dir.path().join("quality-gate-signal.json"));
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 1);
    }

    #[test]
    fn classification_writes_report_and_one_score_line_per_waveform() {
        let dir = tempfile::tempdir().unwrap();
        let mut responses = BTreeMap::new();
        let mut response = ResponseHistogram::new("BDT");
        response.fill(0.25);
        responses.insert("BDT".to_string(), response);
        let report = ClassificationReport {
            results: vec![
                ClassificationResult {
                    waveform: "a".into(),
                    scores: BTreeMap::from([("BDT".to_string(), 0.25)]),
                },
                ClassificationResult {
                    waveform: "b".into(),
                    scores: BTreeMap::from([("BDT".to_string(), -0.5)]),
                },
            ],
            responses,
            skipped_models: Vec::new(),
        };
        let counts = RunCounts {
            ingested: 2,
            accepted: 2,
            scored: 2,
            ..RunCounts::default()
        };
        let path = write_classification(dir.path(), &report, &counts).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["counts"]["scored"], 2);
        assert_eq!(value["responses"]["BDT"]["entries"], 1);
        let lines = std::fs::read_to_string(dir.path().join(SCORES_FILE)).unwrap();
        assert_eq!(lines.lines().count(), 2);
        assert!(lines.starts_with(r#"{"waveform":"a","scores":{"BDT":0.25}}"#));
    }
}

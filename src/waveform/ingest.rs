//! Delimited sample-file ingestion.
//!
//! Oscilloscope exports (Tektronix-style CSV) mix instrument header lines with
//! `time,amplitude` rows. A line contributes a sample only when its last two
//! delimited fields both parse as numbers, which accepts both the columnar
//! layout (header fields in the leading columns) and the plain two-column one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::histogram::{Histogram, HistogramError};

/// Extension of sample files picked up from a waveform directory.
pub const WAVEFORM_EXTENSION: &str = "csv";

/// Reasons a single sample file could not be turned into a histogram.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file held fewer than two parseable samples.
    #[error("{path} holds {samples} parseable samples (need at least 2)")]
    TooFewSamples { path: PathBuf, samples: usize },
    /// Sample times are not strictly increasing.
    #[error("{path}: sample times must be strictly increasing (line {line})")]
    NonMonotonicTime { path: PathBuf, line: usize },
    /// Another waveform in the batch already uses this identifier.
    #[error("duplicate waveform name {name} ({path})")]
    DuplicateName { name: String, path: PathBuf },
    #[error("{path}: {source}")]
    Histogram {
        path: PathBuf,
        source: HistogramError,
    },
}

/// One `(time, amplitude)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub amplitude: f64,
}

/// Kind of an entry in an ingested batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Waveform,
    Failed,
}

/// Outcome for one file of a batch.
#[derive(Debug)]
pub enum IngestItem {
    Waveform(Histogram),
    Failed { path: PathBuf, error: IngestError },
}

impl IngestItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            IngestItem::Waveform(_) => ItemKind::Waveform,
            IngestItem::Failed { .. } => ItemKind::Failed,
        }
    }

    pub fn as_waveform(&self) -> Option<&Histogram> {
        match self {
            IngestItem::Waveform(hist) => Some(hist),
            IngestItem::Failed { .. } => None,
        }
    }
}

/// Everything read from one waveform directory, in file-name order.
#[derive(Debug, Default)]
pub struct IngestedBatch {
    pub items: Vec<IngestItem>,
}

impl IngestedBatch {
    pub fn waveforms(&self) -> impl Iterator<Item = &Histogram> {
        self.items.iter().filter_map(IngestItem::as_waveform)
    }

    /// Consume the batch, keeping only the readable waveforms.
    pub fn into_waveforms(self) -> Vec<Histogram> {
        self.items
            .into_iter()
            .filter_map(|item| match item {
                IngestItem::Waveform(hist) => Some(hist),
                IngestItem::Failed { .. } => None,
            })
            .collect()
    }

    pub fn waveform_count(&self) -> usize {
        self.count(ItemKind::Waveform)
    }

    pub fn failure_count(&self) -> usize {
        self.count(ItemKind::Failed)
    }

    fn count(&self, kind: ItemKind) -> usize {
        self.items.iter().filter(|item| item.kind() == kind).count()
    }
}

/// File name without its last extension (`a.b.csv` -> `a.b`).
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) => &file_name[..pos],
    }
}

/// Waveform identifier for a sample file path.
pub fn waveform_id(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    strip_extension(&file_name).to_string()
}

/// Parse sample text, skipping lines that do not end in two numeric fields.
pub fn parse_samples(text: &str) -> Vec<(usize, Sample)> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line
            .split([',', ';', '\t'])
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .collect();
        if fields.len() < 2 {
            continue;
        }
        let time = fields[fields.len() - 2].parse::<f64>();
        let amplitude = fields[fields.len() - 1].parse::<f64>();
        if let (Ok(time), Ok(amplitude)) = (time, amplitude) {
            if time.is_finite() && amplitude.is_finite() {
                out.push((idx + 1, Sample { time, amplitude }));
            }
        }
    }
    out
}

/// Bin a sample series so that bin centers coincide with the sample times.
pub fn samples_to_histogram(name: &str, path: &Path, samples: &[(usize, Sample)]) -> Result<Histogram, IngestError> {
    if samples.len() < 2 {
        return Err(IngestError::TooFewSamples {
            path: path.to_path_buf(),
            samples: samples.len(),
        });
    }
    for pair in samples.windows(2) {
        if pair[1].1.time <= pair[0].1.time {
            return Err(IngestError::NonMonotonicTime {
                path: path.to_path_buf(),
                line: pair[1].0,
            });
        }
    }
    let first = samples[0].1.time;
    let last = samples[samples.len() - 1].1.time;
    let width = (last - first) / (samples.len() - 1) as f64;
    let contents = samples.iter().map(|(_, sample)| sample.amplitude).collect();
    Histogram::from_contents(name, first - width / 2.0, last + width / 2.0, contents)
        .map(|hist| hist.with_source(path))
        .map_err(|source| IngestError::Histogram {
            path: path.to_path_buf(),
            source,
        })
}

/// Read one sample file into a histogram named after the file stem.
pub fn read_waveform(path: &Path) -> Result<Histogram, IngestError> {
    let text = fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = parse_samples(&text);
    samples_to_histogram(&waveform_id(path), path, &samples)
}

/// List the sample files of a directory in file-name order.
pub fn waveform_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(WAVEFORM_EXTENSION))
        })
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

/// Read every sample file of a directory; unreadable files become `Failed` items.
pub fn ingest_directory(dir: &Path) -> std::io::Result<IngestedBatch> {
    let paths = waveform_paths(dir)?;
    let mut names = HashSet::new();
    let mut batch = IngestedBatch::default();
    for path in paths {
        let item = match read_waveform(&path) {
            Ok(hist) if !names.insert(hist.name().to_string()) => IngestItem::Failed {
                error: IngestError::DuplicateName {
                    name: hist.name().to_string(),
                    path: path.clone(),
                },
                path,
            },
            Ok(hist) => {
                debug!("Read waveform {} ({} bins)", hist.name(), hist.bin_count());
                IngestItem::Waveform(hist)
            }
            Err(error) => IngestItem::Failed { path, error },
        };
        if let IngestItem::Failed { error, .. } = &item {
            warn!("Skipping waveform: {error}");
        }
        batch.items.push(item);
    }
    Ok(batch)
}

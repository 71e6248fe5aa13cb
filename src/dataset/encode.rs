//! Feature encodings turning normalized waveforms into tables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::DatasetError;
use super::table::{ColumnKind, Table};
use crate::waveform::Histogram;

/// Default number of synthetic events drawn per waveform.
pub const DEFAULT_RESAMPLE_COUNT: usize = 10_000;

/// Table layout produced by [`encode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// One row per waveform, one `varN` column per bin.
    #[default]
    Linear,
    /// One `(x, y)` row per waveform bin.
    PointPair,
    /// One column per waveform, one row per synthetic event.
    Resampled,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Linear => "linear",
            Encoding::PointPair => "point-pair",
            Encoding::Resampled => "resampled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "linear" => Some(Encoding::Linear),
            "point-pair" => Some(Encoding::PointPair),
            "resampled" => Some(Encoding::Resampled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingOptions {
    #[serde(default, alias = "encoding")]
    pub kind: Encoding,
    #[serde(default = "default_resample_count", alias = "resampleCount")]
    pub resample_count: usize,
    /// Seed for the resampled encoding; drawn from entropy (and recorded) when absent.
    #[serde(default, alias = "resampleSeed", skip_serializing_if = "Option::is_none")]
    pub resample_seed: Option<u64>,
}

fn default_resample_count() -> usize {
    DEFAULT_RESAMPLE_COUNT
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            kind: Encoding::Linear,
            resample_count: DEFAULT_RESAMPLE_COUNT,
            resample_seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    /// Two waveforms of one batch disagree on bin count.
    #[error("bin count mismatch: {first} has {expected} bins but {name} has {found}")]
    SchemaMismatch {
        first: String,
        expected: usize,
        name: String,
        found: usize,
    },
    /// A waveform has no positive content to sample from.
    #[error("waveform {name} has no positive content to resample")]
    EmptyDistribution { name: String },
    #[error(transparent)]
    Table(#[from] DatasetError),
}

/// Encoder output: the table plus the seed the resampled encoding used.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub table: Table,
    pub bin_count: Option<usize>,
    pub resample_seed: Option<u64>,
}

/// Shared bin count of a batch, or `None` for an empty batch.
pub fn shared_bin_count(batch: &[Histogram]) -> Result<Option<usize>, EncodeError> {
    let Some(first) = batch.first() else {
        return Ok(None);
    };
    let expected = first.bin_count();
    for hist in &batch[1..] {
        if hist.bin_count() != expected {
            return Err(EncodeError::SchemaMismatch {
                first: first.name().to_string(),
                expected,
                name: hist.name().to_string(),
                found: hist.bin_count(),
            });
        }
    }
    Ok(Some(expected))
}

/// Name of the linear-encoding column for 0-based bin `index`.
pub fn linear_column_name(index: usize) -> String {
    format!("var{index}")
}

/// Linear feature row of one waveform.
pub fn linear_row(hist: &Histogram) -> Vec<f32> {
    hist.contents().iter().map(|&v| v as f32).collect()
}

/// Encode a batch of normalized waveforms into a table named `table_name`.
pub fn encode(table_name: &str, batch: &[Histogram], options: &EncodingOptions) -> Result<Encoded, EncodeError> {
    encode_with_bins(table_name, batch, options, None)
}

/// Like [`encode`], with the bin count of sibling tables. An empty linear
/// batch then still gets one `varN` column per bin.
pub fn encode_with_bins(
    table_name: &str,
    batch: &[Histogram],
    options: &EncodingOptions,
    sibling_bins: Option<usize>,
) -> Result<Encoded, EncodeError> {
    let bin_count = shared_bin_count(batch)?;
    let mut resample_seed = None;
    let table = match options.kind {
        Encoding::Linear => encode_linear(table_name, batch, bin_count.or(sibling_bins).unwrap_or(0))?,
        Encoding::PointPair => encode_point_pairs(table_name, batch)?,
        Encoding::Resampled => {
            let seed = options.resample_seed.unwrap_or_else(|| rand::rng().random());
            resample_seed = Some(seed);
            encode_resampled(table_name, batch, options.resample_count, seed)?
        }
    };
    info!(
        "Encoded {} waveforms into table {} ({}, {} rows x {} columns)",
        batch.len(),
        table_name,
        options.kind.as_str(),
        table.row_count(),
        table.column_count()
    );
    Ok(Encoded {
        table,
        bin_count,
        resample_seed,
    })
}

fn encode_linear(table_name: &str, batch: &[Histogram], bins: usize) -> Result<Table, EncodeError> {
    let mut table = Table::new(table_name);
    for index in 0..bins {
        table.add_column(linear_column_name(index), ColumnKind::Feature)?;
    }
    for hist in batch {
        table.append_row_from(hist.name(), &linear_row(hist))?;
    }
    Ok(table)
}

fn encode_point_pairs(table_name: &str, batch: &[Histogram]) -> Result<Table, EncodeError> {
    let mut table = Table::new(table_name);
    table.add_column("x", ColumnKind::Time)?;
    table.add_column("y", ColumnKind::Amplitude)?;
    for hist in batch {
        for bin in 1..=hist.bin_count() {
            let y = hist.bin_content(bin).unwrap_or(0.0);
            table.append_row(&[hist.bin_center(bin) as f32, y as f32])?;
        }
    }
    Ok(table)
}

fn encode_resampled(table_name: &str, batch: &[Histogram], count: usize, seed: u64) -> Result<Table, EncodeError> {
    debug!("Resampling {} waveforms with seed {seed}", batch.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut table = Table::new(table_name);
    let mut columns = Vec::with_capacity(batch.len());
    for hist in batch {
        table.add_column(hist.name(), ColumnKind::Event)?;
        let sampler = DensitySampler::new(hist).ok_or_else(|| EncodeError::EmptyDistribution {
            name: hist.name().to_string(),
        })?;
        columns.push((0..count).map(|_| sampler.sample_f32(&mut rng)).collect::<Vec<_>>());
    }
    if columns.is_empty() {
        return Ok(table);
    }
    let mut row = vec![0.0f32; columns.len()];
    for event in 0..count {
        for (slot, column) in row.iter_mut().zip(&columns) {
            *slot = column[event];
        }
        table.append_row(&row)?;
    }
    Ok(table)
}

/// Inverse-CDF sampler over a histogram treated as a binned density.
///
/// Negative bin contents count as zero density. A bin is chosen with
/// probability proportional to its content, then a point is drawn uniformly
/// inside it, so every draw lies in `[low_edge, high_edge)` of a non-empty bin.
#[derive(Debug, Clone)]
pub struct DensitySampler {
    low: f64,
    width: f64,
    cumulative: Vec<f64>,
}

impl DensitySampler {
    /// `None` when the histogram holds no positive content.
    pub fn new(hist: &Histogram) -> Option<Self> {
        let mut total = 0.0f64;
        let mut last_filled = None;
        let mut cumulative = Vec::with_capacity(hist.bin_count());
        for (idx, &value) in hist.contents().iter().enumerate() {
            if value.is_finite() && value > 0.0 {
                total += value;
                last_filled = Some(idx);
            }
            cumulative.push(total);
        }
        let last_filled = last_filled?;
        for value in &mut cumulative {
            *value /= total;
        }
        // Pin the tail to exactly 1 so rounding can never select a trailing empty bin.
        for value in &mut cumulative[last_filled..] {
            *value = 1.0;
        }
        Some(Self {
            low: hist.low_edge(),
            width: hist.bin_width(),
            cumulative,
        })
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        self.draw(rng).0
    }

    /// Draw narrowed to `f32`, stepped back inside its bin when rounding
    /// lands it on an edge.
    pub fn sample_f32(&self, rng: &mut impl Rng) -> f32 {
        let (x, bin_low, bin_high) = self.draw(rng);
        let mut stored = x as f32;
        if stored as f64 >= bin_high {
            stored = stored.next_down();
        }
        if (stored as f64) < bin_low {
            stored = stored.next_up();
        }
        stored
    }

    /// A draw plus the `[low, high)` edges of its bin.
    fn draw(&self, rng: &mut impl Rng) -> (f64, f64, f64) {
        let u: f64 = rng.random();
        // First bin whose cumulative share exceeds `u`; zero-content bins are never picked.
        let idx = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len() - 1);
        let bin_low = self.low + idx as f64 * self.width;
        let bin_high = self.low + (idx + 1) as f64 * self.width;
        let x = bin_low + (bin_high - bin_low) * rng.random::<f64>();
        let x = if x >= bin_high { bin_low } else { x };
        (x, bin_low, bin_high)
    }
}

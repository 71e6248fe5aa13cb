//! Equal-width binned series with axis metadata.
//!
//! Bins are addressed `1..=N`; bin 0 and bin `N + 1` are the under/overflow
//! positions returned by [`Histogram::find_bin`] but never store content.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised when building or editing a histogram.
#[derive(Debug, Error, PartialEq)]
pub enum HistogramError {
    /// The requested axis has no bins.
    #[error("histogram {name} needs at least one bin")]
    NoBins { name: String },
    /// The requested axis is empty, inverted, or not finite.
    #[error("invalid axis [{low}, {high}) for histogram {name}")]
    InvalidAxis { name: String, low: f64, high: f64 },
    /// A bin index outside `1..=N` was addressed.
    #[error("bin {bin} out of range 1..={bins}")]
    BinOutOfRange { bin: usize, bins: usize },
}

/// Binned representation of one waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    name: String,
    source: Option<PathBuf>,
    low: f64,
    high: f64,
    contents: Vec<f64>,
}

impl Histogram {
    /// Create a zero-filled histogram with `bins` equal-width bins over `[low, high)`.
    pub fn new(name: impl Into<String>, bins: usize, low: f64, high: f64) -> Result<Self, HistogramError> {
        let name = name.into();
        if bins == 0 {
            return Err(HistogramError::NoBins { name });
        }
        if !low.is_finite() || !high.is_finite() || high <= low {
            return Err(HistogramError::InvalidAxis { name, low, high });
        }
        Ok(Self {
            name,
            source: None,
            low,
            high,
            contents: vec![0.0; bins],
        })
    }

    /// Create a histogram whose bin `i` holds `contents[i - 1]`.
    pub fn from_contents(
        name: impl Into<String>,
        low: f64,
        high: f64,
        contents: Vec<f64>,
    ) -> Result<Self, HistogramError> {
        let mut hist = Self::new(name, contents.len(), low, high)?;
        hist.contents = contents;
        Ok(hist)
    }

    /// Attach the path of the file the histogram was read from.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Waveform identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the waveform was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of bins `N`.
    pub fn bin_count(&self) -> usize {
        self.contents.len()
    }

    /// Lower edge of bin 1.
    pub fn low_edge(&self) -> f64 {
        self.low
    }

    /// Upper edge of bin `N`.
    pub fn high_edge(&self) -> f64 {
        self.high
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.contents.len() as f64
    }

    /// Lower edge of `bin`; bins outside `1..=N` extrapolate along the axis.
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.low + (bin as f64 - 1.0) * self.bin_width()
    }

    pub fn bin_high_edge(&self, bin: usize) -> f64 {
        self.low + bin as f64 * self.bin_width()
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.low + (bin as f64 - 0.5) * self.bin_width()
    }

    /// Content of `bin`, or `None` outside `1..=N`.
    pub fn bin_content(&self, bin: usize) -> Option<f64> {
        bin.checked_sub(1).and_then(|idx| self.contents.get(idx).copied())
    }

    pub fn set_bin_content(&mut self, bin: usize, value: f64) -> Result<(), HistogramError> {
        let bins = self.contents.len();
        let slot = bin
            .checked_sub(1)
            .and_then(|idx| self.contents.get_mut(idx))
            .ok_or(HistogramError::BinOutOfRange { bin, bins })?;
        *slot = value;
        Ok(())
    }

    /// Bin contents in bin order (`contents()[0]` is bin 1).
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut [f64] {
        &mut self.contents
    }

    /// Bin holding `x`: 0 below the axis, `N + 1` at or above the upper edge.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.low {
            return 0;
        }
        if x >= self.high {
            return self.contents.len() + 1;
        }
        let bin = ((x - self.low) / self.bin_width()).floor() as usize + 1;
        bin.min(self.contents.len())
    }

    /// First bin holding the smallest content.
    pub fn minimum_bin(&self) -> usize {
        let mut best_bin = 1usize;
        let mut best = f64::INFINITY;
        for (idx, &value) in self.contents.iter().enumerate() {
            if value < best {
                best = value;
                best_bin = idx + 1;
            }
        }
        best_bin
    }

    /// Smallest bin content.
    pub fn minimum(&self) -> f64 {
        self.contents.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Center of the bin holding the smallest content.
    pub fn minimum_bin_center(&self) -> f64 {
        self.bin_center(self.minimum_bin())
    }

    /// Mean bin content.
    pub fn mean_content(&self) -> f64 {
        self.contents.iter().sum::<f64>() / self.contents.len() as f64
    }

    /// Sum of content times bin width.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum::<f64>() * self.bin_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Histogram {
        Histogram::from_contents("ramp", 0.0, 4.0, vec![3.0, -1.0, 2.0, -1.0]).unwrap()
    }

    #[test]
    fn rejects_degenerate_axes() {
        assert!(matches!(
            Histogram::new("h", 0, 0.0, 1.0),
            Err(HistogramError::NoBins { .. })
        ));
        assert!(matches!(
            Histogram::new("h", 3, 1.0, 1.0),
            Err(HistogramError::InvalidAxis { .. })
        ));
        assert!(matches!(
            Histogram::new("h", 3, 0.0, f64::NAN),
            Err(HistogramError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn bins_are_one_based() {
        let mut hist = ramp();
        assert_eq!(hist.bin_content(0), None);
        assert_eq!(hist.bin_content(1), Some(3.0));
        assert_eq!(hist.bin_content(4), Some(-1.0));
        assert_eq!(hist.bin_content(5), None);
        hist.set_bin_content(2, 7.0).unwrap();
        assert_eq!(hist.bin_content(2), Some(7.0));
        assert_eq!(
            hist.set_bin_content(5, 1.0),
            Err(HistogramError::BinOutOfRange { bin: 5, bins: 4 })
        );
    }

    #[test]
    fn find_bin_reports_under_and_overflow() {
        let hist = ramp();
        assert_eq!(hist.find_bin(-0.1), 0);
        assert_eq!(hist.find_bin(0.0), 1);
        assert_eq!(hist.find_bin(0.99), 1);
        assert_eq!(hist.find_bin(1.0), 2);
        assert_eq!(hist.find_bin(3.99), 4);
        assert_eq!(hist.find_bin(4.0), 5);
    }

    #[test]
    fn minimum_uses_first_lowest_bin() {
        let hist = ramp();
        assert_eq!(hist.minimum(), -1.0);
        assert_eq!(hist.minimum_bin(), 2);
        assert_eq!(hist.minimum_bin_center(), 1.5);
    }

    #[test]
    fn summary_statistics() {
        let hist = Histogram::from_contents("h", 0.0, 2.0, vec![1.0, 3.0, 2.0, 2.0]).unwrap();
        assert_eq!(hist.bin_width(), 0.5);
        assert_eq!(hist.mean_content(), 2.0);
        assert_eq!(hist.integral(), 4.0);
        assert_eq!(hist.bin_low_edge(2), 0.5);
        assert_eq!(hist.bin_high_edge(2), 1.0);
    }
}

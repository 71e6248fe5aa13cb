//! Polarity inversion and cropping of accepted waveforms.

use serde::{Deserialize, Serialize};

use crate::waveform::{Histogram, HistogramError};

/// Default right edge of the canonical window (300 ns).
pub const DEFAULT_RIGHT_EDGE_SECONDS: f64 = 300e-9;

/// Normalization parameters, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Upper time bound of the cropped window (s).
    #[serde(alias = "rightEdgeSeconds")]
    pub right_edge_seconds: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            right_edge_seconds: DEFAULT_RIGHT_EDGE_SECONDS,
        }
    }
}

/// Map negative-going pulses onto a positive scale; non-negative bins become 0.
pub fn invert(hist: &mut Histogram) {
    for value in hist.contents_mut() {
        *value = if *value >= 0.0 { 0.0 } else { -*value };
    }
}

/// Copy bins `first..=last` into a new histogram spanning exactly those bins.
///
/// Bin numbers are clamped to `1..=N`, and `last` is raised to `first` when it
/// falls below it, so the result always has at least one bin.
pub fn crop(hist: &Histogram, first: usize, last: usize) -> Result<Histogram, HistogramError> {
    let bins = hist.bin_count();
    let first = first.clamp(1, bins);
    let last = last.clamp(1, bins).max(first);
    let contents = hist.contents()[first - 1..last].to_vec();
    let cropped = Histogram::from_contents(
        hist.name(),
        hist.bin_low_edge(first),
        hist.bin_high_edge(last),
        contents,
    )?;
    Ok(match hist.source() {
        Some(source) => cropped.with_source(source),
        None => cropped,
    })
}

/// Invert a copy of `hist` and crop it to `[first bin center, right edge]`.
pub fn normalize(hist: &Histogram, options: &NormalizeOptions) -> Result<Histogram, HistogramError> {
    let mut inverted = hist.clone();
    invert(&mut inverted);
    let first = inverted.find_bin(inverted.bin_center(1));
    let last = inverted.find_bin(options.right_edge_seconds);
    crop(&inverted, first, last)
}

/// Normalize every waveform of a batch.
pub fn normalize_batch(batch: &[Histogram], options: &NormalizeOptions) -> Result<Vec<Histogram>, HistogramError> {
    batch.iter().map(|hist| normalize(hist, options)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse() -> Histogram {
        Histogram::from_contents("p", 0.0, 6.0, vec![0.2, -0.1, -0.4, 0.0, -0.3, 0.1]).unwrap()
    }

    #[test]
    fn invert_zeroes_baseline_and_flips_pulse() {
        let mut hist = pulse();
        invert(&mut hist);
        assert_eq!(hist.contents(), &[0.0, 0.1, 0.4, 0.0, 0.3, 0.0]);
    }

    #[test]
    fn second_inversion_zeroes_everything_left() {
        let mut hist = pulse();
        invert(&mut hist);
        let once = hist.clone();
        invert(&mut hist);
        assert_ne!(hist, once);
        assert!(hist.contents().iter().all(|&v| v == 0.0));

        let mut baseline = Histogram::from_contents("b", 0.0, 2.0, vec![0.0, 0.0]).unwrap();
        let before = baseline.clone();
        invert(&mut baseline);
        assert_eq!(baseline, before);
    }

    #[test]
    fn crop_copies_exact_sub_range() {
        let hist = pulse();
        let cropped = crop(&hist, 2, 4).unwrap();
        assert_eq!(cropped.bin_count(), 3);
        assert_eq!(cropped.contents(), &hist.contents()[1..4]);
        assert_eq!(cropped.low_edge(), 1.0);
        assert_eq!(cropped.high_edge(), 4.0);
        assert_eq!(hist.bin_count(), 6);
    }

    #[test]
    fn crop_clamps_requested_bins() {
        let hist = pulse();
        let cropped = crop(&hist, 0, 99).unwrap();
        assert_eq!(cropped.bin_count(), 6);
        let reversed = crop(&hist, 5, 2).unwrap();
        assert_eq!(reversed.bin_count(), 1);
        assert_eq!(reversed.low_edge(), 4.0);
    }

    #[test]
    fn normalize_crops_to_right_edge_without_touching_source() {
        let hist = pulse();
        let out = normalize(&hist, &NormalizeOptions { right_edge_seconds: 3.5 }).unwrap();
        assert_eq!(out.bin_count(), 4);
        assert_eq!(out.contents(), &[0.0, 0.1, 0.4, 0.0]);
        assert_eq!(out.low_edge(), 0.0);
        assert_eq!(out.high_edge(), 4.0);
        assert_eq!(hist, pulse());
    }

    #[test]
    fn right_edge_beyond_axis_keeps_all_bins() {
        let hist = pulse();
        let out = normalize(&hist, &NormalizeOptions { right_edge_seconds: 1e3 }).unwrap();
        assert_eq!(out.bin_count(), 6);
    }
}

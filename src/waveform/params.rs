use serde::{Deserialize, Serialize};

use super::histogram::Histogram;

/// Shape parameters recorded for every ingested waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformParameters {
    pub name: String,
    /// Smallest amplitude (V).
    pub min_amplitude: f64,
    /// Time of the smallest amplitude (s).
    pub peak_position: f64,
    pub mean_amplitude: f64,
    /// Amplitude integrated over time (V·s).
    pub integral: f64,
    pub bin_count: usize,
}

impl WaveformParameters {
    pub fn measure(hist: &Histogram) -> Self {
        Self {
            name: hist.name().to_string(),
            min_amplitude: hist.minimum(),
            peak_position: hist.minimum_bin_center(),
            mean_amplitude: hist.mean_content(),
            integral: hist.integral(),
            bin_count: hist.bin_count(),
        }
    }
}

//! Noise rejection for raw waveforms.
//!
//! A waveform is kept when its most negative sample dips below the voltage
//! threshold, sits inside the expected peak window, and the acquisition has
//! the expected number of bins. The gate never removes items from the input
//! while walking it; survivors and rejects are collected into new vectors.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::waveform::Histogram;

/// Thresholds applied by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// The minimum amplitude must be below this value (V).
    #[serde(alias = "voltageThreshold")]
    pub voltage_threshold: f64,
    /// Earliest accepted time of the minimum (s).
    #[serde(alias = "minPeakPosition")]
    pub min_peak_position: f64,
    /// Latest accepted time of the minimum (s).
    #[serde(alias = "maxPeakPosition")]
    pub max_peak_position: f64,
    #[serde(alias = "expectedBinCount")]
    pub expected_bin_count: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            voltage_threshold: -0.03,
            min_peak_position: -1e-8,
            max_peak_position: 2e-8,
            expected_bin_count: 10_000,
        }
    }
}

/// Why a waveform failed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Minimum amplitude is not below the voltage threshold.
    AmplitudeAboveThreshold,
    PeakBeforeWindow,
    PeakAfterWindow,
    BinCountMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Vec<RejectReason>),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Pure predicate over one raw waveform.
pub fn evaluate(hist: &Histogram, thresholds: &QualityThresholds) -> Verdict {
    let min_value = hist.minimum();
    let peak_time = hist.minimum_bin_center();
    let mut reasons = Vec::new();
    // NaN comparisons are false, so a NaN minimum must be rejected explicitly.
    if !(min_value <= thresholds.voltage_threshold) {
        reasons.push(RejectReason::AmplitudeAboveThreshold);
    }
    if peak_time < thresholds.min_peak_position {
        reasons.push(RejectReason::PeakBeforeWindow);
    }
    if peak_time > thresholds.max_peak_position {
        reasons.push(RejectReason::PeakAfterWindow);
    }
    if hist.bin_count() != thresholds.expected_bin_count {
        reasons.push(RejectReason::BinCountMismatch);
    }
    if reasons.is_empty() {
        Verdict::Accept
    } else {
        Verdict::Reject(reasons)
    }
}

/// One rejected waveform as listed in the gate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub name: String,
    pub reasons: Vec<RejectReason>,
}

/// Accept/reject counts for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub accepted_percent: f64,
    pub rejected_percent: f64,
    pub thresholds: QualityThresholds,
    pub rejections: Vec<Rejection>,
}

impl GateReport {
    /// No waveform survived (including the empty-batch case).
    pub fn has_no_survivors(&self) -> bool {
        self.accepted == 0
    }
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub accepted: Vec<Histogram>,
    pub rejected: Vec<Histogram>,
    pub report: GateReport,
}

/// Split a batch into survivors and rejects, preserving input order in both.
pub fn partition(batch: Vec<Histogram>, thresholds: &QualityThresholds) -> GateOutcome {
    let total = batch.len();
    let mut accepted = Vec::with_capacity(total);
    let mut rejected = Vec::new();
    let mut rejections = Vec::new();
    for hist in batch {
        match evaluate(&hist, thresholds) {
            Verdict::Accept => accepted.push(hist),
            Verdict::Reject(reasons) => {
                warn!("Removing waveform \"{}\": {:?}", hist.name(), reasons);
                rejections.push(Rejection {
                    name: hist.name().to_string(),
                    reasons,
                });
                rejected.push(hist);
            }
        }
    }
    let report = GateReport {
        total,
        accepted: accepted.len(),
        rejected: rejected.len(),
        accepted_percent: percent(accepted.len(), total),
        rejected_percent: percent(rejected.len(), total),
        thresholds: *thresholds,
        rejections,
    };
    info!(
        "Quality gate: {} of {} accepted ({:.1}%), {} rejected ({:.1}%)",
        report.accepted, report.total, report.accepted_percent, report.rejected, report.rejected_percent
    );
    GateOutcome {
        accepted,
        rejected,
        report,
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

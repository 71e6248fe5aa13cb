use std::fmt::Write as _;
use std::path::Path;

use super::BINS;

/// Sample spacing of the synthetic acquisitions (1 ns).
pub const STEP: f64 = 1e-9;
/// Time of the first sample.
pub const START: f64 = -20e-9;

/// A Gaussian dip of depth `amplitude` centered at `peak_time`.
pub fn pulse(bins: usize, amplitude: f64, peak_time: f64, width: f64) -> Vec<(f64, f64)> {
    (0..bins)
        .map(|idx| {
            let t = START + idx as f64 * STEP;
            let z = (t - peak_time) / width;
            (t, -amplitude * (-z * z).exp())
        })
        .collect()
}

pub fn write_waveform(path: &Path, samples: &[(f64, f64)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create waveform dir");
    }
    let mut text = String::from("time,amplitude\n");
    for (t, v) in samples {
        writeln!(text, "{t:e},{v:e}").expect("format sample");
    }
    std::fs::write(path, text).expect("write waveform");
}

/// Narrow, deep pulse that passes the default thresholds.
pub fn signal_like(idx: usize) -> Vec<(f64, f64)> {
    pulse(BINS, 0.2 + 0.01 * idx as f64, 5e-9, 2e-9)
}

/// Broad, shallow pulse that still passes the default thresholds.
pub fn background_like(idx: usize) -> Vec<(f64, f64)> {
    pulse(BINS, 0.06 + 0.002 * idx as f64, 2e-9, 12e-9)
}

/// Write `accepted` good waveforms plus one of each rejection kind.
pub fn write_mixed_dir(dir: &Path, accepted: usize, make: fn(usize) -> Vec<(f64, f64)>) {
    for idx in 0..accepted {
        write_waveform(&dir.join(format!("wf_{idx:03}.csv")), &make(idx));
    }
    write_waveform(&dir.join("reject_shallow.csv"), &pulse(BINS, 0.01, 5e-9, 2e-9));
    write_waveform(&dir.join("reject_late.csv"), &pulse(BINS, 0.2, 50e-9, 2e-9));
    write_waveform(&dir.join("reject_short.csv"), &pulse(BINS - 10, 0.2, 5e-9, 2e-9));
}

use serde::{Deserialize, Serialize};

use super::model::{BoostedStumps, Stump};
use crate::ml::{BACKGROUND_CLASS, ModelError, SIGNAL_CLASS, TrainSet, sigmoid};

/// Boosting hyperparameters, read from `[methods.bdt]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BdtOptions {
    /// Number of boosting rounds.
    pub rounds: usize,
    /// Shrinkage applied to every stump.
    pub learning_rate: f32,
    /// Number of bins used for split search.
    pub bins: usize,
}

impl Default for BdtOptions {
    fn default() -> Self {
        Self {
            rounds: 100,
            learning_rate: 0.1,
            bins: 32,
        }
    }
}

const LEAF_HESSIAN_FLOOR: f32 = 1e-3;
const LOGIT_CLAMP: f32 = 8.0;

/// Train a boosted stump ensemble with logistic loss.
pub fn train_bdt(set: &TrainSet, options: &BdtOptions) -> Result<BoostedStumps, ModelError> {
    set.check_trainable()?;
    if options.learning_rate.is_nan() || options.learning_rate <= 0.0 {
        return Err(ModelError::Training("learning_rate must be > 0".to_string()));
    }
    let n = set.len();
    let d = set.feature_len;
    let bins = options.bins.clamp(2, 256);
    let (mins, maxs) = compute_feature_min_max(&set.x, d);
    let binned = bin_features(&set.x, &mins, &maxs, bins);

    let prior = set.signal_count() as f32 / n as f32;
    let init_logit = (prior / (1.0 - prior)).ln().clamp(-LOGIT_CLAMP, LOGIT_CLAMP);
    let mut logits = vec![init_logit; n];

    let mut stumps = Vec::with_capacity(options.rounds);
    for _round in 0..options.rounds {
        let mut gradients = Vec::with_capacity(n);
        let mut hessians = Vec::with_capacity(n);
        for (logit, &signal) in logits.iter().zip(&set.y) {
            let p = sigmoid(*logit);
            gradients.push(if signal { 1.0 } else { 0.0 } - p);
            hessians.push(p * (1.0 - p));
        }
        let stump = fit_best_stump(&binned, &set.x, &mins, &maxs, bins, &gradients, &hessians);
        for (logit, row) in logits.iter_mut().zip(&set.x) {
            *logit += options.learning_rate * stump.predict(row);
        }
        stumps.push(stump);
    }

    let model = BoostedStumps {
        model_version: 1,
        feature_len: d,
        classes: vec![BACKGROUND_CLASS.to_string(), SIGNAL_CLASS.to_string()],
        learning_rate: options.learning_rate,
        init_logit,
        stumps,
    };
    model.validate()?;
    Ok(model)
}

fn compute_feature_min_max(x: &[Vec<f32>], feature_len: usize) -> (Vec<f32>, Vec<f32>) {
    let mut mins = vec![f32::INFINITY; feature_len];
    let mut maxs = vec![f32::NEG_INFINITY; feature_len];
    for row in x {
        for (j, &v) in row.iter().take(feature_len).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for (min, max) in mins.iter_mut().zip(maxs.iter_mut()) {
        if !min.is_finite() || !max.is_finite() {
            *min = 0.0;
            *max = 0.0;
        }
        if *min == *max {
            *max = *min + 1.0;
        }
    }
    (mins, maxs)
}

fn bin_features(x: &[Vec<f32>], mins: &[f32], maxs: &[f32], bins: usize) -> Vec<Vec<u8>> {
    let last = bins - 1;
    x.iter()
        .map(|row| {
            mins.iter()
                .zip(maxs)
                .enumerate()
                .map(|(j, (&min, &max))| {
                    let v = row.get(j).copied().unwrap_or(0.0);
                    let t = ((v - min) / (max - min)).clamp(0.0, 1.0);
                    // Every value in bin b lies at or below threshold_for_bin(b).
                    ((t * bins as f32).floor() as usize).min(last) as u8
                })
                .collect()
        })
        .collect()
}

fn fit_best_stump(
    binned: &[Vec<u8>],
    x: &[Vec<f32>],
    mins: &[f32],
    maxs: &[f32],
    bins: usize,
    gradients: &[f32],
    hessians: &[f32],
) -> Stump {
    let mut best = BestSplit::default();
    for feature_idx in 0..mins.len() {
        let split = best_split_for_feature(binned, gradients, feature_idx, bins);
        if split.score < best.score {
            best = split;
        }
    }

    let feature_idx = best.feature_index;
    let threshold = threshold_for_bin(mins[feature_idx], maxs[feature_idx], best.split_bin, bins);
    let (left_value, right_value) =
        newton_leaves(x, gradients, hessians, feature_idx, threshold);
    Stump {
        feature_index: feature_idx as u32,
        threshold,
        left_value,
        right_value,
    }
}

#[derive(Debug, Clone)]
struct BestSplit {
    score: f64,
    feature_index: usize,
    split_bin: usize,
}

impl Default for BestSplit {
    fn default() -> Self {
        Self {
            score: f64::INFINITY,
            feature_index: 0,
            split_bin: 0,
        }
    }
}

/// Lowest residual sum of squares over all bin boundaries of one feature.
fn best_split_for_feature(
    binned: &[Vec<u8>],
    residuals: &[f32],
    feature_idx: usize,
    bins: usize,
) -> BestSplit {
    let mut counts = vec![0u32; bins];
    let mut sums = vec![0f64; bins];
    let mut sums_sq = vec![0f64; bins];
    for (row, &r) in binned.iter().zip(residuals) {
        let b = row.get(feature_idx).copied().unwrap_or(0) as usize;
        let r = r as f64;
        counts[b] += 1;
        sums[b] += r;
        sums_sq[b] += r * r;
    }
    let total_count: u32 = counts.iter().sum();
    if total_count == 0 {
        return BestSplit::default();
    }
    let total_sum: f64 = sums.iter().sum();
    let total_sum_sq: f64 = sums_sq.iter().sum();

    let mut best = BestSplit {
        score: f64::INFINITY,
        feature_index: feature_idx,
        split_bin: 0,
    };
    let mut left_count = 0u32;
    let mut left_sum = 0f64;
    let mut left_sum_sq = 0f64;
    for split_bin in 0..(bins - 1) {
        left_count += counts[split_bin];
        left_sum += sums[split_bin];
        left_sum_sq += sums_sq[split_bin];
        let right_count = total_count - left_count;
        if left_count == 0 || right_count == 0 {
            continue;
        }
        let right_sum = total_sum - left_sum;
        let right_sum_sq = total_sum_sq - left_sum_sq;
        let left_sse = left_sum_sq - (left_sum * left_sum) / left_count as f64;
        let right_sse = right_sum_sq - (right_sum * right_sum) / right_count as f64;
        let score = left_sse + right_sse;
        if score < best.score {
            best.score = score;
            best.split_bin = split_bin;
        }
    }
    best
}

fn threshold_for_bin(min: f32, max: f32, split_bin: usize, bins: usize) -> f32 {
    let t = ((split_bin + 1) as f32) / (bins as f32);
    min + t * (max - min)
}

fn newton_leaves(
    x: &[Vec<f32>],
    gradients: &[f32],
    hessians: &[f32],
    feature_idx: usize,
    threshold: f32,
) -> (f32, f32) {
    let mut left = (0.0f32, 0.0f32);
    let mut right = (0.0f32, 0.0f32);
    for ((row, &g), &h) in x.iter().zip(gradients).zip(hessians) {
        let v = row.get(feature_idx).copied().unwrap_or(0.0);
        let side = if v <= threshold { &mut left } else { &mut right };
        side.0 += g;
        side.1 += h;
    }
    let leaf = |(g, h): (f32, f32)| (g / h.max(LEAF_HESSIAN_FLOOR)).clamp(-LOGIT_CLAMP, LOGIT_CLAMP);
    (leaf(left), leaf(right))
}

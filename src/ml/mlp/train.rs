use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::MlpModel;
use crate::ml::{BACKGROUND_CLASS, ModelError, SIGNAL_CLASS, TrainSet, sigmoid};

/// Network hyperparameters, read from `[methods.dnn]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnnOptions {
    pub hidden_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub l2_penalty: f32,
    /// Weight classes inversely to their frequency.
    pub balance_classes: bool,
    pub seed: u64,
}

impl Default for DnnOptions {
    fn default() -> Self {
        Self {
            hidden_size: 32,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.05,
            l2_penalty: 1e-4,
            balance_classes: true,
            seed: 42,
        }
    }
}

/// Train with mini-batch gradient descent on binary cross-entropy.
pub fn train_dnn(set: &TrainSet, options: &DnnOptions) -> Result<MlpModel, ModelError> {
    set.check_trainable()?;
    let d = set.feature_len;
    if d == 0 {
        return Err(ModelError::Training("rows have no features".to_string()));
    }
    let hidden = options.hidden_size.max(1);
    let batch_size = options.batch_size.max(1);

    let (mean, std) = feature_mean_std(&set.x, d);
    let mut rng = StdRng::seed_from_u64(options.seed);

    let mut weights1 = vec![0.0f32; hidden * d];
    let mut bias1 = vec![0.0f32; hidden];
    let mut weights2 = vec![0.0f32; hidden];
    let mut bias2 = 0.0f32;
    let scale1 = (2.0 / d as f32).sqrt();
    for w in &mut weights1 {
        *w = (rng.random::<f32>() - 0.5) * 2.0 * scale1;
    }
    for w in &mut weights2 {
        *w = (rng.random::<f32>() - 0.5) * 0.2;
    }

    let (background_weight, signal_weight) = if options.balance_classes {
        let signal = set.signal_count() as f32;
        let total = set.len() as f32;
        (total / (2.0 * (total - signal)), total / (2.0 * signal))
    } else {
        (1.0, 1.0)
    };

    let normalized: Vec<Vec<f32>> = set
        .x
        .iter()
        .map(|row| {
            row.iter()
                .zip(mean.iter().zip(&std))
                .map(|(&x, (&m, &s))| (x - m) / s.max(1e-6))
                .collect()
        })
        .collect();

    let mut indices: Vec<usize> = (0..set.len()).collect();
    let mut hidden_pre = vec![0.0f32; hidden];
    let mut hidden_act = vec![0.0f32; hidden];
    for _epoch in 0..options.epochs {
        indices.shuffle(&mut rng);
        for batch in indices.chunks(batch_size) {
            let mut d_w1 = vec![0.0f32; weights1.len()];
            let mut d_b1 = vec![0.0f32; hidden];
            let mut d_w2 = vec![0.0f32; hidden];
            let mut d_b2 = 0.0f32;
            let mut batch_weight = 0.0f32;

            for &idx in batch {
                let x = &normalized[idx];
                let mut logit = bias2;
                for h in 0..hidden {
                    let row = &weights1[h * d..(h + 1) * d];
                    let pre = bias1[h] + row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>();
                    hidden_pre[h] = pre;
                    hidden_act[h] = pre.max(0.0);
                    logit += weights2[h] * hidden_act[h];
                }
                let (target, weight) = if set.y[idx] {
                    (1.0, signal_weight)
                } else {
                    (0.0, background_weight)
                };
                let dz2 = (sigmoid(logit) - target) * weight;
                d_b2 += dz2;
                for h in 0..hidden {
                    d_w2[h] += dz2 * hidden_act[h];
                    if hidden_pre[h] <= 0.0 {
                        continue;
                    }
                    let d_hidden = dz2 * weights2[h];
                    d_b1[h] += d_hidden;
                    let grad_row = &mut d_w1[h * d..(h + 1) * d];
                    for (g, v) in grad_row.iter_mut().zip(x) {
                        *g += d_hidden * v;
                    }
                }
                batch_weight += weight;
            }

            let scale = options.learning_rate / batch_weight.max(f32::EPSILON);
            let l2 = options.l2_penalty;
            for (w, g) in weights1.iter_mut().zip(&d_w1) {
                *w -= scale * (g + l2 * *w);
            }
            for (b, g) in bias1.iter_mut().zip(&d_b1) {
                *b -= scale * g;
            }
            for (w, g) in weights2.iter_mut().zip(&d_w2) {
                *w -= scale * (g + l2 * *w);
            }
            bias2 -= scale * d_b2;
        }
    }

    if weights1.iter().chain(&weights2).any(|w| !w.is_finite()) {
        return Err(ModelError::Training(
            "weights diverged; lower the learning rate".to_string(),
        ));
    }

    let model = MlpModel {
        model_version: 1,
        feature_len: d,
        classes: vec![BACKGROUND_CLASS.to_string(), SIGNAL_CLASS.to_string()],
        hidden_size: hidden,
        weights1,
        bias1,
        weights2,
        bias2,
        feature_mean: mean,
        feature_std: std,
    };
    model.validate()?;
    Ok(model)
}

fn feature_mean_std(rows: &[Vec<f32>], d: usize) -> (Vec<f32>, Vec<f32>) {
    let n = rows.len().max(1) as f32;
    let mut mean = vec![0.0f32; d];
    for row in rows {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut std = vec![0.0f32; d];
    for row in rows {
        for ((s, &v), &m) in std.iter_mut().zip(row).zip(&mean) {
            let diff = v - m;
            *s += diff * diff;
        }
    }
    for s in &mut std {
        *s = (*s / n).sqrt();
    }
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> TrainSet {
        let mut set = TrainSet::new(2);
        for i in 0..30 {
            let t = i as f32 / 30.0;
            set.push(&[-1.0 + 0.2 * t, 0.5 - 0.1 * t], false);
            set.push(&[1.0 + 0.2 * t, -0.5 + 0.1 * t], true);
        }
        set
    }

    #[test]
    fn separates_two_blobs() {
        let model = train_dnn(
            &blobs(),
            &DnnOptions {
                hidden_size: 8,
                epochs: 100,
                batch_size: 8,
                ..DnnOptions::default()
            },
        )
        .unwrap();
        assert!(model.response(&[-1.0, 0.5]) < 0.2);
        assert!(model.response(&[1.1, -0.45]) > 0.8);
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let options = DnnOptions {
            epochs: 3,
            ..DnnOptions::default()
        };
        let a = train_dnn(&blobs(), &options).unwrap();
        let b = train_dnn(&blobs(), &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mean_std_matches_hand_computation() {
        let (mean, std) = feature_mean_std(&[vec![1.0, 0.0], vec![3.0, 0.0]], 2);
        assert_eq!(mean, vec![2.0, 0.0]);
        assert_eq!(std, vec![1.0, 0.0]);
    }
}

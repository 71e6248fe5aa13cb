//! Evaluation metrics for signal/background classifiers.

use serde::{Deserialize, Serialize};

/// Confusion matrix for a `K`-class classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassStats {
    pub class_id: String,
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Held-out evaluation written next to a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub method: String,
    /// Response value at which rows count as signal.
    pub cut: f64,
    pub rows: u64,
    pub accuracy: f32,
    pub per_class: Vec<PerClassStats>,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix, classes: &[&str]) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
                fp += cm.get(j, class_idx) as f32;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            class_id: classes.get(class_idx).copied().unwrap_or("?").to_string(),
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|i| cm.get(i, i) as u64).sum();
    correct as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_precision_recall() {
        let mut cm = ConfusionMatrix::new(2);
        // truth background: 3 right, 1 wrong; truth signal: 2 right, 2 wrong.
        for _ in 0..3 {
            cm.add(0, 0);
        }
        cm.add(0, 1);
        cm.add(1, 1);
        cm.add(1, 1);
        cm.add(1, 0);
        cm.add(1, 0);
        cm.add(5, 0);

        assert_eq!(cm.total(), 8);
        assert!((accuracy(&cm) - 5.0 / 8.0).abs() < 1e-6);
        let stats = precision_recall_by_class(&cm, &["background", "signal"]);
        assert_eq!(stats[1].class_id, "signal");
        assert_eq!(stats[1].support, 4);
        assert!((stats[1].precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((stats[1].recall - 0.5).abs() < 1e-6);
        assert!((stats[0].recall - 0.75).abs() < 1e-6);
    }

    #[test]
    fn empty_matrix_has_zero_accuracy() {
        assert_eq!(accuracy(&ConfusionMatrix::new(2)), 0.0);
    }
}

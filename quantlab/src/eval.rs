//! Dataset splitting and classification metrics.

use crate::clamp01;
use serde::{Deserialize, Serialize};

/// Test-set evaluation of a classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub brier: f64,
    pub n_test: f64,
}

/// Chronological 70/15/15 split boundaries (train end, validation end) over
/// `n` time-ordered samples, clamped so every partition is non-empty. Fewer
/// than 3 samples cannot be split.
pub fn chronological_split_bounds(n: usize) -> Option<(usize, usize)> {
    if n < 3 {
        return None;
    }
    let n_i = n as i64;
    let mut train_end = (n as f64 * 0.70) as i64;
    let mut val_end = (n as f64 * 0.85) as i64;
    if train_end <= 0 {
        train_end = n_i / 2;
    }
    if val_end <= train_end {
        val_end = (train_end + n_i) / 2;
    }
    if val_end >= n_i {
        val_end = n_i - 1;
    }
    if val_end <= train_end {
        train_end = n_i - 2;
        val_end = n_i - 1;
    }
    if train_end < 1 {
        train_end = 1;
    }
    if val_end < train_end + 1 {
        val_end = train_end + 1;
    }
    if val_end >= n_i {
        val_end = n_i - 1;
    }
    Some((train_end as usize, val_end as usize))
}

/// Standard binary metrics at the 0.5 decision point plus Brier score and
/// rank-based AUC. Probabilities are clamped into [0, 1] first.
pub fn compute_metrics(labels: &[f64], probs: &[f64]) -> Metrics {
    let n = labels.len();
    if n == 0 || probs.len() != n {
        return Metrics {
            auc: 0.5,
            ..Metrics::default()
        };
    }
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut tn = 0.0;
    let mut fn_ = 0.0;
    let mut brier = 0.0;
    for i in 0..n {
        let y = labels[i];
        let p = clamp01(probs[i]);
        let pred = if p >= 0.5 { 1.0 } else { 0.0 };
        match (pred as i32, y as i32) {
            (1, 1) => tp += 1.0,
            (1, 0) => fp += 1.0,
            (0, 0) => tn += 1.0,
            _ => fn_ += 1.0,
        }
        let d = p - y;
        brier += d * d;
    }

    let accuracy = (tp + tn) / n as f64;
    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Metrics {
        auc: compute_auc(labels, probs),
        accuracy,
        precision,
        recall,
        f1,
        brier: brier / n as f64,
        n_test: n as f64,
    }
}

/// Mann-Whitney AUC with tied probabilities receiving their average rank.
/// Degenerate inputs (single class, non-finite result) return 0.5.
pub fn compute_auc(labels: &[f64], probs: &[f64]) -> f64 {
    let mut pairs: Vec<(f64, f64)> = labels
        .iter()
        .zip(probs.iter())
        .map(|(&y, &p)| (clamp01(p), y))
        .collect();
    let pos = pairs.iter().filter(|(_, y)| *y >= 0.5).count() as f64;
    let neg = pairs.len() as f64 - pos;
    if pos == 0.0 || neg == 0.0 {
        return 0.5;
    }

    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut sum_rank_pos = 0.0;
    let mut rank = 1.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i + 1;
        while j < pairs.len() && (pairs[j].0 - pairs[i].0).abs() < 1e-12 {
            j += 1;
        }
        let avg_rank = (rank + j as f64) / 2.0;
        for pair in &pairs[i..j] {
            if pair.1 >= 0.5 {
                sum_rank_pos += avg_rank;
            }
        }
        rank = (j + 1) as f64;
        i = j;
    }

    let auc = (sum_rank_pos - pos * (pos + 1.0) / 2.0) / (pos * neg);
    if auc.is_nan() || auc.is_infinite() {
        return 0.5;
    }
    auc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bounds_standard() {
        let (train_end, val_end) = chronological_split_bounds(1000).unwrap();
        assert_eq!(train_end, 700);
        assert_eq!(val_end, 850);
    }

    #[test]
    fn test_split_bounds_tiny() {
        assert!(chronological_split_bounds(2).is_none());
        let (train_end, val_end) = chronological_split_bounds(3).unwrap();
        assert!(train_end >= 1);
        assert!(val_end > train_end);
        assert!(val_end < 3);
    }

    #[test]
    fn test_split_bounds_never_empty_test() {
        for n in 3..200 {
            let (train_end, val_end) = chronological_split_bounds(n).unwrap();
            assert!(train_end >= 1, "n={}", n);
            assert!(val_end > train_end, "n={}", n);
            assert!(val_end < n, "n={}", n);
        }
    }

    #[test]
    fn test_auc_perfect_ranking() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        let probs = [0.1, 0.2, 0.8, 0.9];
        assert!((compute_auc(&labels, &probs) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_reversed_ranking() {
        let labels = [1.0, 1.0, 0.0, 0.0];
        let probs = [0.1, 0.2, 0.8, 0.9];
        assert!((compute_auc(&labels, &probs) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_all_tied_is_half() {
        let labels = [0.0, 1.0, 0.0, 1.0];
        let probs = [0.5, 0.5, 0.5, 0.5];
        assert!((compute_auc(&labels, &probs) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_is_half() {
        assert_eq!(compute_auc(&[1.0, 1.0], &[0.3, 0.9]), 0.5);
    }

    #[test]
    fn test_metrics_confusion_counts() {
        let labels = [1.0, 1.0, 0.0, 0.0];
        let probs = [0.9, 0.2, 0.1, 0.8];
        let m = compute_metrics(&labels, &probs);
        assert!((m.accuracy - 0.5).abs() < 1e-12);
        assert!((m.precision - 0.5).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert!((m.f1 - 0.5).abs() < 1e-12);
        assert_eq!(m.n_test, 4.0);
    }

    #[test]
    fn test_metrics_empty_input() {
        let m = compute_metrics(&[], &[]);
        assert_eq!(m.auc, 0.5);
        assert_eq!(m.n_test, 0.0);
    }
}

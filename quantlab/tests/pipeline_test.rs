//! End-to-end test of the numeric pipeline: candles -> features -> split ->
//! train -> evaluate -> artifact round-trip.

use chrono::{DateTime, Duration, Utc};
use quantlab::eval::{chronological_split_bounds, compute_metrics};
use quantlab::features::{build_rows, feature_vector, target_label, FEATURE_NAMES};
use quantlab::models::{
    gbtree, logreg, GradientBoostedTrees, LogisticRegression,
};
use shared::domain::Candle;

fn synthetic_candles(count: usize) -> Vec<Candle> {
    let start = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
    let mut close = 100.0;
    (0..count)
        .map(|i| {
            // a wavy but deterministic walk with enough texture for features
            let drift = ((i as f64) * 0.7).sin() * 2.0 + ((i % 7) as f64 - 3.0) * 0.4;
            close = (close + drift).max(10.0);
            Candle {
                symbol: "BTC".to_string(),
                interval: "1h".to_string(),
                open_time: start + Duration::hours(i as i64),
                open: close - 0.2,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 900.0 + ((i * 53) % 211) as f64,
            }
        })
        .collect()
}

#[test]
fn test_full_training_pipeline() {
    let candles = synthetic_candles(400);
    let rows = build_rows(&candles, 4);
    assert!(rows.len() > 300);

    let mut samples = Vec::new();
    let mut labels = Vec::new();
    for row in &rows {
        if let Some(label) = target_label(row) {
            samples.push(feature_vector(row));
            labels.push(label);
        }
    }
    assert!(samples.len() > 200);

    let (train_end, val_end) = chronological_split_bounds(samples.len()).unwrap();
    let (train_x, rest_x) = samples.split_at(train_end);
    let (train_y, rest_y) = labels.split_at(train_end);
    let (_, test_x) = rest_x.split_at(val_end - train_end);
    let (_, test_y) = rest_y.split_at(val_end - train_end);
    assert!(!test_x.is_empty());

    let lr = LogisticRegression::train(
        train_x,
        train_y,
        &FEATURE_NAMES,
        logreg::TrainOptions::default(),
    )
    .unwrap();
    let lr_metrics = compute_metrics(test_y, &lr.predict_batch(test_x));
    assert!(lr_metrics.auc >= 0.0 && lr_metrics.auc <= 1.0);
    assert_eq!(lr_metrics.n_test, test_y.len() as f64);

    let gbt = GradientBoostedTrees::train(
        train_x,
        train_y,
        &FEATURE_NAMES,
        gbtree::TrainOptions::default(),
    )
    .unwrap();
    let gbt_metrics = compute_metrics(test_y, &gbt.predict_batch(test_x));
    assert!(gbt_metrics.brier >= 0.0 && gbt_metrics.brier <= 1.0);

    // Artifacts must reproduce the exact same probabilities after reload.
    let lr_restored = LogisticRegression::from_bytes(&lr.to_bytes().unwrap()).unwrap();
    let gbt_restored = GradientBoostedTrees::from_bytes(&gbt.to_bytes().unwrap()).unwrap();
    for sample in test_x {
        assert_eq!(lr.predict_prob(sample), lr_restored.predict_prob(sample));
        assert_eq!(gbt.predict_prob(sample), gbt_restored.predict_prob(sample));
    }
}

#[test]
fn test_feature_rows_are_reproducible() {
    let candles = synthetic_candles(200);
    assert_eq!(build_rows(&candles, 4), build_rows(&candles, 4));
}

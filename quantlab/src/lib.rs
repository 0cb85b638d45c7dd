//! Quantlab: the pure numeric core of the signal engine.
//!
//! Everything in this crate is deterministic and free of I/O:
//!
//! - **Technical indicators**: RSI, EMA, MACD, Bollinger series with NaN
//!   warm-ups
//! - **Candle bucketing**: irregular price/volume points into OHLCV bars
//! - **Feature engineering**: per-candle feature rows with a look-ahead label
//! - **Classifiers**: logistic regression and gradient-boosted trees with
//!   byte-exact artifact round-trips
//! - **Evaluation**: chronological splits, classification metrics, AUC
//! - **Ensemble**: classic/logreg/boosted score fusion

pub mod bucket;
pub mod ensemble;
pub mod eval;
pub mod features;
pub mod indicators;
pub mod models;

/// Result type alias
pub type Result<T> = anyhow::Result<T>;

/// Clamps a probability-like value into [0, 1]; NaN collapses to 0.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Clamps a score-like value into [-1, 1]; NaN and infinities collapse to 0.
pub fn clamp_score(v: f64) -> f64 {
    if v.is_nan() || v.is_infinite() {
        return 0.0;
    }
    v.clamp(-1.0, 1.0)
}

//! Technical indicator series.
//!
//! All series are aligned to the input length; positions inside the warm-up
//! window hold NaN so callers can skip them explicitly.

pub mod bb;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use bb::bollinger_series;
pub use ema::ema_series;
pub use macd::macd_series;
pub use rsi::rsi_series;

/// Arithmetic mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

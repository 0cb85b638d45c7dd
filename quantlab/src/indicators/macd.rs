//! Moving Average Convergence Divergence.

use super::ema_series;

/// MACD line and signal line. Line = EMA(fast) - EMA(slow); signal =
/// EMA(signal) of the line. The histogram is `line - signal` at each index.
pub fn macd_series(values: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    if values.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&line, signal);
    (line, signal_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_lengths_match_input() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64).sin()).collect();
        let (line, signal) = macd_series(&values, 12, 26, 9);
        assert_eq!(line.len(), values.len());
        assert_eq!(signal.len(), values.len());
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let values = vec![50.0; 40];
        let (line, signal) = macd_series(&values, 12, 26, 9);
        for (l, s) in line.iter().zip(signal.iter()) {
            assert!((l - 0.0).abs() < 1e-12);
            assert!((s - 0.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let values: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let (line, _) = macd_series(&values, 12, 26, 9);
        assert!(line[79] > 0.0);
    }
}

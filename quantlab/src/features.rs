//! Feature-row construction from candle history.
//!
//! Rows are a pure function of the ordered candle series; only the label
//! peeks ahead, at the candle `target_hours` steps further on.

use crate::indicators::{bollinger_series, macd_series, mean_std, rsi_series};
use shared::domain::{Candle, MlFeatureRow};

/// Opaque version tag frozen into every trained model so inference can
/// reject mismatched feature layouts.
pub const FEATURE_SPEC_VERSION: &str = "v1";

/// Feature names in storage and vector order.
pub const FEATURE_NAMES: [&str; 13] = [
    "ret_1h",
    "ret_4h",
    "ret_12h",
    "ret_24h",
    "volatility_6h",
    "volatility_24h",
    "volume_z_24h",
    "rsi_14",
    "macd_line",
    "macd_signal",
    "macd_hist",
    "bb_pos",
    "bb_width",
];

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BB_PERIOD: usize = 20;
const BB_STD_DEVS: f64 = 2.0;

/// Builds one row per eligible candle. Candles are sorted ascending first;
/// indices below 24 and the final candle are skipped, and any row whose
/// features would be NaN or infinite is dropped entirely.
pub fn build_rows(candles: &[Candle], target_hours: i64) -> Vec<MlFeatureRow> {
    if candles.is_empty() {
        return Vec::new();
    }
    let target_hours = if target_hours <= 0 { 4 } else { target_hours } as usize;

    let mut sorted: Vec<Candle> = candles.to_vec();
    sorted.sort_by_key(|c| c.open_time);

    let closes: Vec<f64> = sorted.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = sorted.iter().map(|c| c.volume).collect();

    let rsi = rsi_series(&closes, RSI_PERIOD);
    let (macd_line, macd_signal) = macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let (bb_middle, bb_upper, bb_lower) = bollinger_series(&closes, BB_PERIOD, BB_STD_DEVS);

    let mut rows = Vec::with_capacity(sorted.len());
    for i in 0..sorted.len() {
        if i < 24 || i >= sorted.len() - 1 {
            continue;
        }

        let ret_1h = pct_return(&closes, i, 1);
        let ret_4h = pct_return(&closes, i, 4);
        let ret_12h = pct_return(&closes, i, 12);
        let ret_24h = pct_return(&closes, i, 24);
        if any_non_finite(&[ret_1h, ret_4h, ret_12h, ret_24h]) {
            continue;
        }

        let vol_6h = rolling_volatility(&closes, i, 6);
        let vol_24h = rolling_volatility(&closes, i, 24);
        if any_non_finite(&[vol_6h, vol_24h]) {
            continue;
        }

        let volume_z_24h = rolling_z(&volumes, i, 24);
        if !volume_z_24h.is_finite() {
            continue;
        }

        if i >= rsi.len() || i >= macd_line.len() || i >= macd_signal.len() || i >= bb_upper.len() {
            continue;
        }
        let rsi_14 = rsi[i];
        let macd_l = macd_line[i];
        let macd_s = macd_signal[i];
        let bb_u = bb_upper[i];
        let bb_l = bb_lower[i];
        let bb_m = bb_middle[i];
        if any_non_finite(&[rsi_14, macd_l, macd_s, bb_u, bb_l, bb_m]) {
            continue;
        }
        let bb_width = if bb_m != 0.0 { (bb_u - bb_l) / bb_m } else { 0.0 };
        let bb_pos = if bb_u != bb_l {
            (closes[i] - bb_l) / (bb_u - bb_l)
        } else {
            0.5
        };

        let target_idx = i + target_hours;
        let target_up_4h = if target_idx < closes.len() {
            Some(closes[target_idx] > closes[i])
        } else {
            None
        };

        rows.push(MlFeatureRow {
            symbol: sorted[i].symbol.clone(),
            interval: sorted[i].interval.clone(),
            open_time: sorted[i].open_time,
            ret_1h,
            ret_4h,
            ret_12h,
            ret_24h,
            volatility_6h: vol_6h,
            volatility_24h: vol_24h,
            volume_z_24h,
            rsi_14,
            macd_line: macd_l,
            macd_signal: macd_s,
            macd_hist: macd_l - macd_s,
            bb_pos,
            bb_width,
            target_up_4h,
        });
    }
    rows
}

/// Feature values of a row in [`FEATURE_NAMES`] order.
pub fn feature_vector(row: &MlFeatureRow) -> Vec<f64> {
    vec![
        row.ret_1h,
        row.ret_4h,
        row.ret_12h,
        row.ret_24h,
        row.volatility_6h,
        row.volatility_24h,
        row.volume_z_24h,
        row.rsi_14,
        row.macd_line,
        row.macd_signal,
        row.macd_hist,
        row.bb_pos,
        row.bb_width,
    ]
}

/// Training label of a row, if the look-ahead candle existed.
pub fn target_label(row: &MlFeatureRow) -> Option<f64> {
    row.target_up_4h.map(|up| if up { 1.0 } else { 0.0 })
}

fn pct_return(values: &[f64], idx: usize, lag: usize) -> f64 {
    if idx < lag || idx >= values.len() {
        return f64::NAN;
    }
    let base = values[idx - lag];
    if base == 0.0 {
        return f64::NAN;
    }
    values[idx] / base - 1.0
}

fn rolling_volatility(closes: &[f64], idx: usize, window: usize) -> f64 {
    if window <= 1 || idx + 1 <= window || idx >= closes.len() {
        return f64::NAN;
    }
    let mut rets = Vec::with_capacity(window);
    for j in (idx + 1 - window)..=idx {
        if closes[j - 1] == 0.0 {
            return f64::NAN;
        }
        rets.push(closes[j] / closes[j - 1] - 1.0);
    }
    let (_, std) = mean_std(&rets);
    std
}

fn rolling_z(values: &[f64], idx: usize, window: usize) -> f64 {
    if window == 0 || idx < window || idx >= values.len() {
        return f64::NAN;
    }
    let (mean, std) = mean_std(&values[idx - window..idx]);
    if std == 0.0 {
        return 0.0;
    }
    (values[idx] - mean) / std
}

fn any_non_finite(values: &[f64]) -> bool {
    values.iter().any(|v| !v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn hourly_candles(count: usize) -> Vec<Candle> {
        let start = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        (0..count)
            .map(|i| {
                let close = 100.0 + ((i * 13) % 29) as f64 - 14.0 + i as f64 * 0.05;
                Candle {
                    symbol: "BTC".to_string(),
                    interval: "1h".to_string(),
                    open_time: start + Duration::hours(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000.0 + ((i * 37) % 101) as f64,
                }
            })
            .collect()
    }

    #[test]
    fn test_build_rows_skips_warm_up_and_tail() {
        let candles = hourly_candles(60);
        let rows = build_rows(&candles, 4);
        assert!(!rows.is_empty());
        assert_eq!(rows[0].open_time, candles[24].open_time);
        let last = rows.last().unwrap();
        assert_eq!(last.open_time, candles[58].open_time);
    }

    #[test]
    fn test_build_rows_label_presence() {
        let candles = hourly_candles(60);
        let rows = build_rows(&candles, 4);
        for row in &rows {
            let idx = candles
                .iter()
                .position(|c| c.open_time == row.open_time)
                .unwrap();
            if idx + 4 < candles.len() {
                let expected = candles[idx + 4].close > candles[idx].close;
                assert_eq!(row.target_up_4h, Some(expected));
            } else {
                assert_eq!(row.target_up_4h, None);
            }
        }
    }

    #[test]
    fn test_build_rows_deterministic() {
        let candles = hourly_candles(80);
        let first = build_rows(&candles, 4);
        let second = build_rows(&candles, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_rows_unsorted_input() {
        let mut candles = hourly_candles(60);
        candles.reverse();
        let sorted_rows = build_rows(&hourly_candles(60), 4);
        assert_eq!(build_rows(&candles, 4), sorted_rows);
    }

    #[test]
    fn test_build_rows_short_history_is_empty() {
        assert!(build_rows(&hourly_candles(20), 4).is_empty());
    }

    #[test]
    fn test_feature_vector_matches_names() {
        let candles = hourly_candles(60);
        let rows = build_rows(&candles, 4);
        assert_eq!(feature_vector(&rows[0]).len(), FEATURE_NAMES.len());
    }
}

//! Bucketing of irregularly sampled price/volume points into OHLCV candles.

use chrono::{DateTime, Utc};
use shared::domain::{interval_duration, Candle};
use std::collections::BTreeMap;

/// A `(timestamp_ms, value)` sample as delivered by market-chart endpoints.
pub type Point = (i64, f64);

struct Bucket {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

/// Floor-truncates every price point to an `interval` boundary and folds the
/// points of each bucket into one candle: open = first, high = max,
/// low = min, close = chronologically last. Each bucket's volume comes from
/// the volume point closest to `bucket_start + interval`. Empty inputs or an
/// unknown interval produce an empty result; candles come back ascending by
/// open time.
pub fn bucket_candles(
    symbol: &str,
    interval: &str,
    prices: &[Point],
    volumes: &[Point],
) -> Vec<Candle> {
    let Some(duration) = interval_duration(interval) else {
        return Vec::new();
    };
    let interval_ms = duration.num_milliseconds();
    if prices.is_empty() || interval_ms <= 0 {
        return Vec::new();
    }

    let mut sorted: Vec<Point> = prices.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for (ts_ms, price) in sorted {
        let bucket_ts = ts_ms.div_euclid(interval_ms) * interval_ms;
        buckets
            .entry(bucket_ts)
            .and_modify(|b| {
                b.high = b.high.max(price);
                b.low = b.low.min(price);
                b.close = price;
            })
            .or_insert(Bucket {
                open: price,
                high: price,
                low: price,
                close: price,
            });
    }

    buckets
        .into_iter()
        .filter_map(|(bucket_ts, b)| {
            let open_time: DateTime<Utc> = DateTime::from_timestamp_millis(bucket_ts)?;
            Some(Candle {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                open_time,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: closest_volume(volumes, bucket_ts + interval_ms),
            })
        })
        .collect()
}

fn closest_volume(volumes: &[Point], target_ms: i64) -> f64 {
    let mut best = 0.0;
    let mut best_diff = i64::MAX;
    for (ts, vol) in volumes {
        let diff = (ts - target_ms).abs();
        if diff < best_diff {
            best_diff = diff;
            best = *vol;
        }
    }
    best
}

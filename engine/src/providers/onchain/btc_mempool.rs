//! BTC on-chain activity from mempool.space 24h statistics.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{get_json, onchain_client};
use crate::providers::types::{as_float, clamp, confidence_from_score, OnChainObservation};
use crate::providers::OnChainSource;

const DEFAULT_BASE_URL: &str = "https://mempool.space";

pub struct BtcMempoolProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BtcMempoolProvider {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Ok(BtcMempoolProvider {
            client: onchain_client()?,
            base_url: base.to_string(),
        })
    }
}

#[async_trait]
impl OnChainSource for BtcMempoolProvider {
    async fn fetch_snapshot(
        &self,
        interval: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<OnChainObservation> {
        let url = format!("{}/api/v1/statistics/24h", self.base_url);
        let payload = get_json(&self.client, &url, "btc mempool").await?;
        let rows = payload
            .as_array()
            .ok_or_else(|| anyhow!("btc mempool payload is not an array"))?;
        let row = rows
            .first()
            .ok_or_else(|| anyhow!("btc mempool payload has no rows"))?;

        let count = as_float(row.get("count").unwrap_or(&Value::Null));
        let vbytes_per_second = as_float(row.get("vbytes_per_second").unwrap_or(&Value::Null));
        let min_fee = as_float(row.get("min_fee").unwrap_or(&Value::Null));
        let total_fee = as_float(row.get("total_fee").unwrap_or(&Value::Null));

        let score = score_mempool_stats(count, vbytes_per_second, min_fee, total_fee);

        Ok(OnChainObservation {
            provider_key: "btc_mempool".to_string(),
            symbol: "BTC".to_string(),
            interval: interval.to_string(),
            bucket_time,
            score,
            confidence: confidence_from_score(score),
            metrics: json!({
                "count": count,
                "vbytes_per_second": vbytes_per_second,
                "min_fee": min_fee,
                "total_fee": total_fee,
            }),
        })
    }
}

/// Heavy tx count and throughput read bullish; fee pressure reads bearish.
fn score_mempool_stats(count: f64, vbytes_per_second: f64, min_fee: f64, total_fee: f64) -> f64 {
    let count_norm = clamp((count - 120_000.0) / 180_000.0, -1.0, 1.0);
    let throughput_norm = clamp((vbytes_per_second - 1_200.0) / 2_400.0, -1.0, 1.0);
    let fee_load_norm = clamp((min_fee - 5.0) / 40.0, -1.0, 1.0);
    let total_fee_norm = clamp((total_fee - 2_000_000.0) / 8_000_000.0, -1.0, 1.0);

    clamp(
        0.35 * count_norm + 0.35 * throughput_norm + 0.15 * total_fee_norm - 0.15 * fee_load_norm,
        -1.0,
        1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_network_scores_positive() {
        let score = score_mempool_stats(280_000.0, 3_000.0, 6.0, 9_000_000.0);
        assert!(score > 0.0);
        assert!(score <= 1.0);
        assert!(confidence_from_score(score) >= 0.35);
    }

    #[test]
    fn test_quiet_network_scores_negative() {
        let score = score_mempool_stats(20_000.0, 200.0, 60.0, 100_000.0);
        assert!(score < 0.0);
        assert!(score >= -1.0);
    }

    #[test]
    fn test_baseline_is_near_neutral() {
        let score = score_mempool_stats(120_000.0, 1_200.0, 5.0, 2_000_000.0);
        assert!(score.abs() < 1e-9);
    }
}

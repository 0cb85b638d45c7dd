//! ETH on-chain activity from the Blockscout stats endpoint.
//!
//! Blockscout delivers several counters as strings, so every field goes
//! through the permissive numeric coercion.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{get_json, onchain_client};
use crate::providers::types::{as_float, clamp, confidence_from_score, OnChainObservation};
use crate::providers::OnChainSource;

const DEFAULT_BASE_URL: &str = "https://eth.blockscout.com";

pub struct EthBlockscoutProvider {
    client: reqwest::Client,
    base_url: String,
}

impl EthBlockscoutProvider {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Ok(EthBlockscoutProvider {
            client: onchain_client()?,
            base_url: base.to_string(),
        })
    }
}

#[async_trait]
impl OnChainSource for EthBlockscoutProvider {
    async fn fetch_snapshot(
        &self,
        interval: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<OnChainObservation> {
        let url = format!("{}/api/v2/stats", self.base_url);
        let payload = get_json(&self.client, &url, "eth blockscout").await?;

        let tx_today = as_float(payload.get("transactions_today").unwrap_or(&Value::Null));
        let utilization = as_float(
            payload
                .get("network_utilization_percentage")
                .unwrap_or(&Value::Null),
        );
        let gas_avg = as_float(
            payload
                .pointer("/gas_prices/average")
                .unwrap_or(&Value::Null),
        );

        let score = score_network_stats(tx_today, utilization, gas_avg);

        Ok(OnChainObservation {
            provider_key: "eth_blockscout".to_string(),
            symbol: "ETH".to_string(),
            interval: interval.to_string(),
            bucket_time,
            score,
            confidence: confidence_from_score(score),
            metrics: json!({
                "transactions_today": tx_today,
                "network_utilization_percentage": utilization,
                "gas_price_average": gas_avg,
            }),
        })
    }
}

/// Transaction volume and utilization read bullish; expensive gas drags.
fn score_network_stats(tx_today: f64, utilization: f64, gas_avg: f64) -> f64 {
    let tx_norm = clamp((tx_today - 1_500_000.0) / 1_500_000.0, -1.0, 1.0);
    let util_norm = clamp((utilization - 45.0) / 55.0, -1.0, 1.0);
    let gas_penalty = clamp((gas_avg - 25.0) / 120.0, -1.0, 1.0);

    clamp(0.45 * tx_norm + 0.35 * util_norm - 0.20 * gas_penalty, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringified_counters_coerce() {
        // Blockscout ships counters as strings; both forms must agree.
        let from_strings = score_network_stats(
            as_float(&json!("2400000")),
            as_float(&json!("70.5")),
            as_float(&json!("18")),
        );
        let from_numbers = score_network_stats(2_400_000.0, 70.5, 18.0);
        assert_eq!(from_strings, from_numbers);
        assert!(from_strings > 0.0);
    }

    #[test]
    fn test_gas_spike_drags_score() {
        let cheap = score_network_stats(1_500_000.0, 45.0, 10.0);
        let expensive = score_network_stats(1_500_000.0, 45.0, 140.0);
        assert!(expensive < cheap);
    }
}

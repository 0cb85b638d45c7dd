//! XRP on-chain activity from XRPScan: fee queue pressure plus server load,
//! a two-call sequence.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{get_json, onchain_client};
use crate::providers::types::{as_float, clamp, confidence_from_score, OnChainObservation};
use crate::providers::OnChainSource;

const DEFAULT_BASE_URL: &str = "https://api.xrpscan.com";

pub struct XrpScanProvider {
    client: reqwest::Client,
    base_url: String,
}

impl XrpScanProvider {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Ok(XrpScanProvider {
            client: onchain_client()?,
            base_url: base.to_string(),
        })
    }

    async fn fetch_fee_metrics(&self) -> Result<(f64, f64, f64)> {
        let url = format!("{}/api/v1/network/fee", self.base_url);
        let payload = get_json(&self.client, &url, "xrpscan fee").await?;

        let queue = as_float(payload.get("current_queue_size").unwrap_or(&Value::Null));
        let mut expected = as_float(payload.get("expected_ledger_size").unwrap_or(&Value::Null));
        if expected <= 0.0 {
            expected = 1.0;
        }
        let median_fee = as_float(payload.pointer("/drops/median_fee").unwrap_or(&Value::Null));
        Ok((queue, expected, median_fee))
    }

    async fn fetch_load_factor(&self) -> Result<f64> {
        let url = format!("{}/api/v1/network/server_info", self.base_url);
        let payload = get_json(&self.client, &url, "xrpscan server_info").await?;
        let mut load = as_float(payload.pointer("/info/load_factor").unwrap_or(&Value::Null));
        if load <= 0.0 {
            load = 1.0;
        }
        Ok(load)
    }
}

#[async_trait]
impl OnChainSource for XrpScanProvider {
    async fn fetch_snapshot(
        &self,
        interval: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<OnChainObservation> {
        let (queue_size, expected_ledger_size, median_fee) = self.fetch_fee_metrics().await?;
        let load_factor = self.fetch_load_factor().await?;

        let score = score_network_load(queue_size, expected_ledger_size, median_fee, load_factor);

        Ok(OnChainObservation {
            provider_key: "xrp_xrpscan".to_string(),
            symbol: "XRP".to_string(),
            interval: interval.to_string(),
            bucket_time,
            score,
            confidence: confidence_from_score(score),
            metrics: json!({
                "current_queue_size": queue_size,
                "expected_ledger_size": expected_ledger_size,
                "median_fee": median_fee,
                "load_factor": load_factor,
            }),
        })
    }
}

/// Server load reads as demand; a clogged queue and rising fees read as
/// stress and subtract.
fn score_network_load(
    queue_size: f64,
    expected_ledger_size: f64,
    median_fee: f64,
    load_factor: f64,
) -> f64 {
    let queue_norm = clamp(queue_size / expected_ledger_size - 0.35, -1.0, 1.0);
    let fee_norm = clamp((median_fee - 128_000.0) / 300_000.0, -1.0, 1.0);
    let load_norm = clamp((load_factor - 1.0) / 5.0, -1.0, 1.0);

    clamp(0.40 * load_norm - 0.40 * queue_norm - 0.20 * fee_norm, -1.0, 1.0)
}

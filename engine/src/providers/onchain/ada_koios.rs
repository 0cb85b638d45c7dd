//! ADA on-chain activity from Koios: chain totals plus the current epoch's
//! transaction pace, a two-call sequence.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{get_json, onchain_client};
use crate::providers::types::{as_float, clamp, confidence_from_score, OnChainObservation};
use crate::providers::OnChainSource;

const DEFAULT_BASE_URL: &str = "https://api.koios.rest";

pub struct AdaKoiosProvider {
    client: reqwest::Client,
    base_url: String,
}

impl AdaKoiosProvider {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Ok(AdaKoiosProvider {
            client: onchain_client()?,
            base_url: base.to_string(),
        })
    }

    async fn fetch_totals(&self) -> Result<(i64, f64)> {
        let url = format!("{}/api/v1/totals", self.base_url);
        let payload = get_json(&self.client, &url, "koios totals").await?;
        let row = payload
            .as_array()
            .and_then(|rows| rows.first())
            .ok_or_else(|| anyhow!("koios totals payload has no rows"))?;
        let epoch = as_float(row.get("epoch_no").unwrap_or(&Value::Null)) as i64;
        let fees = as_float(row.get("fees").unwrap_or(&Value::Null));
        Ok((epoch, fees))
    }

    async fn fetch_epoch_metrics(&self, epoch: i64) -> Result<(f64, f64)> {
        let url = format!("{}/api/v1/epoch_info?_epoch_no={}", self.base_url, epoch);
        let payload = get_json(&self.client, &url, "koios epoch_info").await?;
        let row = payload
            .as_array()
            .and_then(|rows| rows.first())
            .ok_or_else(|| anyhow!("koios epoch_info payload has no rows"))?;

        let tx_count = as_float(row.get("tx_count").unwrap_or(&Value::Null));
        let start_time = as_float(row.get("start_time").unwrap_or(&Value::Null)) as i64;
        let end_time = as_float(row.get("end_time").unwrap_or(&Value::Null)) as i64;

        let mut duration_hours = 1.0;
        if end_time > start_time {
            duration_hours = (end_time - start_time) as f64 / 3600.0;
            if duration_hours <= 0.0 {
                duration_hours = 1.0;
            }
        }
        Ok((tx_count, tx_count / duration_hours))
    }
}

#[async_trait]
impl OnChainSource for AdaKoiosProvider {
    async fn fetch_snapshot(
        &self,
        interval: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<OnChainObservation> {
        let (epoch, fees) = self.fetch_totals().await?;
        let (tx_count, pace_per_hour) = self.fetch_epoch_metrics(epoch).await?;

        let score = score_epoch_stats(tx_count, fees, pace_per_hour);

        Ok(OnChainObservation {
            provider_key: "ada_koios".to_string(),
            symbol: "ADA".to_string(),
            interval: interval.to_string(),
            bucket_time,
            score,
            confidence: confidence_from_score(score),
            metrics: json!({
                "epoch": epoch as f64,
                "tx_count": tx_count,
                "fees": fees,
                "tx_pace_per_hour": pace_per_hour,
            }),
        })
    }
}

fn score_epoch_stats(tx_count: f64, fees: f64, pace_per_hour: f64) -> f64 {
    let tx_norm = clamp((tx_count - 120_000.0) / 180_000.0, -1.0, 1.0);
    let fee_norm = clamp((fees - 45_000_000_000.0) / 120_000_000_000.0, -1.0, 1.0);
    let pace_norm = clamp((pace_per_hour - 300.0) / 800.0, -1.0, 1.0);

    clamp(0.5 * tx_norm + 0.25 * fee_norm + 0.25 * pace_norm, -1.0, 1.0)
}

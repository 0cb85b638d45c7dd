//! Fear & Greed index fetcher (alternative.me).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

use super::types::FearGreedPoint;
use super::FearGreedSource;

const DEFAULT_BASE_URL: &str = "https://api.alternative.me";

pub struct FearGreedProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct FngPayload {
    data: Vec<FngRow>,
}

#[derive(Deserialize)]
struct FngRow {
    value: String,
    value_classification: String,
    timestamp: String,
}

impl FearGreedProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build fear & greed http client")?;
        Ok(FearGreedProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FearGreedSource for FearGreedProvider {
    async fn fetch_latest(&self) -> Result<FearGreedPoint> {
        let url = format!("{}/fng/?limit=1", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("fear & greed API error {}: {}", status, body));
        }

        let payload: FngPayload = response
            .json()
            .await
            .context("decode fear & greed response")?;
        let row = payload
            .data
            .first()
            .ok_or_else(|| anyhow!("fear & greed response has no rows"))?;

        let value: i32 = row
            .value
            .trim()
            .parse()
            .context("parse fear & greed value")?;
        // The timestamp arrives as a stringified unix time, sometimes in
        // milliseconds.
        let mut ts: i64 = row
            .timestamp
            .trim()
            .parse()
            .context("parse fear & greed timestamp")?;
        if ts > 1_000_000_000_000 {
            ts /= 1000;
        }
        let timestamp = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| anyhow!("fear & greed timestamp out of range"))?;

        Ok(FearGreedPoint {
            value,
            classification: row.value_classification.clone(),
            timestamp,
        })
    }
}

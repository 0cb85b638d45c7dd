//! CoinGecko price and market-chart fetcher.
//!
//! The free API tolerates roughly 8 requests per minute, so every call goes
//! through a token bucket of 8 tokens refilled one per 7.5 seconds.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use quantlab::bucket::bucket_candles;
use serde_json::Value;
use shared::domain::{coingecko_id, symbol_for_coingecko_id, Candle, PriceSnapshot, SUPPORTED_SYMBOLS};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::rate_limiter::RateLimiter;
use super::MarketDataSource;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const RATE_LIMIT_TOKENS: u32 = 8;
const RATE_LIMIT_REFILL_MS: u64 = 7_500;

pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
    cancel: CancellationToken,
}

impl CoinGeckoProvider {
    pub fn new(cancel: CancellationToken) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, cancel)
    }

    pub fn with_base_url(base_url: &str, cancel: CancellationToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build coingecko http client")?;
        Ok(CoinGeckoProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(
                RATE_LIMIT_TOKENS,
                Duration::from_millis(RATE_LIMIT_REFILL_MS),
            ),
            cancel,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.limiter
            .wait(&self.cancel)
            .await
            .context("rate limit wait")?;

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("coingecko API error {}: {}", status, body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoProvider {
    async fn fetch_prices(&self) -> Result<HashMap<String, PriceSnapshot>> {
        let ids: Vec<&str> = SUPPORTED_SYMBOLS
            .iter()
            .filter_map(|symbol| coingecko_id(symbol))
            .collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_vol=true&include_24hr_change=true",
            self.base_url,
            ids.join(",")
        );

        let payload = self.get_json(&url).await.context("fetch prices")?;
        let raw = payload
            .as_object()
            .ok_or_else(|| anyhow!("unexpected prices payload shape"))?;

        let now = Utc::now().timestamp();
        let mut result = HashMap::with_capacity(raw.len());
        for (cg_id, data) in raw {
            let Some(symbol) = symbol_for_coingecko_id(cg_id) else {
                continue;
            };
            result.insert(
                symbol.to_string(),
                PriceSnapshot {
                    symbol: symbol.to_string(),
                    price_usd: field_f64(data, "usd"),
                    volume_24h: field_f64(data, "usd_24h_vol"),
                    change_24h_pct: field_f64(data, "usd_24h_change"),
                    last_updated_unix: now,
                },
            );
        }
        Ok(result)
    }

    async fn fetch_market_chart(
        &self,
        symbol: &str,
        days: u32,
        intervals: &[&str],
    ) -> Result<Vec<Candle>> {
        let cg_id =
            coingecko_id(symbol).ok_or_else(|| anyhow!("unsupported symbol: {}", symbol))?;
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url, cg_id, days
        );

        let payload = self
            .get_json(&url)
            .await
            .with_context(|| format!("fetch market chart for {}", symbol))?;

        let prices = point_series(&payload, "prices");
        let volumes = point_series(&payload, "total_volumes");

        let mut candles = Vec::new();
        for interval in intervals {
            candles.extend(bucket_candles(symbol, interval, &prices, &volumes));
        }
        Ok(candles)
    }
}

fn field_f64(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Extracts `[[ts_ms, value], ...]` pairs, skipping malformed entries.
fn point_series(payload: &Value, key: &str) -> Vec<(i64, f64)> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let pair = row.as_array()?;
                    if pair.len() < 2 {
                        return None;
                    }
                    Some((pair[0].as_f64()? as i64, pair[1].as_f64()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_series_skips_malformed_rows() {
        let payload = json!({
            "prices": [[1000.0, 10.5], [2000.0], "junk", [3000.0, 11.0]],
        });
        let points = point_series(&payload, "prices");
        assert_eq!(points, vec![(1000, 10.5), (3000, 11.0)]);
        assert!(point_series(&payload, "total_volumes").is_empty());
    }

    #[test]
    fn test_field_f64_missing_defaults_to_zero() {
        let data = json!({"usd": 97000.5});
        assert_eq!(field_f64(&data, "usd"), 97000.5);
        assert_eq!(field_f64(&data, "usd_24h_vol"), 0.0);
    }
}

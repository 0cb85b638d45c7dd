//! Price snapshots (cache-through) and candle refresh.

use anyhow::{anyhow, Result};
use redis::AsyncCommands;
use shared::domain::{is_supported_symbol, Candle, PriceSnapshot, SUPPORTED_SYMBOLS};
use std::sync::Arc;
use tracing::{info, warn};

use crate::providers::MarketDataSource;
use crate::repositories::CandleStore;

const PRICE_CACHE_TTL_SECS: u64 = 90;

const SHORT_CANDLE_DAYS: u32 = 1;
const SHORT_CANDLE_INTERVALS: [&str; 3] = ["5m", "15m", "1h"];
const LONG_CANDLE_DAYS: u32 = 30;
const LONG_CANDLE_INTERVALS: [&str; 2] = ["4h", "1d"];

pub struct PriceService {
    provider: Arc<dyn MarketDataSource>,
    candles: Arc<dyn CandleStore>,
    cache: Option<redis::Client>,
}

impl PriceService {
    pub fn new(
        provider: Arc<dyn MarketDataSource>,
        candles: Arc<dyn CandleStore>,
        cache: Option<redis::Client>,
    ) -> Self {
        PriceService {
            provider,
            candles,
            cache,
        }
    }

    /// Latest price for one symbol: cache first, then one batched provider
    /// call that also warms the cache for every other symbol.
    pub async fn get_current_price(&self, symbol: &str) -> Result<PriceSnapshot> {
        if !is_supported_symbol(symbol) {
            return Err(anyhow!("unsupported symbol: {}", symbol));
        }

        if let Some(cached) = self.read_cache(symbol).await {
            return Ok(cached);
        }

        let prices = self.provider.fetch_prices().await?;
        for snapshot in prices.values() {
            self.write_cache(snapshot).await;
        }
        prices
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("price not available for {}", symbol))
    }

    /// Latest prices for the whole universe; any cache miss triggers one
    /// batched provider call that fills the gaps.
    pub async fn get_current_prices(&self) -> Result<Vec<PriceSnapshot>> {
        let mut snapshots = Vec::with_capacity(SUPPORTED_SYMBOLS.len());
        let mut missing = false;
        for symbol in SUPPORTED_SYMBOLS {
            match self.read_cache(symbol).await {
                Some(cached) => snapshots.push(cached),
                None => missing = true,
            }
        }

        if missing {
            let prices = self.provider.fetch_prices().await?;
            for snapshot in prices.values() {
                self.write_cache(snapshot).await;
                if !snapshots.iter().any(|s| s.symbol == snapshot.symbol) {
                    snapshots.push(snapshot.clone());
                }
            }
        }
        Ok(snapshots)
    }

    pub async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u64,
    ) -> Result<Vec<Candle>> {
        self.candles.get_candles(symbol, interval, limit).await
    }

    /// Fetches every symbol's price in one call and refreshes the cache.
    pub async fn refresh_prices(&self) -> Result<()> {
        let prices = self.provider.fetch_prices().await?;
        for snapshot in prices.values() {
            self.write_cache(snapshot).await;
        }
        info!("Refreshed prices for {} assets", prices.len());
        Ok(())
    }

    /// 1-day market chart bucketed into the short intervals.
    pub async fn refresh_short_candles(&self, symbol: &str) -> Result<()> {
        let candles = self
            .provider
            .fetch_market_chart(symbol, SHORT_CANDLE_DAYS, &SHORT_CANDLE_INTERVALS)
            .await?;
        self.candles.upsert_candles(&candles).await?;
        info!(
            "Refreshed short candles for {} ({} candles)",
            symbol,
            candles.len()
        );
        Ok(())
    }

    /// 30-day market chart bucketed into the long intervals.
    pub async fn refresh_long_candles(&self, symbol: &str) -> Result<()> {
        let candles = self
            .provider
            .fetch_market_chart(symbol, LONG_CANDLE_DAYS, &LONG_CANDLE_INTERVALS)
            .await?;
        self.candles.upsert_candles(&candles).await?;
        info!(
            "Refreshed long candles for {} ({} candles)",
            symbol,
            candles.len()
        );
        Ok(())
    }

    /// Cache read failures fall through to the provider.
    async fn read_cache(&self, symbol: &str) -> Option<PriceSnapshot> {
        let client = self.cache.as_ref()?;
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!("redis cache connect error: {}", err);
                return None;
            }
        };
        let payload: Option<String> = match conn.get(format!("price:{}", symbol)).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!("redis cache read error: {}", err);
                return None;
            }
        };
        serde_json::from_str(&payload?).ok()
    }

    /// Cache write failures never prevent returning data.
    async fn write_cache(&self, snapshot: &PriceSnapshot) {
        let Some(client) = self.cache.as_ref() else {
            return;
        };
        let Ok(payload) = serde_json::to_string(snapshot) else {
            return;
        };
        match client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: redis::RedisResult<()> = conn
                    .set_ex(format!("price:{}", snapshot.symbol), payload, PRICE_CACHE_TTL_SECS)
                    .await;
                if let Err(err) = result {
                    warn!("redis cache write error for {}: {}", snapshot.symbol, err);
                }
            }
            Err(err) => warn!("redis cache connect error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeProvider {
        prices: HashMap<String, PriceSnapshot>,
        chart_calls: Mutex<Vec<(String, u32, Vec<String>)>>,
    }

    #[async_trait]
    impl MarketDataSource for FakeProvider {
        async fn fetch_prices(&self) -> Result<HashMap<String, PriceSnapshot>> {
            Ok(self.prices.clone())
        }

        async fn fetch_market_chart(
            &self,
            symbol: &str,
            days: u32,
            intervals: &[&str],
        ) -> Result<Vec<Candle>> {
            self.chart_calls.lock().unwrap().push((
                symbol.to_string(),
                days,
                intervals.iter().map(|s| s.to_string()).collect(),
            ));
            Ok(vec![Candle {
                symbol: symbol.to_string(),
                interval: intervals[0].to_string(),
                open_time: DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap(),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10.0,
            }])
        }
    }

    #[derive(Default)]
    struct FakeCandleStore {
        upserted: Mutex<Vec<Candle>>,
    }

    #[async_trait]
    impl CandleStore for FakeCandleStore {
        async fn upsert_candles(&self, candles: &[Candle]) -> Result<()> {
            self.upserted.lock().unwrap().extend_from_slice(candles);
            Ok(())
        }

        async fn get_candles(&self, _: &str, _: &str, _: u64) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }

        async fn get_candles_in_range(
            &self,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    fn snapshot(symbol: &str, price: f64) -> PriceSnapshot {
        PriceSnapshot {
            symbol: symbol.to_string(),
            price_usd: price,
            volume_24h: 0.0,
            change_24h_pct: 0.0,
            last_updated_unix: 0,
        }
    }

    fn service_with(prices: &[(&str, f64)]) -> PriceService {
        let provider = FakeProvider {
            prices: prices
                .iter()
                .map(|(s, p)| (s.to_string(), snapshot(s, *p)))
                .collect(),
            chart_calls: Mutex::new(Vec::new()),
        };
        PriceService::new(Arc::new(provider), Arc::new(FakeCandleStore::default()), None)
    }

    #[tokio::test]
    async fn test_get_current_price_rejects_unknown_symbol() {
        let service = service_with(&[("BTC", 97000.0)]);
        let err = service.get_current_price("SHIB").await.unwrap_err();
        assert!(err.to_string().contains("unsupported symbol"));
    }

    #[tokio::test]
    async fn test_get_current_price_uses_batched_fetch() {
        let service = service_with(&[("BTC", 97000.0), ("ETH", 3500.0)]);
        let snap = service.get_current_price("BTC").await.unwrap();
        assert_eq!(snap.price_usd, 97000.0);
        assert!(service.get_current_price("SOL").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_short_and_long_candles() {
        let provider = Arc::new(FakeProvider {
            prices: HashMap::new(),
            chart_calls: Mutex::new(Vec::new()),
        });
        let store = Arc::new(FakeCandleStore::default());
        let service = PriceService::new(provider.clone(), store.clone(), None);

        service.refresh_short_candles("BTC").await.unwrap();
        service.refresh_long_candles("ETH").await.unwrap();

        let calls = provider.chart_calls.lock().unwrap();
        assert_eq!(calls[0].0, "BTC");
        assert_eq!(calls[0].1, 1);
        assert_eq!(calls[0].2, vec!["5m", "15m", "1h"]);
        assert_eq!(calls[1].0, "ETH");
        assert_eq!(calls[1].1, 30);
        assert_eq!(calls[1].2, vec!["4h", "1d"]);
        assert_eq!(store.upserted.lock().unwrap().len(), 2);
    }
}

//! External data fetchers and the capability traits services consume.
//!
//! Every fetcher is a narrow `async_trait` capability so the orchestrating
//! services can take in-memory doubles in tests.

pub mod coingecko;
pub mod feargreed;
pub mod llm;
pub mod onchain;
pub mod rate_limiter;
pub mod reddit;
pub mod rss;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{Candle, PriceSnapshot};
use std::collections::HashMap;

pub use rate_limiter::RateLimiter;
pub use types::{ContentItem, FearGreedPoint, OnChainObservation};

/// Batched market data for the whole supported universe.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// One call returning snapshots for every supported symbol the remote
    /// knows about, keyed by internal symbol.
    async fn fetch_prices(&self) -> Result<HashMap<String, PriceSnapshot>>;

    /// Market-chart points for one symbol, bucketed into the given
    /// intervals.
    async fn fetch_market_chart(
        &self,
        symbol: &str,
        days: u32,
        intervals: &[&str],
    ) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait FearGreedSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<FearGreedPoint>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_feed(&self, feed_url: &str, max_items: usize) -> Result<Vec<ContentItem>>;
}

#[async_trait]
pub trait RedditSource: Send + Sync {
    async fn fetch_hot(&self, subreddit: &str, limit: usize) -> Result<Vec<ContentItem>>;
}

#[async_trait]
pub trait OnChainSource: Send + Sync {
    async fn fetch_snapshot(
        &self,
        interval: &str,
        bucket_time: DateTime<Utc>,
    ) -> Result<OnChainObservation>;
}

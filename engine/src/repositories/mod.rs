//! Storage traits and their sea-orm implementations.
//!
//! Services depend on these narrow traits so tests can substitute in-memory
//! doubles; the `*Repository` types implement them over Postgres.

pub mod candle_repository;
pub mod feature_repository;
pub mod intel_repository;
pub mod model_registry;
pub mod prediction_repository;
pub mod signal_repository;

pub use candle_repository::CandleRepository;
pub use feature_repository::FeatureRepository;
pub use intel_repository::IntelRepository;
pub use model_registry::ModelRegistry;
pub use prediction_repository::PredictionRepository;
pub use signal_repository::SignalRepository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{
    Candle, MarketCompositeSnapshot, MarketIntelItem, MarketOnChainSnapshot, MlFeatureRow,
    MlModelVersion, MlPrediction, Signal, SignalFilter,
};
use std::collections::HashMap;

#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Idempotent batch write keyed on (symbol, interval, open_time); every
    /// non-key column overwrites on conflict.
    async fn upsert_candles(&self, candles: &[Candle]) -> Result<()>;

    /// Up to `limit` most-recent candles, descending by open time.
    async fn get_candles(&self, symbol: &str, interval: &str, limit: u64) -> Result<Vec<Candle>>;

    /// Closed-interval range, descending by open time.
    async fn get_candles_in_range(
        &self,
        symbol: &str,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Conflict-tolerant insert: a signal that already exists under its
    /// unique identity comes back with its existing id.
    async fn insert_signals(&self, signals: &[Signal]) -> Result<Vec<Signal>>;

    async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>>;
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn upsert_rows(&self, rows: &[MlFeatureRow]) -> Result<()>;

    /// Labeled rows of one interval inside [from, to], ascending by open
    /// time.
    async fn list_labeled_rows(
        &self,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MlFeatureRow>>;

    /// The newest row per symbol for one interval.
    async fn list_latest_by_interval(&self, interval: &str) -> Result<Vec<MlFeatureRow>>;
}

#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn next_version(&self, model_key: &str) -> Result<i32>;

    /// Stores the version; `is_active` stays false unless explicitly set.
    async fn insert_model_version(&self, model: MlModelVersion) -> Result<MlModelVersion>;

    async fn get_active_model(&self, model_key: &str) -> Result<Option<MlModelVersion>>;

    async fn get_latest_model(&self, model_key: &str) -> Result<Option<MlModelVersion>>;

    /// Transactional flip of the active slot: clears every row of the key,
    /// then activates the target. Fails if the target version is missing.
    async fn activate_model(&self, model_key: &str, version: i32) -> Result<()>;
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Upsert keyed on (symbol, interval, open_time, model_key,
    /// model_version); id and resolution state survive re-runs.
    async fn upsert_prediction(&self, prediction: MlPrediction) -> Result<MlPrediction>;

    async fn attach_signal_id(&self, prediction_id: i64, signal_id: i64) -> Result<()>;

    async fn list_unresolved_due(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<MlPrediction>>;

    /// Guarded by `resolved_at IS NULL`; returns false when another
    /// resolver already claimed the row.
    async fn resolve_prediction(
        &self,
        prediction_id: i64,
        actual_up: bool,
        is_correct: bool,
        realized_return: f64,
    ) -> Result<bool>;
}

/// Per-source aggregate of item sentiment over a window.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSentimentStats {
    pub score: f64,
    pub confidence: f64,
    pub count: i64,
}

#[async_trait]
pub trait IntelStore: Send + Sync {
    /// Dedup on (source, source_item_id). An already-scored row never loses
    /// its sentiment when the same item is fetched again unscored.
    async fn upsert_items(&self, items: &[MarketIntelItem]) -> Result<Vec<MarketIntelItem>>;

    async fn upsert_item_symbols(&self, item_id: i64, symbols: &[String]) -> Result<()>;

    async fn list_unscored_items(&self, limit: u64) -> Result<Vec<MarketIntelItem>>;

    #[allow(clippy::too_many_arguments)]
    async fn update_item_sentiment(
        &self,
        item_id: i64,
        score: f64,
        confidence: f64,
        label: &str,
        model: &str,
        reason: &str,
        scored_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Average sentiment per source for one symbol over (from, to].
    async fn sentiment_averages(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, SourceSentimentStats>>;

    async fn upsert_onchain_snapshot(
        &self,
        snapshot: MarketOnChainSnapshot,
    ) -> Result<MarketOnChainSnapshot>;

    async fn upsert_composite_snapshot(
        &self,
        snapshot: MarketCompositeSnapshot,
    ) -> Result<MarketCompositeSnapshot>;

    async fn attach_composite_signal_id(
        &self,
        symbol: &str,
        interval: &str,
        open_time: DateTime<Utc>,
        signal_id: i64,
    ) -> Result<()>;

    /// Physically deletes items and snapshots older than the cutoff,
    /// returning how many rows went away.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

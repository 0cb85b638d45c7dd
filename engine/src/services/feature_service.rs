//! Rebuilds feature rows from stored candles ahead of inference.

use anyhow::Result;
use quantlab::features::build_rows;
use shared::domain::SUPPORTED_SYMBOLS;
use std::sync::Arc;
use tracing::warn;

use crate::repositories::{CandleStore, FeatureStore};

/// Enough hourly history to warm every indicator and still emit fresh rows.
const CANDLE_HISTORY_LIMIT: u64 = 500;

pub struct FeatureService {
    candles: Arc<dyn CandleStore>,
    features: Arc<dyn FeatureStore>,
    interval: String,
    target_hours: i64,
}

impl FeatureService {
    pub fn new(
        candles: Arc<dyn CandleStore>,
        features: Arc<dyn FeatureStore>,
        interval: String,
        target_hours: i64,
    ) -> Self {
        FeatureService {
            candles,
            features,
            interval: if interval.is_empty() {
                "1h".to_string()
            } else {
                interval
            },
            target_hours: if target_hours <= 0 { 4 } else { target_hours },
        }
    }

    /// Rebuilds rows for every supported symbol; a symbol that fails is
    /// logged and skipped so the others still refresh.
    pub async fn refresh_all(&self) -> Result<usize> {
        let mut total = 0;
        for symbol in SUPPORTED_SYMBOLS {
            match self.refresh_symbol(symbol).await {
                Ok(count) => total += count,
                Err(err) => warn!("feature refresh failed for {}: {:#}", symbol, err),
            }
        }
        Ok(total)
    }

    async fn refresh_symbol(&self, symbol: &str) -> Result<usize> {
        let candles = self
            .candles
            .get_candles(symbol, &self.interval, CANDLE_HISTORY_LIMIT)
            .await?;
        let rows = build_rows(&candles, self.target_hours);
        if rows.is_empty() {
            return Ok(0);
        }
        self.features.upsert_rows(&rows).await?;
        Ok(rows.len())
    }
}

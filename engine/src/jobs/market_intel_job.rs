//! Periodic market-intel cycle.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::MarketIntelService;

pub struct MarketIntelJob {
    service: Arc<MarketIntelService>,
    poll_interval: Duration,
}

impl MarketIntelJob {
    pub fn new(service: Arc<MarketIntelService>, poll_interval_secs: u64) -> Self {
        MarketIntelJob {
            service,
            poll_interval: Duration::from_secs(if poll_interval_secs == 0 {
                900
            } else {
                poll_interval_secs
            }),
        }
    }

    pub async fn start(&self, cancel: CancellationToken) {
        self.run_once().await;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.run_once().await,
            }
        }
    }

    async fn run_once(&self) {
        match self.service.run_cycle(Utc::now()).await {
            Ok(result) => {
                if result.items_ingested > 0 || result.signals_written > 0 {
                    info!(
                        "Market intel cycle complete ingested={} scored={} onchain={} composites={} signals={} warnings={}",
                        result.items_ingested,
                        result.items_scored,
                        result.onchain_snapshots,
                        result.composites_written,
                        result.signals_written,
                        result.errors.len()
                    );
                }
                for warning in result.errors {
                    tracing::warn!("market intel warning: {}", warning);
                }
            }
            Err(err) => error!("Market intel cycle error: {:#}", err),
        }
    }
}

//! Periodic feature refresh followed by inference over the fresh rows.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::{FeatureService, InferenceService};

pub struct InferenceJob {
    features: Arc<FeatureService>,
    inference: Arc<InferenceService>,
    poll_interval: Duration,
}

impl InferenceJob {
    pub fn new(
        features: Arc<FeatureService>,
        inference: Arc<InferenceService>,
        poll_interval_secs: u64,
    ) -> Self {
        InferenceJob {
            features,
            inference,
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
        let rows = match self.features.refresh_all().await {
            Ok(rows) => rows,
            Err(err) => {
                error!("ML feature refresh error: {:#}", err);
                return;
            }
        };
        match self.inference.run_latest().await {
            Ok(result) => {
                if rows > 0 || result.predictions > 0 {
                    info!(
                        "ML inference cycle complete rows={} predictions={} signals={}",
                        rows, result.predictions, result.signals
                    );
                }
            }
            Err(err) => error!("ML inference error: {:#}", err),
        }
    }
}

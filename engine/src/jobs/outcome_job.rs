//! Periodic resolution of predictions whose target time has passed.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::OutcomeService;

pub struct OutcomeJob {
    service: Arc<OutcomeService>,
    poll_interval: Duration,
    batch_size: u64,
}

impl OutcomeJob {
    pub fn new(service: Arc<OutcomeService>, poll_interval_secs: u64, batch_size: u64) -> Self {
        OutcomeJob {
            service,
            poll_interval: Duration::from_secs(if poll_interval_secs == 0 {
                1800
            } else {
                poll_interval_secs
            }),
            batch_size: if batch_size == 0 { 200 } else { batch_size },
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
        match self.service.resolve_outcomes(Utc::now(), self.batch_size).await {
            Ok(resolved) if resolved > 0 => {
                info!("ML outcome resolver updated {} predictions", resolved);
            }
            Ok(_) => {}
            Err(err) => error!("ML outcome resolver error: {:#}", err),
        }
    }
}

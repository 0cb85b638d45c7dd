use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod jobs;
mod providers;
mod repositories;
mod services;
mod state;

use jobs::{InferenceJob, MarketIntelJob, OutcomeJob, PricePoller, TrainingJob};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting coinsage engine...");
    let config = shared::Config::from_env()?;
    let cancel = CancellationToken::new();
    let state = Arc::new(AppState::new(config, cancel.clone()).await?);
    info!("AppState initialized");

    let mut handles = Vec::new();

    let poller = Arc::new(PricePoller::new(
        state.price_service.clone(),
        state.config.coingecko_poll_secs,
    ));
    handles.push(tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.start(cancel).await }
    }));

    if state.config.ml_enabled {
        let inference = Arc::new(InferenceJob::new(
            state.feature_service.clone(),
            state.inference_service.clone(),
            state.config.ml_infer_poll_secs,
        ));
        handles.push(tokio::spawn({
            let cancel = cancel.clone();
            async move { inference.start(cancel).await }
        }));

        let training = Arc::new(TrainingJob::new(
            state.training_service.clone(),
            state.config.ml_train_hour_utc,
        ));
        handles.push(tokio::spawn({
            let cancel = cancel.clone();
            async move { training.start(cancel).await }
        }));

        let outcomes = Arc::new(OutcomeJob::new(
            state.outcome_service.clone(),
            state.config.ml_resolve_poll_secs,
            200,
        ));
        handles.push(tokio::spawn({
            let cancel = cancel.clone();
            async move { outcomes.start(cancel).await }
        }));
    } else {
        info!("ML jobs disabled");
    }

    if state.config.market_intel_enabled {
        let intel = Arc::new(MarketIntelJob::new(
            state.market_intel_service.clone(),
            state.config.market_intel_poll_secs,
        ));
        handles.push(tokio::spawn({
            let cancel = cancel.clone();
            async move { intel.start(cancel).await }
        }));
    } else {
        info!("Market intel job disabled");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    info!("Engine stopped");
    Ok(())
}

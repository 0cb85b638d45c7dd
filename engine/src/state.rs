//! Process-wide wiring: config, connections, repositories and services.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use shared::{get_db_connection, Config};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::onchain::{
    AdaKoiosProvider, BtcMempoolProvider, EthBlockscoutProvider, XrpScanProvider,
};
use crate::providers::{coingecko::CoinGeckoProvider, feargreed::FearGreedProvider,
    llm::OpenAiScorer, reddit::RedditProvider, rss::RssProvider, OnChainSource};
use crate::repositories::{
    CandleRepository, FeatureRepository, IntelRepository, ModelRegistry, PredictionRepository,
    SignalRepository,
};
use crate::services::market_intel::scorer::Scorer;
use crate::services::{
    FeatureService, InferenceConfig, InferenceService, MarketIntelConfig, MarketIntelService,
    OutcomeService, PriceService, TrainingConfig, TrainingService,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<DatabaseConnection>,
    pub price_service: Arc<PriceService>,
    pub feature_service: Arc<FeatureService>,
    pub training_service: Arc<TrainingService>,
    pub inference_service: Arc<InferenceService>,
    pub outcome_service: Arc<OutcomeService>,
    pub market_intel_service: Arc<MarketIntelService>,
}

impl AppState {
    pub async fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let db = Arc::new(get_db_connection(&config.database_url).await?);
        Migrator::up(db.as_ref(), None)
            .await
            .context("run database migrations")?;
        info!("Database ready");

        let redis = match redis::Client::open(config.redis_url.as_str()) {
            Ok(client) => Some(client),
            Err(err) => {
                warn!("redis unavailable, price cache disabled: {}", err);
                None
            }
        };

        let candle_repo = Arc::new(CandleRepository::new(db.clone()));
        let signal_repo = Arc::new(SignalRepository::new(db.clone()));
        let feature_repo = Arc::new(FeatureRepository::new(db.clone()));
        let registry = Arc::new(ModelRegistry::new(db.clone()));
        let prediction_repo = Arc::new(PredictionRepository::new(db.clone()));
        let intel_repo = Arc::new(IntelRepository::new(db.clone()));

        let coingecko = Arc::new(CoinGeckoProvider::new(cancel.clone())?);
        let price_service = Arc::new(PriceService::new(
            coingecko,
            candle_repo.clone(),
            redis,
        ));

        let feature_service = Arc::new(FeatureService::new(
            candle_repo.clone(),
            feature_repo.clone(),
            config.ml_interval.clone(),
            config.ml_target_hours,
        ));
        let training_service = Arc::new(TrainingService::new(
            feature_repo.clone(),
            registry.clone(),
            TrainingConfig {
                interval: config.ml_interval.clone(),
                train_window_days: config.ml_train_window_days,
                min_train_samples: config.ml_min_train_samples,
            },
        ));
        let inference_service = Arc::new(InferenceService::new(
            feature_repo,
            registry,
            prediction_repo.clone(),
            signal_repo.clone(),
            InferenceConfig {
                interval: config.ml_interval.clone(),
                target_hours: config.ml_target_hours,
                long_threshold: config.ml_long_threshold,
                short_threshold: config.ml_short_threshold,
            },
        ));
        let outcome_service = Arc::new(OutcomeService::new(prediction_repo, candle_repo));

        let mut onchain: HashMap<String, Arc<dyn OnChainSource>> = HashMap::new();
        if config.enable_onchain {
            for symbol in &config.onchain_symbols {
                let provider: Option<Arc<dyn OnChainSource>> = match symbol.as_str() {
                    "BTC" => Some(Arc::new(BtcMempoolProvider::new(None)?)),
                    "ETH" => Some(Arc::new(EthBlockscoutProvider::new(None)?)),
                    "ADA" => Some(Arc::new(AdaKoiosProvider::new(None)?)),
                    "XRP" => Some(Arc::new(XrpScanProvider::new(None)?)),
                    other => {
                        warn!("no on-chain provider for {}", other);
                        None
                    }
                };
                if let Some(provider) = provider {
                    onchain.insert(symbol.clone(), provider);
                }
            }
        }

        let llm = OpenAiScorer::new(config.openai_api_key.as_deref(), &config.openai_model)?;
        if llm.is_none() {
            info!("LLM scorer disabled, heuristic sentiment only");
        }
        let scorer = Scorer::new(
            llm.map(|s| Arc::new(s) as _),
            config.scoring_batch_size,
        );

        let market_intel_service = Arc::new(MarketIntelService::new(
            intel_repo,
            scorer,
            Some(signal_repo),
            Some(Arc::new(FearGreedProvider::new()?)),
            Some(Arc::new(RedditProvider::new()?)),
            Some(Arc::new(RssProvider::new()?)),
            onchain,
            MarketIntelConfig {
                intervals: config.market_intel_intervals.clone(),
                long_threshold: config.market_intel_long_threshold,
                short_threshold: config.market_intel_short_threshold,
                lookback_hours_1h: config.market_intel_lookback_hours_1h,
                lookback_hours_4h: config.market_intel_lookback_hours_4h,
                reddit_post_limit: config.reddit_post_limit,
                scoring_batch_size: config.scoring_batch_size,
                retention_days: config.retention_days,
                enable_onchain: config.enable_onchain,
                onchain_symbols: config.onchain_symbols.clone(),
                news_feeds: config.news_feeds.clone(),
                reddit_subs: config.reddit_subs.clone(),
                news_feed_item_limit: 40,
            },
        ));

        Ok(AppState {
            config: Arc::new(config),
            db,
            price_service,
            feature_service,
            training_service,
            inference_service,
            outcome_service,
            market_intel_service,
        })
    }
}

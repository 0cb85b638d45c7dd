//! Market-intelligence pipeline: ingestion, scoring, aggregation, composite
//! signals and retention.

pub mod composite;
pub mod scorer;
pub mod symbols;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use composite::{build_composite, Component, CompositeInput, MODEL_KEY_FUND_SENT_V1};
use scorer::Scorer;
use shared::domain::{
    indicator, interval_duration, MarketCompositeSnapshot, MarketIntelItem,
    MarketIntelRunResult, MarketOnChainSnapshot, Signal, SignalDirection, SUPPORTED_SYMBOLS,
};
use symbols::extract_symbols;

use crate::providers::{ContentItem, FearGreedSource, NewsSource, OnChainSource, RedditSource};
use crate::repositories::{IntelStore, SignalStore, SourceSentimentStats};

pub const FEAR_GREED_MODEL: &str = "index:fear_greed_v1";

#[derive(Debug, Clone)]
pub struct MarketIntelConfig {
    pub intervals: Vec<String>,
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub lookback_hours_1h: i64,
    pub lookback_hours_4h: i64,
    pub reddit_post_limit: usize,
    pub scoring_batch_size: usize,
    pub retention_days: i64,
    pub enable_onchain: bool,
    pub onchain_symbols: Vec<String>,
    pub news_feeds: Vec<String>,
    pub reddit_subs: Vec<String>,
    pub news_feed_item_limit: usize,
}

impl Default for MarketIntelConfig {
    fn default() -> Self {
        MarketIntelConfig {
            intervals: vec!["1h".to_string(), "4h".to_string()],
            long_threshold: 0.20,
            short_threshold: -0.20,
            lookback_hours_1h: 12,
            lookback_hours_4h: 24,
            reddit_post_limit: 40,
            scoring_batch_size: 24,
            retention_days: 90,
            enable_onchain: false,
            onchain_symbols: Vec::new(),
            news_feeds: Vec::new(),
            reddit_subs: Vec::new(),
            news_feed_item_limit: 40,
        }
    }
}

pub struct MarketIntelService {
    repo: Arc<dyn IntelStore>,
    scorer: Scorer,
    signals: Option<Arc<dyn SignalStore>>,
    fear_greed: Option<Arc<dyn FearGreedSource>>,
    reddit: Option<Arc<dyn RedditSource>>,
    rss: Option<Arc<dyn NewsSource>>,
    onchain: HashMap<String, Arc<dyn OnChainSource>>,
    cfg: MarketIntelConfig,
}

impl MarketIntelService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn IntelStore>,
        scorer: Scorer,
        signals: Option<Arc<dyn SignalStore>>,
        fear_greed: Option<Arc<dyn FearGreedSource>>,
        reddit: Option<Arc<dyn RedditSource>>,
        rss: Option<Arc<dyn NewsSource>>,
        onchain: HashMap<String, Arc<dyn OnChainSource>>,
        mut cfg: MarketIntelConfig,
    ) -> Self {
        let defaults = MarketIntelConfig::default();
        if cfg.intervals.is_empty() {
            cfg.intervals = defaults.intervals;
        }
        if cfg.long_threshold <= -1.0 || cfg.long_threshold >= 1.0 {
            cfg.long_threshold = defaults.long_threshold;
        }
        if cfg.short_threshold <= -1.0 || cfg.short_threshold >= 1.0 {
            cfg.short_threshold = defaults.short_threshold;
        }
        if cfg.short_threshold > cfg.long_threshold {
            cfg.long_threshold = defaults.long_threshold;
            cfg.short_threshold = defaults.short_threshold;
        }
        if cfg.lookback_hours_1h <= 0 {
            cfg.lookback_hours_1h = defaults.lookback_hours_1h;
        }
        if cfg.lookback_hours_4h <= 0 {
            cfg.lookback_hours_4h = defaults.lookback_hours_4h;
        }
        if cfg.reddit_post_limit == 0 {
            cfg.reddit_post_limit = defaults.reddit_post_limit;
        }
        if cfg.scoring_batch_size == 0 {
            cfg.scoring_batch_size = defaults.scoring_batch_size;
        }
        if cfg.retention_days <= 0 {
            cfg.retention_days = defaults.retention_days;
        }
        if cfg.news_feed_item_limit == 0 {
            cfg.news_feed_item_limit = defaults.news_feed_item_limit;
        }

        MarketIntelService {
            repo,
            scorer,
            signals,
            fear_greed,
            reddit,
            rss,
            onchain,
            cfg,
        }
    }

    /// One full cycle for wall-clock `now`. Per-source failures accumulate
    /// as warnings on the result; only broken storage is fatal.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<MarketIntelRunResult> {
        let mut result = MarketIntelRunResult::default();
        let mut items: Vec<MarketIntelItem> = Vec::new();
        let mut symbol_sets: Vec<Vec<String>> = Vec::new();
        let mut fear_greed_value: Option<i32> = None;

        if let Some(fear_greed) = &self.fear_greed {
            match fear_greed.fetch_latest().await {
                Ok(point) => {
                    fear_greed_value = Some(point.value);
                    let (item, symbols) = fear_greed_item(now, point.value, &point.classification, point.timestamp);
                    items.push(item);
                    symbol_sets.push(symbols);
                }
                Err(err) => result.errors.push(format!("fear_greed: {:#}", err)),
            }
        }

        if let Some(rss) = &self.rss {
            for feed in &self.cfg.news_feeds {
                match rss.fetch_feed(feed, self.cfg.news_feed_item_limit).await {
                    Ok(news_items) => {
                        for row in news_items {
                            let (item, symbols) = content_to_item(now, row);
                            items.push(item);
                            symbol_sets.push(symbols);
                        }
                    }
                    Err(err) => result.errors.push(format!("rss:{}: {:#}", feed, err)),
                }
            }
        }

        if let Some(reddit) = &self.reddit {
            for subreddit in &self.cfg.reddit_subs {
                match reddit.fetch_hot(subreddit, self.cfg.reddit_post_limit).await {
                    Ok(posts) => {
                        for row in posts {
                            let (item, symbols) = content_to_item(now, row);
                            items.push(item);
                            symbol_sets.push(symbols);
                        }
                    }
                    Err(err) => result
                        .errors
                        .push(format!("reddit:{}: {:#}", subreddit, err)),
                }
            }
        }

        let persisted = self.repo.upsert_items(&items).await?;
        result.items_ingested += persisted.len();
        for (item, symbols) in persisted.iter().zip(symbol_sets.iter()) {
            if let Err(err) = self.repo.upsert_item_symbols(item.id, symbols).await {
                result
                    .errors
                    .push(format!("item_symbols:item={}: {:#}", item.id, err));
            }
        }

        let unscored = self
            .repo
            .list_unscored_items((self.cfg.scoring_batch_size as u64 * 4).max(200))
            .await?;
        for row in self.scorer.score(&unscored).await {
            match self
                .repo
                .update_item_sentiment(
                    row.item_id,
                    row.score,
                    row.confidence,
                    &row.label,
                    &row.model,
                    &row.reason,
                    now,
                )
                .await
            {
                Ok(()) => result.items_scored += 1,
                Err(err) => result
                    .errors
                    .push(format!("score_update:item={}: {:#}", row.item_id, err)),
            }
        }

        let mut onchain_by_key: HashMap<String, MarketOnChainSnapshot> = HashMap::new();
        if self.cfg.enable_onchain {
            for interval in &self.cfg.intervals {
                let bucket = closed_bucket(now, interval);
                for symbol in &self.cfg.onchain_symbols {
                    let Some(reader) = self.onchain.get(symbol) else {
                        continue;
                    };
                    let observation = match reader.fetch_snapshot(interval, bucket).await {
                        Ok(observation) => observation,
                        Err(err) => {
                            result
                                .errors
                                .push(format!("onchain:{}:{}: {:#}", symbol, interval, err));
                            continue;
                        }
                    };
                    match self
                        .repo
                        .upsert_onchain_snapshot(MarketOnChainSnapshot {
                            symbol: observation.symbol.clone(),
                            interval: interval.clone(),
                            bucket_time: bucket,
                            provider_key: observation.provider_key.clone(),
                            onchain_score: observation.score,
                            confidence: observation.confidence,
                            details_json: observation.metrics.to_string(),
                        })
                        .await
                    {
                        Ok(stored) => {
                            onchain_by_key.insert(format!("{}|{}", interval, stored.symbol), stored);
                            result.onchain_snapshots += 1;
                        }
                        Err(err) => result
                            .errors
                            .push(format!("onchain_store:{}:{}: {:#}", symbol, interval, err)),
                    }
                }
            }
        }

        for interval in &self.cfg.intervals {
            let bucket = closed_bucket(now, interval);
            let lookback = self.lookback_hours(interval);
            let from = bucket - Duration::hours(lookback);

            for symbol in SUPPORTED_SYMBOLS {
                let stats = match self.repo.sentiment_averages(symbol, from, bucket).await {
                    Ok(stats) => stats,
                    Err(err) => {
                        result
                            .errors
                            .push(format!("aggregate:{}:{}: {:#}", symbol, interval, err));
                        continue;
                    }
                };

                let mut input = CompositeInput {
                    interval: interval.clone(),
                    long_threshold: self.cfg.long_threshold,
                    short_threshold: self.cfg.short_threshold,
                    fear_greed_value,
                    fear_greed: component_from_stats(stats.get("fear_greed")),
                    news: component_from_stats(stats.get("news")),
                    reddit: component_from_stats(stats.get("reddit")),
                    onchain: Component::default(),
                };
                if let Some(snapshot) = onchain_by_key.get(&format!("{}|{}", interval, symbol)) {
                    input.onchain = Component {
                        score: snapshot.onchain_score,
                        confidence: snapshot.confidence,
                        available: true,
                    };
                }

                let computed = build_composite(&input);
                let details_json = json!({
                    "model_key": MODEL_KEY_FUND_SENT_V1,
                    "interval": interval,
                    "score": computed.score,
                    "confidence": computed.confidence,
                    "details": computed.details_text,
                    "lookback_h": lookback,
                })
                .to_string();

                let snapshot = MarketCompositeSnapshot {
                    symbol: symbol.to_string(),
                    interval: interval.clone(),
                    open_time: bucket,
                    fear_greed_value,
                    fear_greed_score: score_if_available(&input.fear_greed),
                    news_score: score_if_available(&input.news),
                    reddit_score: score_if_available(&input.reddit),
                    onchain_score: score_if_available(&input.onchain),
                    composite_score: computed.score,
                    confidence: computed.confidence,
                    direction: computed.direction,
                    risk: computed.risk,
                    component_weights_json: computed.weights_json().to_string(),
                    details_json,
                    signal_id: None,
                };
                if let Err(err) = self.repo.upsert_composite_snapshot(snapshot).await {
                    result
                        .errors
                        .push(format!("composite_store:{}:{}: {:#}", symbol, interval, err));
                    continue;
                }
                result.composites_written += 1;

                if computed.direction == SignalDirection::Hold {
                    continue;
                }
                let Some(signals) = &self.signals else {
                    continue;
                };
                let persisted = match signals
                    .insert_signals(&[Signal {
                        id: 0,
                        symbol: symbol.to_string(),
                        interval: interval.clone(),
                        indicator: indicator::FUND_SENTIMENT_COMPOSITE.to_string(),
                        timestamp: bucket,
                        risk: computed.risk,
                        direction: computed.direction,
                        details: computed.details_text.clone(),
                    }])
                    .await
                {
                    Ok(persisted) => persisted,
                    Err(err) => {
                        result
                            .errors
                            .push(format!("signal_store:{}:{}: {:#}", symbol, interval, err));
                        continue;
                    }
                };
                if let Some(signal) = persisted.first().filter(|s| s.id > 0) {
                    if let Err(err) = self
                        .repo
                        .attach_composite_signal_id(symbol, interval, bucket, signal.id)
                        .await
                    {
                        result.errors.push(format!(
                            "signal_attach:{}:{}:{}: {:#}",
                            symbol, interval, signal.id, err
                        ));
                    }
                }
                result.signals_written += 1;
            }
        }

        if self.cfg.retention_days > 0 {
            let cutoff = now - Duration::days(self.cfg.retention_days);
            if let Err(err) = self.repo.delete_older_than(cutoff).await {
                result.errors.push(format!("retention: {:#}", err));
            }
        }

        Ok(result)
    }

    fn lookback_hours(&self, interval: &str) -> i64 {
        if interval == "4h" {
            self.cfg.lookback_hours_4h
        } else {
            self.cfg.lookback_hours_1h
        }
    }
}

/// The most recent fully-closed bucket boundary for the interval.
fn closed_bucket(now: DateTime<Utc>, interval: &str) -> DateTime<Utc> {
    let duration = interval_duration(interval).unwrap_or(Duration::hours(1));
    let secs = duration.num_seconds();
    let floored = now.timestamp().div_euclid(secs) * secs;
    DateTime::from_timestamp(floored - secs, 0).unwrap_or(now)
}

/// Converts the raw index value into a pre-scored synthetic item that covers
/// the whole symbol universe.
fn fear_greed_item(
    now: DateTime<Utc>,
    value: i32,
    classification: &str,
    timestamp: DateTime<Utc>,
) -> (MarketIntelItem, Vec<String>) {
    let score = ((value as f64 - 50.0) / 50.0).clamp(-1.0, 1.0);
    let confidence = (0.4 + 0.6 * score.abs()).clamp(0.0, 1.0);
    let label = if score > 0.2 {
        "bullish"
    } else if score < -0.2 {
        "bearish"
    } else {
        "neutral"
    };
    let reason = if classification.trim().is_empty() {
        "fear-greed-index".to_string()
    } else {
        classification.trim().to_string()
    };
    let metadata = json!({
        "value": value,
        "classification": classification,
    });

    let item = MarketIntelItem {
        id: 0,
        source: "fear_greed".to_string(),
        source_item_id: timestamp.timestamp().to_string(),
        title: format!("Fear & Greed: {} ({})", value, classification),
        url: "https://alternative.me/crypto/fear-and-greed-index/".to_string(),
        excerpt: "Crypto market fear and greed index".to_string(),
        author: "alternative.me".to_string(),
        published_at: timestamp,
        fetched_at: now,
        metadata_json: metadata.to_string(),
        sentiment_score: Some(score),
        sentiment_confidence: Some(confidence),
        sentiment_label: Some(label.to_string()),
        sentiment_model: Some(FEAR_GREED_MODEL.to_string()),
        sentiment_reason: Some(reason),
        scored_at: Some(now),
        symbols: Vec::new(),
    };
    let symbols = SUPPORTED_SYMBOLS.iter().map(|s| s.to_string()).collect();
    (item, symbols)
}

fn content_to_item(now: DateTime<Utc>, row: ContentItem) -> (MarketIntelItem, Vec<String>) {
    let symbols = extract_symbols(&row.source, &row.title, &row.excerpt, &row.metadata);
    let item = MarketIntelItem {
        id: 0,
        source: row.source,
        source_item_id: row.source_item_id,
        title: row.title.trim().to_string(),
        url: row.url.trim().to_string(),
        excerpt: row.excerpt.trim().to_string(),
        author: row.author.trim().to_string(),
        published_at: row.published_at,
        fetched_at: now,
        metadata_json: row.metadata.to_string(),
        sentiment_score: None,
        sentiment_confidence: None,
        sentiment_label: None,
        sentiment_model: None,
        sentiment_reason: None,
        scored_at: None,
        symbols: Vec::new(),
    };
    (item, symbols)
}

fn component_from_stats(stats: Option<&SourceSentimentStats>) -> Component {
    match stats {
        Some(stats) if stats.count > 0 => Component {
            score: stats.score,
            confidence: stats.confidence,
            available: true,
        },
        _ => Component::default(),
    }
}

fn score_if_available(component: &Component) -> Option<f64> {
    component.available.then_some(component.score)
}

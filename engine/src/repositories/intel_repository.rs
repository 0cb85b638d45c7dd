//! Market-intel persistence: raw items, their symbol links, on-chain and
//! composite snapshots, plus windowed sentiment aggregation and retention.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, Statement,
};
use shared::domain::{
    is_supported_symbol, MarketCompositeSnapshot, MarketIntelItem, MarketOnChainSnapshot,
    SignalDirection,
};
use shared::entity::{market_composite_snapshots, market_intel_item_symbols, market_intel_items,
    market_onchain_snapshots};
use std::collections::HashMap;
use std::sync::Arc;

use super::{IntelStore, SourceSentimentStats};

pub struct IntelRepository {
    db: Arc<DatabaseConnection>,
}

impl IntelRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        IntelRepository { db }
    }
}

#[derive(FromQueryResult)]
struct SentimentAvgRow {
    source: String,
    avg_score: f64,
    avg_conf: f64,
    n: i64,
}

/// `COALESCE(excluded.col, current.col)` so a re-fetched unscored item never
/// wipes sentiment that is already stored.
fn coalesce_excluded(column: &str) -> SimpleExpr {
    Expr::cust(format!(
        "COALESCE(\"excluded\".\"{0}\", \"market_intel_items\".\"{0}\")",
        column
    ))
}

#[async_trait]
impl IntelStore for IntelRepository {
    async fn upsert_items(&self, items: &[MarketIntelItem]) -> Result<Vec<MarketIntelItem>> {
        let mut persisted = Vec::with_capacity(items.len());
        for item in items {
            let metadata = if item.metadata_json.is_empty() {
                "{}".to_string()
            } else {
                item.metadata_json.clone()
            };
            let model = market_intel_items::ActiveModel {
                id: ActiveValue::NotSet,
                source: ActiveValue::Set(item.source.clone()),
                source_item_id: ActiveValue::Set(item.source_item_id.clone()),
                title: ActiveValue::Set(item.title.trim().to_string()),
                url: ActiveValue::Set(item.url.trim().to_string()),
                excerpt: ActiveValue::Set(item.excerpt.trim().to_string()),
                author: ActiveValue::Set(item.author.trim().to_string()),
                published_at: ActiveValue::Set(item.published_at),
                fetched_at: ActiveValue::Set(item.fetched_at),
                metadata_json: ActiveValue::Set(metadata),
                sentiment_score: ActiveValue::Set(item.sentiment_score),
                sentiment_confidence: ActiveValue::Set(item.sentiment_confidence),
                sentiment_label: ActiveValue::Set(item.sentiment_label.clone()),
                sentiment_model: ActiveValue::Set(item.sentiment_model.clone()),
                sentiment_reason: ActiveValue::Set(item.sentiment_reason.clone()),
                scored_at: ActiveValue::Set(item.scored_at),
                created_at: ActiveValue::Set(Utc::now()),
                updated_at: ActiveValue::Set(Utc::now()),
            };

            let stored = market_intel_items::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        market_intel_items::Column::Source,
                        market_intel_items::Column::SourceItemId,
                    ])
                    .update_columns([
                        market_intel_items::Column::Title,
                        market_intel_items::Column::Url,
                        market_intel_items::Column::Excerpt,
                        market_intel_items::Column::Author,
                        market_intel_items::Column::PublishedAt,
                        market_intel_items::Column::FetchedAt,
                        market_intel_items::Column::MetadataJson,
                        market_intel_items::Column::UpdatedAt,
                    ])
                    .value(
                        market_intel_items::Column::SentimentScore,
                        coalesce_excluded("sentiment_score"),
                    )
                    .value(
                        market_intel_items::Column::SentimentConfidence,
                        coalesce_excluded("sentiment_confidence"),
                    )
                    .value(
                        market_intel_items::Column::SentimentLabel,
                        coalesce_excluded("sentiment_label"),
                    )
                    .value(
                        market_intel_items::Column::SentimentModel,
                        coalesce_excluded("sentiment_model"),
                    )
                    .value(
                        market_intel_items::Column::SentimentReason,
                        coalesce_excluded("sentiment_reason"),
                    )
                    .value(
                        market_intel_items::Column::ScoredAt,
                        coalesce_excluded("scored_at"),
                    )
                    .to_owned(),
                )
                .exec_with_returning(self.db.as_ref())
                .await?;
            persisted.push(to_domain_item(stored));
        }
        Ok(persisted)
    }

    async fn upsert_item_symbols(&self, item_id: i64, symbols: &[String]) -> Result<()> {
        if item_id <= 0 || symbols.is_empty() {
            return Ok(());
        }
        let mut seen = std::collections::BTreeSet::new();
        for symbol in symbols {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() || !is_supported_symbol(&symbol) {
                continue;
            }
            seen.insert(symbol);
        }
        for symbol in seen {
            let link = market_intel_item_symbols::ActiveModel {
                item_id: ActiveValue::Set(item_id),
                symbol: ActiveValue::Set(symbol),
            };
            market_intel_item_symbols::Entity::insert(link)
                .on_conflict(
                    OnConflict::columns([
                        market_intel_item_symbols::Column::ItemId,
                        market_intel_item_symbols::Column::Symbol,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(self.db.as_ref())
                .await?;
        }
        Ok(())
    }

    async fn list_unscored_items(&self, limit: u64) -> Result<Vec<MarketIntelItem>> {
        let limit = if limit == 0 { 200 } else { limit };
        let rows = market_intel_items::Entity::find()
            .filter(market_intel_items::Column::ScoredAt.is_null())
            .order_by_desc(market_intel_items::Column::PublishedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain_item).collect())
    }

    async fn update_item_sentiment(
        &self,
        item_id: i64,
        score: f64,
        confidence: f64,
        label: &str,
        model: &str,
        reason: &str,
        scored_at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = market_intel_items::Entity::update_many()
            .col_expr(
                market_intel_items::Column::SentimentScore,
                Expr::value(Some(score)),
            )
            .col_expr(
                market_intel_items::Column::SentimentConfidence,
                Expr::value(Some(confidence)),
            )
            .col_expr(
                market_intel_items::Column::SentimentLabel,
                Expr::value(Some(label.to_string())),
            )
            .col_expr(
                market_intel_items::Column::SentimentModel,
                Expr::value(Some(model.to_string())),
            )
            .col_expr(
                market_intel_items::Column::SentimentReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(
                market_intel_items::Column::ScoredAt,
                Expr::value(Some(scored_at)),
            )
            .col_expr(market_intel_items::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(market_intel_items::Column::Id.eq(item_id))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(anyhow!("intel item {} not found", item_id));
        }
        Ok(())
    }

    async fn sentiment_averages(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, SourceSentimentStats>> {
        let symbol = symbol.trim().to_uppercase();
        if !is_supported_symbol(&symbol) {
            return Ok(HashMap::new());
        }

        let rows = SentimentAvgRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
SELECT i.source AS source,
       AVG(i.sentiment_score) AS avg_score,
       AVG(i.sentiment_confidence) AS avg_conf,
       COUNT(*) AS n
FROM market_intel_items i
JOIN market_intel_item_symbols s ON s.item_id = i.id
WHERE s.symbol = $1
  AND i.scored_at IS NOT NULL
  AND i.published_at >= $2
  AND i.published_at <= $3
GROUP BY i.source"#,
            [symbol.into(), from.into(), to.into()],
        ))
        .all(self.db.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.source,
                    SourceSentimentStats {
                        score: row.avg_score,
                        confidence: row.avg_conf,
                        count: row.n,
                    },
                )
            })
            .collect())
    }

    async fn upsert_onchain_snapshot(
        &self,
        snapshot: MarketOnChainSnapshot,
    ) -> Result<MarketOnChainSnapshot> {
        let model = market_onchain_snapshots::ActiveModel {
            symbol: ActiveValue::Set(snapshot.symbol.to_uppercase()),
            interval: ActiveValue::Set(snapshot.interval),
            bucket_time: ActiveValue::Set(snapshot.bucket_time),
            provider_key: ActiveValue::Set(snapshot.provider_key),
            onchain_score: ActiveValue::Set(snapshot.onchain_score),
            confidence: ActiveValue::Set(snapshot.confidence),
            details_json: ActiveValue::Set(ensure_json(snapshot.details_json)),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let stored = market_onchain_snapshots::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    market_onchain_snapshots::Column::Symbol,
                    market_onchain_snapshots::Column::Interval,
                    market_onchain_snapshots::Column::BucketTime,
                    market_onchain_snapshots::Column::ProviderKey,
                ])
                .update_columns([
                    market_onchain_snapshots::Column::OnchainScore,
                    market_onchain_snapshots::Column::Confidence,
                    market_onchain_snapshots::Column::DetailsJson,
                    market_onchain_snapshots::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(MarketOnChainSnapshot {
            symbol: stored.symbol,
            interval: stored.interval,
            bucket_time: stored.bucket_time,
            provider_key: stored.provider_key,
            onchain_score: stored.onchain_score,
            confidence: stored.confidence,
            details_json: stored.details_json,
        })
    }

    async fn upsert_composite_snapshot(
        &self,
        snapshot: MarketCompositeSnapshot,
    ) -> Result<MarketCompositeSnapshot> {
        let model = market_composite_snapshots::ActiveModel {
            symbol: ActiveValue::Set(snapshot.symbol.to_uppercase()),
            interval: ActiveValue::Set(snapshot.interval),
            open_time: ActiveValue::Set(snapshot.open_time),
            fear_greed_value: ActiveValue::Set(snapshot.fear_greed_value),
            fear_greed_score: ActiveValue::Set(snapshot.fear_greed_score),
            news_score: ActiveValue::Set(snapshot.news_score),
            reddit_score: ActiveValue::Set(snapshot.reddit_score),
            onchain_score: ActiveValue::Set(snapshot.onchain_score),
            composite_score: ActiveValue::Set(snapshot.composite_score),
            confidence: ActiveValue::Set(snapshot.confidence),
            direction: ActiveValue::Set(snapshot.direction.as_str().to_string()),
            risk: ActiveValue::Set(snapshot.risk),
            component_weights_json: ActiveValue::Set(ensure_json(snapshot.component_weights_json)),
            details_json: ActiveValue::Set(ensure_json(snapshot.details_json)),
            signal_id: ActiveValue::Set(snapshot.signal_id),
            created_at: ActiveValue::Set(Utc::now()),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        let stored = market_composite_snapshots::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    market_composite_snapshots::Column::Symbol,
                    market_composite_snapshots::Column::Interval,
                    market_composite_snapshots::Column::OpenTime,
                ])
                .update_columns([
                    market_composite_snapshots::Column::FearGreedValue,
                    market_composite_snapshots::Column::FearGreedScore,
                    market_composite_snapshots::Column::NewsScore,
                    market_composite_snapshots::Column::RedditScore,
                    market_composite_snapshots::Column::OnchainScore,
                    market_composite_snapshots::Column::CompositeScore,
                    market_composite_snapshots::Column::Confidence,
                    market_composite_snapshots::Column::Direction,
                    market_composite_snapshots::Column::Risk,
                    market_composite_snapshots::Column::ComponentWeightsJson,
                    market_composite_snapshots::Column::DetailsJson,
                    market_composite_snapshots::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await?;

        Ok(MarketCompositeSnapshot {
            symbol: stored.symbol,
            interval: stored.interval,
            open_time: stored.open_time,
            fear_greed_value: stored.fear_greed_value,
            fear_greed_score: stored.fear_greed_score,
            news_score: stored.news_score,
            reddit_score: stored.reddit_score,
            onchain_score: stored.onchain_score,
            composite_score: stored.composite_score,
            confidence: stored.confidence,
            direction: SignalDirection::parse(&stored.direction),
            risk: stored.risk,
            component_weights_json: stored.component_weights_json,
            details_json: stored.details_json,
            signal_id: stored.signal_id,
        })
    }

    async fn attach_composite_signal_id(
        &self,
        symbol: &str,
        interval: &str,
        open_time: DateTime<Utc>,
        signal_id: i64,
    ) -> Result<()> {
        let updated = market_composite_snapshots::Entity::update_many()
            .col_expr(
                market_composite_snapshots::Column::SignalId,
                Expr::value(Some(signal_id)),
            )
            .col_expr(
                market_composite_snapshots::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(market_composite_snapshots::Column::Symbol.eq(symbol.to_uppercase()))
            .filter(market_composite_snapshots::Column::Interval.eq(interval))
            .filter(market_composite_snapshots::Column::OpenTime.eq(open_time))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(anyhow!(
                "composite snapshot {}/{}/{} not found",
                symbol,
                interval,
                open_time
            ));
        }
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut total = 0u64;
        total += market_intel_items::Entity::delete_many()
            .filter(market_intel_items::Column::PublishedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;
        total += market_onchain_snapshots::Entity::delete_many()
            .filter(market_onchain_snapshots::Column::BucketTime.lt(cutoff))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;
        total += market_composite_snapshots::Entity::delete_many()
            .filter(market_composite_snapshots::Column::OpenTime.lt(cutoff))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;
        Ok(total)
    }
}

fn ensure_json(raw: String) -> String {
    if raw.is_empty() {
        return "{}".to_string();
    }
    if serde_json::from_str::<serde_json::Value>(&raw).is_ok() {
        return raw;
    }
    serde_json::json!({ "raw": raw }).to_string()
}

fn to_domain_item(model: market_intel_items::Model) -> MarketIntelItem {
    MarketIntelItem {
        id: model.id,
        source: model.source,
        source_item_id: model.source_item_id,
        title: model.title,
        url: model.url,
        excerpt: model.excerpt,
        author: model.author,
        published_at: model.published_at,
        fetched_at: model.fetched_at,
        metadata_json: model.metadata_json,
        sentiment_score: model.sentiment_score,
        sentiment_confidence: model.sentiment_confidence,
        sentiment_label: model.sentiment_label,
        sentiment_model: model.sentiment_model,
        sentiment_reason: model.sentiment_reason,
        scored_at: model.scored_at,
        symbols: Vec::new(),
    }
}

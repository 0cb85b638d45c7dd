//! Candle persistence over the `candles` table.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use shared::domain::Candle;
use shared::entity::candles;
use std::sync::Arc;

use super::CandleStore;

pub struct CandleRepository {
    db: Arc<DatabaseConnection>,
}

impl CandleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        CandleRepository { db }
    }
}

#[async_trait]
impl CandleStore for CandleRepository {
    async fn upsert_candles(&self, candles_batch: &[Candle]) -> Result<()> {
        if candles_batch.is_empty() {
            return Ok(());
        }
        let models = candles_batch.iter().map(|c| candles::ActiveModel {
            symbol: ActiveValue::Set(c.symbol.clone()),
            interval: ActiveValue::Set(c.interval.clone()),
            open_time: ActiveValue::Set(c.open_time),
            open: ActiveValue::Set(c.open),
            high: ActiveValue::Set(c.high),
            low: ActiveValue::Set(c.low),
            close: ActiveValue::Set(c.close),
            volume: ActiveValue::Set(c.volume),
        });

        candles::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    candles::Column::Symbol,
                    candles::Column::Interval,
                    candles::Column::OpenTime,
                ])
                .update_columns([
                    candles::Column::Open,
                    candles::Column::High,
                    candles::Column::Low,
                    candles::Column::Close,
                    candles::Column::Volume,
                ])
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn get_candles(&self, symbol: &str, interval: &str, limit: u64) -> Result<Vec<Candle>> {
        let rows = candles::Entity::find()
            .filter(candles::Column::Symbol.eq(symbol))
            .filter(candles::Column::Interval.eq(interval))
            .order_by_desc(candles::Column::OpenTime)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn get_candles_in_range(
        &self,
        symbol: &str,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let rows = candles::Entity::find()
            .filter(candles::Column::Symbol.eq(symbol))
            .filter(candles::Column::Interval.eq(interval))
            .filter(candles::Column::OpenTime.gte(from))
            .filter(candles::Column::OpenTime.lte(to))
            .order_by_desc(candles::Column::OpenTime)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }
}

fn to_domain(model: candles::Model) -> Candle {
    Candle {
        symbol: model.symbol,
        interval: model.interval,
        open_time: model.open_time,
        open: model.open,
        high: model.high,
        low: model.low,
        close: model.close,
        volume: model.volume,
    }
}

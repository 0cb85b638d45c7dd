//! Signal persistence. Signals are unique on (symbol, interval, indicator,
//! timestamp, direction); re-inserting an existing signal hands back the
//! stored row instead of failing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use shared::domain::{Signal, SignalDirection, SignalFilter};
use shared::entity::signals;
use std::sync::Arc;

use super::SignalStore;

pub struct SignalRepository {
    db: Arc<DatabaseConnection>,
}

impl SignalRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        SignalRepository { db }
    }

    async fn find_existing(&self, signal: &Signal) -> Result<Option<signals::Model>> {
        Ok(signals::Entity::find()
            .filter(signals::Column::Symbol.eq(&signal.symbol))
            .filter(signals::Column::Interval.eq(&signal.interval))
            .filter(signals::Column::Indicator.eq(&signal.indicator))
            .filter(signals::Column::Timestamp.eq(signal.timestamp))
            .filter(signals::Column::Direction.eq(signal.direction.as_str()))
            .one(self.db.as_ref())
            .await?)
    }
}

#[async_trait]
impl SignalStore for SignalRepository {
    async fn insert_signals(&self, signals_batch: &[Signal]) -> Result<Vec<Signal>> {
        let mut persisted = Vec::with_capacity(signals_batch.len());
        for signal in signals_batch {
            let model = signals::ActiveModel {
                id: ActiveValue::NotSet,
                symbol: ActiveValue::Set(signal.symbol.clone()),
                interval: ActiveValue::Set(signal.interval.clone()),
                indicator: ActiveValue::Set(signal.indicator.clone()),
                timestamp: ActiveValue::Set(signal.timestamp),
                risk: ActiveValue::Set(signal.risk),
                direction: ActiveValue::Set(signal.direction.as_str().to_string()),
                details: ActiveValue::Set(signal.details.clone()),
                created_at: ActiveValue::Set(Utc::now()),
            };

            let inserted = signals::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        signals::Column::Symbol,
                        signals::Column::Interval,
                        signals::Column::Indicator,
                        signals::Column::Timestamp,
                        signals::Column::Direction,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_with_returning(self.db.as_ref())
                .await;

            let model = match inserted {
                Ok(model) => model,
                Err(DbErr::RecordNotInserted) => match self.find_existing(signal).await? {
                    Some(existing) => existing,
                    None => continue,
                },
                Err(err) => return Err(err.into()),
            };
            persisted.push(to_domain(model));
        }
        Ok(persisted)
    }

    async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>> {
        let mut query = signals::Entity::find();
        if !filter.symbol.is_empty() {
            query = query.filter(signals::Column::Symbol.eq(&filter.symbol));
        }
        if !filter.indicator.is_empty() {
            query = query.filter(signals::Column::Indicator.eq(&filter.indicator));
        }
        if let Some(risk) = filter.risk {
            query = query.filter(signals::Column::Risk.eq(risk));
        }
        let limit = if filter.limit == 0 { 100 } else { filter.limit };
        let rows = query
            .order_by_desc(signals::Column::Timestamp)
            .limit(limit as u64)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }
}

fn to_domain(model: signals::Model) -> Signal {
    Signal {
        id: model.id,
        symbol: model.symbol,
        interval: model.interval,
        indicator: model.indicator,
        timestamp: model.timestamp,
        risk: model.risk,
        direction: SignalDirection::parse(&model.direction),
        details: model.details,
    }
}

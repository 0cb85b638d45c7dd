//! Feature-row persistence over `ml_feature_rows`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use shared::domain::{MlFeatureRow, SUPPORTED_SYMBOLS};
use shared::entity::ml_feature_rows;
use std::sync::Arc;

use super::FeatureStore;

pub struct FeatureRepository {
    db: Arc<DatabaseConnection>,
}

impl FeatureRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        FeatureRepository { db }
    }
}

#[async_trait]
impl FeatureStore for FeatureRepository {
    async fn upsert_rows(&self, rows: &[MlFeatureRow]) -> Result<()> {
        let now = Utc::now();
        for row in rows {
            let model = ml_feature_rows::ActiveModel {
                symbol: ActiveValue::Set(row.symbol.clone()),
                interval: ActiveValue::Set(row.interval.clone()),
                open_time: ActiveValue::Set(row.open_time),
                ret_1h: ActiveValue::Set(row.ret_1h),
                ret_4h: ActiveValue::Set(row.ret_4h),
                ret_12h: ActiveValue::Set(row.ret_12h),
                ret_24h: ActiveValue::Set(row.ret_24h),
                volatility_6h: ActiveValue::Set(row.volatility_6h),
                volatility_24h: ActiveValue::Set(row.volatility_24h),
                volume_z_24h: ActiveValue::Set(row.volume_z_24h),
                rsi_14: ActiveValue::Set(row.rsi_14),
                macd_line: ActiveValue::Set(row.macd_line),
                macd_signal: ActiveValue::Set(row.macd_signal),
                macd_hist: ActiveValue::Set(row.macd_hist),
                bb_pos: ActiveValue::Set(row.bb_pos),
                bb_width: ActiveValue::Set(row.bb_width),
                target_up_4h: ActiveValue::Set(row.target_up_4h),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };

            ml_feature_rows::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        ml_feature_rows::Column::Symbol,
                        ml_feature_rows::Column::Interval,
                        ml_feature_rows::Column::OpenTime,
                    ])
                    .update_columns([
                        ml_feature_rows::Column::Ret1h,
                        ml_feature_rows::Column::Ret4h,
                        ml_feature_rows::Column::Ret12h,
                        ml_feature_rows::Column::Ret24h,
                        ml_feature_rows::Column::Volatility6h,
                        ml_feature_rows::Column::Volatility24h,
                        ml_feature_rows::Column::VolumeZ24h,
                        ml_feature_rows::Column::Rsi14,
                        ml_feature_rows::Column::MacdLine,
                        ml_feature_rows::Column::MacdSignal,
                        ml_feature_rows::Column::MacdHist,
                        ml_feature_rows::Column::BbPos,
                        ml_feature_rows::Column::BbWidth,
                        ml_feature_rows::Column::TargetUp4h,
                        ml_feature_rows::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(self.db.as_ref())
                .await?;
        }
        Ok(())
    }

    async fn list_labeled_rows(
        &self,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MlFeatureRow>> {
        let rows = ml_feature_rows::Entity::find()
            .filter(ml_feature_rows::Column::Interval.eq(interval))
            .filter(ml_feature_rows::Column::OpenTime.gte(from))
            .filter(ml_feature_rows::Column::OpenTime.lte(to))
            .filter(ml_feature_rows::Column::TargetUp4h.is_not_null())
            .order_by_asc(ml_feature_rows::Column::OpenTime)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn list_latest_by_interval(&self, interval: &str) -> Result<Vec<MlFeatureRow>> {
        let mut out = Vec::with_capacity(SUPPORTED_SYMBOLS.len());
        for symbol in SUPPORTED_SYMBOLS {
            let latest = ml_feature_rows::Entity::find()
                .filter(ml_feature_rows::Column::Symbol.eq(symbol))
                .filter(ml_feature_rows::Column::Interval.eq(interval))
                .order_by_desc(ml_feature_rows::Column::OpenTime)
                .one(self.db.as_ref())
                .await?;
            if let Some(model) = latest {
                out.push(to_domain(model));
            }
        }
        Ok(out)
    }
}

fn to_domain(model: ml_feature_rows::Model) -> MlFeatureRow {
    MlFeatureRow {
        symbol: model.symbol,
        interval: model.interval,
        open_time: model.open_time,
        ret_1h: model.ret_1h,
        ret_4h: model.ret_4h,
        ret_12h: model.ret_12h,
        ret_24h: model.ret_24h,
        volatility_6h: model.volatility_6h,
        volatility_24h: model.volatility_24h,
        volume_z_24h: model.volume_z_24h,
        rsi_14: model.rsi_14,
        macd_line: model.macd_line,
        macd_signal: model.macd_signal,
        macd_hist: model.macd_hist,
        bb_pos: model.bb_pos,
        bb_width: model.bb_width,
        target_up_4h: model.target_up_4h,
    }
}

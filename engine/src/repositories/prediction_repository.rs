//! Prediction persistence. The upsert updates the live columns only, so a
//! re-run of the same cycle never disturbs a row's id or resolution state.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use shared::domain::{MlPrediction, SignalDirection};
use shared::entity::ml_predictions;
use std::sync::Arc;

use super::PredictionStore;

pub struct PredictionRepository {
    db: Arc<DatabaseConnection>,
}

impl PredictionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        PredictionRepository { db }
    }
}

#[async_trait]
impl PredictionStore for PredictionRepository {
    async fn upsert_prediction(&self, prediction: MlPrediction) -> Result<MlPrediction> {
        let details = if prediction.details_json.is_empty() {
            "{}".to_string()
        } else if serde_json::from_str::<serde_json::Value>(&prediction.details_json).is_err() {
            r#"{"raw":"invalid"}"#.to_string()
        } else {
            prediction.details_json
        };

        let model = ml_predictions::ActiveModel {
            id: ActiveValue::NotSet,
            symbol: ActiveValue::Set(prediction.symbol),
            interval: ActiveValue::Set(prediction.interval),
            open_time: ActiveValue::Set(prediction.open_time),
            target_time: ActiveValue::Set(prediction.target_time),
            model_key: ActiveValue::Set(prediction.model_key),
            model_version: ActiveValue::Set(prediction.model_version),
            prob_up: ActiveValue::Set(prediction.prob_up),
            confidence: ActiveValue::Set(prediction.confidence),
            direction: ActiveValue::Set(prediction.direction.as_str().to_string()),
            risk: ActiveValue::Set(prediction.risk),
            signal_id: ActiveValue::Set(prediction.signal_id),
            details_json: ActiveValue::Set(details),
            created_at: ActiveValue::Set(Utc::now()),
            resolved_at: ActiveValue::Set(None),
            actual_up: ActiveValue::Set(None),
            is_correct: ActiveValue::Set(None),
            realized_return: ActiveValue::Set(None),
        };

        let stored = ml_predictions::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    ml_predictions::Column::Symbol,
                    ml_predictions::Column::Interval,
                    ml_predictions::Column::OpenTime,
                    ml_predictions::Column::ModelKey,
                    ml_predictions::Column::ModelVersion,
                ])
                .update_columns([
                    ml_predictions::Column::ProbUp,
                    ml_predictions::Column::Confidence,
                    ml_predictions::Column::Direction,
                    ml_predictions::Column::Risk,
                    ml_predictions::Column::DetailsJson,
                    ml_predictions::Column::TargetTime,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(to_domain(stored))
    }

    async fn attach_signal_id(&self, prediction_id: i64, signal_id: i64) -> Result<()> {
        let updated = ml_predictions::Entity::update_many()
            .col_expr(ml_predictions::Column::SignalId, Expr::value(Some(signal_id)))
            .filter(ml_predictions::Column::Id.eq(prediction_id))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(anyhow::anyhow!("prediction {} not found", prediction_id));
        }
        Ok(())
    }

    async fn list_unresolved_due(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<MlPrediction>> {
        let limit = if limit == 0 { 200 } else { limit };
        let rows = ml_predictions::Entity::find()
            .filter(ml_predictions::Column::ResolvedAt.is_null())
            .filter(ml_predictions::Column::TargetTime.lte(cutoff))
            .order_by_asc(ml_predictions::Column::TargetTime)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn resolve_prediction(
        &self,
        prediction_id: i64,
        actual_up: bool,
        is_correct: bool,
        realized_return: f64,
    ) -> Result<bool> {
        let updated = ml_predictions::Entity::update_many()
            .col_expr(
                ml_predictions::Column::ResolvedAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(ml_predictions::Column::ActualUp, Expr::value(Some(actual_up)))
            .col_expr(
                ml_predictions::Column::IsCorrect,
                Expr::value(Some(is_correct)),
            )
            .col_expr(
                ml_predictions::Column::RealizedReturn,
                Expr::value(Some(realized_return)),
            )
            .filter(ml_predictions::Column::Id.eq(prediction_id))
            .filter(ml_predictions::Column::ResolvedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(updated.rows_affected > 0)
    }
}

fn to_domain(model: ml_predictions::Model) -> MlPrediction {
    MlPrediction {
        id: model.id,
        symbol: model.symbol,
        interval: model.interval,
        open_time: model.open_time,
        target_time: model.target_time,
        model_key: model.model_key,
        model_version: model.model_version,
        prob_up: model.prob_up,
        confidence: model.confidence,
        direction: SignalDirection::parse(&model.direction),
        risk: model.risk,
        signal_id: model.signal_id,
        details_json: model.details_json,
        created_at: model.created_at,
        resolved_at: model.resolved_at,
        actual_up: model.actual_up,
        is_correct: model.is_correct,
        realized_return: model.realized_return,
    }
}

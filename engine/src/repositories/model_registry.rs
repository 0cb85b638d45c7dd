//! Versioned model registry with an exclusive-active slot per model key.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use shared::domain::MlModelVersion;
use shared::entity::ml_model_versions;
use std::sync::Arc;

use super::ModelStore;

pub struct ModelRegistry {
    db: Arc<DatabaseConnection>,
}

impl ModelRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        ModelRegistry { db }
    }

    async fn get_one(
        &self,
        model_key: &str,
        only_active: bool,
    ) -> Result<Option<MlModelVersion>> {
        let mut query = ml_model_versions::Entity::find()
            .filter(ml_model_versions::Column::ModelKey.eq(model_key));
        if only_active {
            query = query.filter(ml_model_versions::Column::IsActive.eq(true));
        }
        let model = query
            .order_by_desc(ml_model_versions::Column::Version)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(to_domain))
    }
}

#[async_trait]
impl ModelStore for ModelRegistry {
    async fn next_version(&self, model_key: &str) -> Result<i32> {
        let max: Option<i32> = ml_model_versions::Entity::find()
            .filter(ml_model_versions::Column::ModelKey.eq(model_key))
            .select_only()
            .column_as(ml_model_versions::Column::Version.max(), "max_version")
            .into_tuple()
            .one(self.db.as_ref())
            .await?
            .flatten();
        Ok(max.unwrap_or(0) + 1)
    }

    async fn insert_model_version(&self, model: MlModelVersion) -> Result<MlModelVersion> {
        if model.model_key.is_empty() || model.version <= 0 {
            return Err(anyhow!("invalid model version payload"));
        }
        let active = ml_model_versions::ActiveModel {
            id: ActiveValue::NotSet,
            model_key: ActiveValue::Set(model.model_key),
            version: ActiveValue::Set(model.version),
            feature_spec_version: ActiveValue::Set(model.feature_spec_version),
            trained_from: ActiveValue::Set(model.trained_from),
            trained_to: ActiveValue::Set(model.trained_to),
            trained_at: ActiveValue::Set(model.trained_at),
            hyperparams_json: ActiveValue::Set(fallback_json(model.hyperparams_json)),
            metrics_json: ActiveValue::Set(fallback_json(model.metrics_json)),
            artifact_format: ActiveValue::Set(model.artifact_format),
            artifact_blob: ActiveValue::Set(model.artifact_blob),
            is_active: ActiveValue::Set(model.is_active),
            activated_at: ActiveValue::Set(model.activated_at),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let inserted = ml_model_versions::Entity::insert(active)
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(to_domain(inserted))
    }

    async fn get_active_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
        self.get_one(model_key, true).await
    }

    async fn get_latest_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
        self.get_one(model_key, false).await
    }

    async fn activate_model(&self, model_key: &str, version: i32) -> Result<()> {
        let key = model_key.to_string();
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    ml_model_versions::Entity::update_many()
                        .col_expr(ml_model_versions::Column::IsActive, Expr::value(false))
                        .col_expr(
                            ml_model_versions::Column::ActivatedAt,
                            Expr::value(None::<chrono::DateTime<Utc>>),
                        )
                        .filter(ml_model_versions::Column::ModelKey.eq(&key))
                        .exec(txn)
                        .await?;

                    let updated = ml_model_versions::Entity::update_many()
                        .col_expr(ml_model_versions::Column::IsActive, Expr::value(true))
                        .col_expr(
                            ml_model_versions::Column::ActivatedAt,
                            Expr::value(Some(Utc::now())),
                        )
                        .filter(ml_model_versions::Column::ModelKey.eq(&key))
                        .filter(ml_model_versions::Column::Version.eq(version))
                        .exec(txn)
                        .await?;
                    if updated.rows_affected == 0 {
                        return Err(DbErr::RecordNotFound(format!(
                            "model version {}/{} not found",
                            key, version
                        )));
                    }
                    Ok(())
                })
            })
            .await
            .map_err(|err| anyhow!("activate model: {}", err))
    }
}

fn fallback_json(raw: String) -> String {
    if raw.is_empty() {
        "{}".to_string()
    } else {
        raw
    }
}

fn to_domain(model: ml_model_versions::Model) -> MlModelVersion {
    MlModelVersion {
        id: model.id,
        model_key: model.model_key,
        version: model.version,
        feature_spec_version: model.feature_spec_version,
        trained_from: model.trained_from,
        trained_to: model.trained_to,
        trained_at: model.trained_at,
        hyperparams_json: model.hyperparams_json,
        metrics_json: model.metrics_json,
        artifact_format: model.artifact_format,
        artifact_blob: model.artifact_blob,
        is_active: model.is_active,
        activated_at: model.activated_at,
    }
}

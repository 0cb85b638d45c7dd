//! `SeaORM` Entity for versioned model artifacts.
//!
//! A partial unique index on (model_key) WHERE is_active guarantees at most
//! one active version per key.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ml_model_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub model_key: String,
    pub version: i32,
    pub feature_spec_version: String,
    pub trained_from: DateTimeUtc,
    pub trained_to: DateTimeUtc,
    pub trained_at: DateTimeUtc,
    #[sea_orm(column_type = "Text")]
    pub hyperparams_json: String,
    #[sea_orm(column_type = "Text")]
    pub metrics_json: String,
    pub artifact_format: String,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub artifact_blob: Vec<u8>,
    pub is_active: bool,
    pub activated_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

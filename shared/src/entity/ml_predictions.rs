//! `SeaORM` Entity for per-model directional predictions.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ml_predictions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTimeUtc,
    pub target_time: DateTimeUtc,
    pub model_key: String,
    pub model_version: i32,
    #[sea_orm(column_type = "Double")]
    pub prob_up: f64,
    #[sea_orm(column_type = "Double")]
    pub confidence: f64,
    pub direction: String,
    pub risk: i16,
    pub signal_id: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub details_json: String,
    pub created_at: DateTimeUtc,
    pub resolved_at: Option<DateTimeUtc>,
    pub actual_up: Option<bool>,
    pub is_correct: Option<bool>,
    #[sea_orm(column_type = "Double", nullable)]
    pub realized_return: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

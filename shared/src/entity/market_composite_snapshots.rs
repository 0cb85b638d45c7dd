//! `SeaORM` Entity for fused multi-source sentiment snapshots.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "market_composite_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub symbol: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub interval: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub open_time: DateTimeUtc,
    pub fear_greed_value: Option<i32>,
    #[sea_orm(column_type = "Double", nullable)]
    pub fear_greed_score: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub news_score: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub reddit_score: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub onchain_score: Option<f64>,
    #[sea_orm(column_type = "Double")]
    pub composite_score: f64,
    #[sea_orm(column_type = "Double")]
    pub confidence: f64,
    pub direction: String,
    pub risk: i16,
    #[sea_orm(column_type = "Text")]
    pub component_weights_json: String,
    #[sea_orm(column_type = "Text")]
    pub details_json: String,
    pub signal_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

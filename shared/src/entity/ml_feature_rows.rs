//! `SeaORM` Entity for ML feature rows, one per candle.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ml_feature_rows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub symbol: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub interval: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub open_time: DateTimeUtc,
    #[sea_orm(column_type = "Double")]
    pub ret_1h: f64,
    #[sea_orm(column_type = "Double")]
    pub ret_4h: f64,
    #[sea_orm(column_type = "Double")]
    pub ret_12h: f64,
    #[sea_orm(column_type = "Double")]
    pub ret_24h: f64,
    #[sea_orm(column_type = "Double")]
    pub volatility_6h: f64,
    #[sea_orm(column_type = "Double")]
    pub volatility_24h: f64,
    #[sea_orm(column_type = "Double")]
    pub volume_z_24h: f64,
    #[sea_orm(column_type = "Double")]
    pub rsi_14: f64,
    #[sea_orm(column_type = "Double")]
    pub macd_line: f64,
    #[sea_orm(column_type = "Double")]
    pub macd_signal: f64,
    #[sea_orm(column_type = "Double")]
    pub macd_hist: f64,
    #[sea_orm(column_type = "Double")]
    pub bb_pos: f64,
    #[sea_orm(column_type = "Double")]
    pub bb_width: f64,
    pub target_up_4h: Option<bool>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

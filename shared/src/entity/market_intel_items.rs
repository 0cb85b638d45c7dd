//! `SeaORM` Entity for ingested market-intel items (news, reddit, fear/greed).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "market_intel_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source: String, // "news", "reddit" or "fear_greed"
    pub source_item_id: String,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    #[sea_orm(column_type = "Text")]
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTimeUtc,
    pub fetched_at: DateTimeUtc,
    #[sea_orm(column_type = "Text")]
    pub metadata_json: String,
    #[sea_orm(column_type = "Double", nullable)]
    pub sentiment_score: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub sentiment_confidence: Option<f64>,
    pub sentiment_label: Option<String>,
    pub sentiment_model: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub sentiment_reason: Option<String>,
    pub scored_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::market_intel_item_symbols::Entity")]
    Symbols,
}

impl Related<super::market_intel_item_symbols::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Symbols.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

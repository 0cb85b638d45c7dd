use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MarketIntelItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketIntelItems::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MarketIntelItems::Source).string().not_null())
                    .col(
                        ColumnDef::new(MarketIntelItems::SourceItemId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MarketIntelItems::Title).text().not_null())
                    .col(ColumnDef::new(MarketIntelItems::Url).text().not_null().default(""))
                    .col(
                        ColumnDef::new(MarketIntelItems::Excerpt)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::Author)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::MetadataJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(MarketIntelItems::SentimentScore).double().null())
                    .col(
                        ColumnDef::new(MarketIntelItems::SentimentConfidence)
                            .double()
                            .null(),
                    )
                    .col(ColumnDef::new(MarketIntelItems::SentimentLabel).string().null())
                    .col(ColumnDef::new(MarketIntelItems::SentimentModel).string().null())
                    .col(ColumnDef::new(MarketIntelItems::SentimentReason).text().null())
                    .col(
                        ColumnDef::new(MarketIntelItems::ScoredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("uq_market_intel_items_source_item")
                            .col(MarketIntelItems::Source)
                            .col(MarketIntelItems::SourceItemId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_market_intel_items_scored_published")
                    .table(MarketIntelItems::Table)
                    .col(MarketIntelItems::ScoredAt)
                    .col(MarketIntelItems::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MarketIntelItemSymbols::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketIntelItemSymbols::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketIntelItemSymbols::Symbol)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(MarketIntelItemSymbols::ItemId)
                            .col(MarketIntelItemSymbols::Symbol),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_market_intel_item_symbols_item")
                            .from(
                                MarketIntelItemSymbols::Table,
                                MarketIntelItemSymbols::ItemId,
                            )
                            .to(MarketIntelItems::Table, MarketIntelItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MarketOnchainSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::Symbol)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::Interval)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::BucketTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::ProviderKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::OnchainScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::Confidence)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::DetailsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MarketOnchainSnapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(MarketOnchainSnapshots::Symbol)
                            .col(MarketOnchainSnapshots::Interval)
                            .col(MarketOnchainSnapshots::BucketTime)
                            .col(MarketOnchainSnapshots::ProviderKey),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MarketCompositeSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::Symbol)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::Interval)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::OpenTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::FearGreedValue)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::FearGreedScore)
                            .double()
                            .null(),
                    )
                    .col(ColumnDef::new(MarketCompositeSnapshots::NewsScore).double().null())
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::RedditScore)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::OnchainScore)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::CompositeScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::Confidence)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::Direction)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::Risk)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::ComponentWeightsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::DetailsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::SignalId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MarketCompositeSnapshots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(MarketCompositeSnapshots::Symbol)
                            .col(MarketCompositeSnapshots::Interval)
                            .col(MarketCompositeSnapshots::OpenTime),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(MarketCompositeSnapshots::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(MarketOnchainSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(MarketIntelItemSymbols::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(MarketIntelItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MarketIntelItems {
    Table,
    Id,
    Source,
    SourceItemId,
    Title,
    Url,
    Excerpt,
    Author,
    PublishedAt,
    FetchedAt,
    MetadataJson,
    SentimentScore,
    SentimentConfidence,
    SentimentLabel,
    SentimentModel,
    SentimentReason,
    ScoredAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MarketIntelItemSymbols {
    Table,
    ItemId,
    Symbol,
}

#[derive(DeriveIden)]
enum MarketOnchainSnapshots {
    Table,
    Symbol,
    Interval,
    BucketTime,
    ProviderKey,
    OnchainScore,
    Confidence,
    DetailsJson,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MarketCompositeSnapshots {
    Table,
    Symbol,
    Interval,
    OpenTime,
    FearGreedValue,
    FearGreedScore,
    NewsScore,
    RedditScore,
    OnchainScore,
    CompositeScore,
    Confidence,
    Direction,
    Risk,
    ComponentWeightsJson,
    DetailsJson,
    SignalId,
    CreatedAt,
    UpdatedAt,
}

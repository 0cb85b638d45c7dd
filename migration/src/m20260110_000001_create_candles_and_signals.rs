use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Candles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Candles::Symbol).string().not_null())
                    .col(ColumnDef::new(Candles::Interval).string().not_null())
                    .col(ColumnDef::new(Candles::OpenTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Candles::Open).double().not_null())
                    .col(ColumnDef::new(Candles::High).double().not_null())
                    .col(ColumnDef::new(Candles::Low).double().not_null())
                    .col(ColumnDef::new(Candles::Close).double().not_null())
                    .col(ColumnDef::new(Candles::Volume).double().not_null())
                    .primary_key(
                        Index::create()
                            .col(Candles::Symbol)
                            .col(Candles::Interval)
                            .col(Candles::OpenTime),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candles_symbol_interval_time")
                    .table(Candles::Table)
                    .col(Candles::Symbol)
                    .col(Candles::Interval)
                    .col((Candles::OpenTime, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Signals::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Signals::Symbol).string().not_null())
                    .col(ColumnDef::new(Signals::Interval).string().not_null())
                    .col(ColumnDef::new(Signals::Indicator).string().not_null())
                    .col(ColumnDef::new(Signals::Timestamp).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Signals::Risk).small_integer().not_null())
                    .col(ColumnDef::new(Signals::Direction).string().not_null())
                    .col(ColumnDef::new(Signals::Details).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Signals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("uq_signals_identity")
                            .col(Signals::Symbol)
                            .col(Signals::Interval)
                            .col(Signals::Indicator)
                            .col(Signals::Timestamp)
                            .col(Signals::Direction)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Candles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Candles {
    Table,
    Symbol,
    Interval,
    OpenTime,
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    Symbol,
    Interval,
    Indicator,
    Timestamp,
    Risk,
    Direction,
    Details,
    CreatedAt,
}

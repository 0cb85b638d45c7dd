use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MlPredictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MlPredictions::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MlPredictions::Symbol).string().not_null())
                    .col(ColumnDef::new(MlPredictions::Interval).string().not_null())
                    .col(
                        ColumnDef::new(MlPredictions::OpenTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlPredictions::TargetTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MlPredictions::ModelKey).string().not_null())
                    .col(ColumnDef::new(MlPredictions::ModelVersion).integer().not_null())
                    .col(ColumnDef::new(MlPredictions::ProbUp).double().not_null())
                    .col(ColumnDef::new(MlPredictions::Confidence).double().not_null())
                    .col(ColumnDef::new(MlPredictions::Direction).string().not_null())
                    .col(ColumnDef::new(MlPredictions::Risk).small_integer().not_null())
                    .col(ColumnDef::new(MlPredictions::SignalId).big_integer().null())
                    .col(
                        ColumnDef::new(MlPredictions::DetailsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MlPredictions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MlPredictions::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(MlPredictions::ActualUp).boolean().null())
                    .col(ColumnDef::new(MlPredictions::IsCorrect).boolean().null())
                    .col(ColumnDef::new(MlPredictions::RealizedReturn).double().null())
                    .index(
                        Index::create()
                            .name("uq_ml_predictions_identity")
                            .col(MlPredictions::Symbol)
                            .col(MlPredictions::Interval)
                            .col(MlPredictions::OpenTime)
                            .col(MlPredictions::ModelKey)
                            .col(MlPredictions::ModelVersion)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ml_predictions_unresolved_due")
                    .table(MlPredictions::Table)
                    .col(MlPredictions::ResolvedAt)
                    .col(MlPredictions::TargetTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MlPredictions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MlPredictions {
    Table,
    Id,
    Symbol,
    Interval,
    OpenTime,
    TargetTime,
    ModelKey,
    ModelVersion,
    ProbUp,
    Confidence,
    Direction,
    Risk,
    SignalId,
    DetailsJson,
    CreatedAt,
    ResolvedAt,
    ActualUp,
    IsCorrect,
    RealizedReturn,
}

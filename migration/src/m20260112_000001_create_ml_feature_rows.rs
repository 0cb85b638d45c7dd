use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MlFeatureRows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MlFeatureRows::Symbol).string().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Interval).string().not_null())
                    .col(
                        ColumnDef::new(MlFeatureRows::OpenTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MlFeatureRows::Ret1h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Ret4h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Ret12h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Ret24h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Volatility6h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Volatility24h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::VolumeZ24h).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::Rsi14).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::MacdLine).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::MacdSignal).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::MacdHist).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::BbPos).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::BbWidth).double().not_null())
                    .col(ColumnDef::new(MlFeatureRows::TargetUp4h).boolean().null())
                    .col(
                        ColumnDef::new(MlFeatureRows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MlFeatureRows::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(MlFeatureRows::Symbol)
                            .col(MlFeatureRows::Interval)
                            .col(MlFeatureRows::OpenTime),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ml_feature_rows_interval_time")
                    .table(MlFeatureRows::Table)
                    .col(MlFeatureRows::Interval)
                    .col(MlFeatureRows::OpenTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MlFeatureRows::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MlFeatureRows {
    Table,
    Symbol,
    Interval,
    OpenTime,
    #[sea_orm(iden = "ret_1h")]
    Ret1h,
    #[sea_orm(iden = "ret_4h")]
    Ret4h,
    #[sea_orm(iden = "ret_12h")]
    Ret12h,
    #[sea_orm(iden = "ret_24h")]
    Ret24h,
    #[sea_orm(iden = "volatility_6h")]
    Volatility6h,
    #[sea_orm(iden = "volatility_24h")]
    Volatility24h,
    #[sea_orm(iden = "volume_z_24h")]
    VolumeZ24h,
    #[sea_orm(iden = "rsi_14")]
    Rsi14,
    MacdLine,
    MacdSignal,
    MacdHist,
    BbPos,
    BbWidth,
    #[sea_orm(iden = "target_up_4h")]
    TargetUp4h,
    CreatedAt,
    UpdatedAt,
}

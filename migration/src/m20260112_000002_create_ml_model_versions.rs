use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MlModelVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MlModelVersions::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MlModelVersions::ModelKey).string().not_null())
                    .col(ColumnDef::new(MlModelVersions::Version).integer().not_null())
                    .col(
                        ColumnDef::new(MlModelVersions::FeatureSpecVersion)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::TrainedFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::TrainedTo)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::TrainedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::HyperparamsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::MetricsJson)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::ArtifactFormat)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::ArtifactBlob)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::ActivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MlModelVersions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("uq_ml_model_versions_key_version")
                            .col(MlModelVersions::ModelKey)
                            .col(MlModelVersions::Version)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one active version per model key. Partial unique indexes
        // are not expressible through sea-query, hence raw SQL.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_ml_model_versions_active \
                 ON ml_model_versions (model_key) WHERE is_active",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MlModelVersions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MlModelVersions {
    Table,
    Id,
    ModelKey,
    Version,
    FeatureSpecVersion,
    TrainedFrom,
    TrainedTo,
    TrainedAt,
    HyperparamsJson,
    MetricsJson,
    ArtifactFormat,
    ArtifactBlob,
    IsActive,
    ActivatedAt,
    CreatedAt,
}

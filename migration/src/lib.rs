pub use sea_orm_migration::prelude::*;

mod m20260110_000001_create_candles_and_signals;
mod m20260112_000001_create_ml_feature_rows;
mod m20260112_000002_create_ml_model_versions;
mod m20260112_000003_create_ml_predictions;
mod m20260120_000001_create_market_intel_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260110_000001_create_candles_and_signals::Migration),
            Box::new(m20260112_000001_create_ml_feature_rows::Migration),
            Box::new(m20260112_000002_create_ml_model_versions::Migration),
            Box::new(m20260112_000003_create_ml_predictions::Migration),
            Box::new(m20260120_000001_create_market_intel_tables::Migration),
        ]
    }
}

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_energy_data_points;
mod m20260301_000002_create_backfill_progress;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_energy_data_points::Migration),
            Box::new(m20260301_000002_create_backfill_progress::Migration),
        ]
    }
}

pub use super::backfill_progress::Entity as BackfillProgress;
pub use super::energy_data_points::Entity as EnergyDataPoints;

//! Persistence seams used by collection and backfill
//!
//! The SeaORM implementations live in `data_points` and `backfill_progress`;
//! tests substitute in-memory versions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;

use crate::models::backfill::{BackfillProgress, TimeRange};
use crate::models::data_point::{DataType, NormalizedDataPoint};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("backfill {id} not found")]
    NotFound { id: i64 },

    #[error("stored {field} has invalid value '{value}'")]
    Corrupt { field: &'static str, value: String },
}

/// Sink for normalized points
#[async_trait]
pub trait DataPointStore: Send + Sync {
    /// Idempotent upsert keyed on (timestamp, area_code, data_type,
    /// business_type); returns the number of rows written
    async fn upsert_points(&self, points: &[NormalizedDataPoint]) -> Result<u64, StoreError>;

    /// Distinct stored timestamps in `[start, end)`, ascending
    async fn covered_timestamps(
        &self,
        area_code: &str,
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Persists a new record and returns it with its assigned id
    async fn create(&self, progress: &BackfillProgress) -> Result<BackfillProgress, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<BackfillProgress>, StoreError>;

    /// Conditional write: the row is replaced only while its stored status
    /// can be replaced by `progress.status()` (see
    /// `BackfillStatus::can_be_replaced_by`). Returns false when the stored
    /// status forbids it, e.g. the job was cancelled in the meantime.
    async fn update(&self, progress: &BackfillProgress) -> Result<bool, StoreError>;

    /// Most recent job for exactly this area, endpoint and period
    async fn find_latest(
        &self,
        area_code: &str,
        endpoint_name: &str,
        period: TimeRange,
    ) -> Result<Option<BackfillProgress>, StoreError>;
}

//! SeaORM Entity for backfill_progress table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "backfill_progress")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub area_code: String,
    pub endpoint_name: String,
    pub period_start: DateTimeWithTimeZone,
    pub period_end: DateTimeWithTimeZone,
    /// PENDING, IN_PROGRESS, COMPLETED, FAILED, CANCELLED
    pub status: String,
    pub total_chunks: i32,
    pub completed_chunks: i32,
    pub no_data_chunks: i32,
    pub failed_chunks: i32,
    pub total_data_points: i64,
    pub current_chunk_start: Option<DateTimeWithTimeZone>,
    pub current_chunk_end: Option<DateTimeWithTimeZone>,
    pub rate_limit_delay_ms: i64,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub last_error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

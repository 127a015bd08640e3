//! PostgreSQL store for backfill job state

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::storage::{ProgressStore, StoreError};
use crate::entities::{backfill_progress, prelude::BackfillProgress as BackfillProgressEntity};
use crate::models::backfill::{BackfillProgress, BackfillStatus, TimeRange};

#[derive(Clone)]
pub struct SeaOrmProgressStore {
    db: DatabaseConnection,
}

impl SeaOrmProgressStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: backfill_progress::Model) -> Result<BackfillProgress, StoreError> {
    let status: BackfillStatus = model.status.parse().map_err(|_| StoreError::Corrupt {
        field: "status",
        value: model.status.clone(),
    })?;

    let non_negative = |field: &'static str, value: i64| -> Result<u64, StoreError> {
        u64::try_from(value).map_err(|_| StoreError::Corrupt {
            field,
            value: value.to_string(),
        })
    };

    let period = TimeRange::new(
        model.period_start.with_timezone(&Utc),
        model.period_end.with_timezone(&Utc),
    );
    let mut progress = BackfillProgress::new(
        model.area_code,
        model.endpoint_name,
        period,
        non_negative("rate_limit_delay_ms", model.rate_limit_delay_ms)?,
        model.created_at.with_timezone(&Utc),
    )
    .with_stored_status(status);

    progress.id = model.id;
    progress.total_chunks = non_negative("total_chunks", model.total_chunks as i64)? as u32;
    progress.completed_chunks = non_negative("completed_chunks", model.completed_chunks as i64)? as u32;
    progress.no_data_chunks = non_negative("no_data_chunks", model.no_data_chunks as i64)? as u32;
    progress.failed_chunks = non_negative("failed_chunks", model.failed_chunks as i64)? as u32;
    progress.total_data_points = non_negative("total_data_points", model.total_data_points)?;
    progress.current_chunk_start = model.current_chunk_start.map(|t| t.with_timezone(&Utc));
    progress.current_chunk_end = model.current_chunk_end.map(|t| t.with_timezone(&Utc));
    progress.started_at = model.started_at.map(|t| t.with_timezone(&Utc));
    progress.completed_at = model.completed_at.map(|t| t.with_timezone(&Utc));
    progress.last_error = model.last_error;
    progress.updated_at = model.updated_at.with_timezone(&Utc);
    Ok(progress)
}

/// Every column except the primary key
fn fill(active: &mut backfill_progress::ActiveModel, progress: &BackfillProgress) {
    active.area_code = Set(progress.area_code.clone());
    active.endpoint_name = Set(progress.endpoint_name.clone());
    active.period_start = Set(progress.period_start.fixed_offset());
    active.period_end = Set(progress.period_end.fixed_offset());
    active.status = Set(progress.status().as_str().to_string());
    active.total_chunks = Set(progress.total_chunks as i32);
    active.completed_chunks = Set(progress.completed_chunks as i32);
    active.no_data_chunks = Set(progress.no_data_chunks as i32);
    active.failed_chunks = Set(progress.failed_chunks as i32);
    active.total_data_points = Set(progress.total_data_points as i64);
    active.current_chunk_start = Set(progress.current_chunk_start.map(|t| t.fixed_offset()));
    active.current_chunk_end = Set(progress.current_chunk_end.map(|t| t.fixed_offset()));
    active.rate_limit_delay_ms = Set(progress.rate_limit_delay_ms as i64);
    active.started_at = Set(progress.started_at.map(|t| t.fixed_offset()));
    active.completed_at = Set(progress.completed_at.map(|t| t.fixed_offset()));
    active.last_error = Set(progress.last_error.clone());
    active.created_at = Set(progress.created_at.fixed_offset());
    active.updated_at = Set(progress.updated_at.fixed_offset());
}

#[async_trait]
impl ProgressStore for SeaOrmProgressStore {
    async fn create(&self, progress: &BackfillProgress) -> Result<BackfillProgress, StoreError> {
        let mut active = <backfill_progress::ActiveModel as Default>::default();
        fill(&mut active, progress);

        let model = active.insert(&self.db).await?;
        to_domain(model)
    }

    async fn get(&self, id: i64) -> Result<Option<BackfillProgress>, StoreError> {
        BackfillProgressEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(to_domain)
            .transpose()
    }

    async fn update(&self, progress: &BackfillProgress) -> Result<bool, StoreError> {
        let mut active = <backfill_progress::ActiveModel as Default>::default();
        fill(&mut active, progress);

        let replaceable: Vec<&str> = BackfillStatus::ALL
            .iter()
            .filter(|stored| stored.can_be_replaced_by(progress.status()))
            .map(|stored| stored.as_str())
            .collect();

        let result = BackfillProgressEntity::update_many()
            .set(active)
            .filter(backfill_progress::Column::Id.eq(progress.id))
            .filter(backfill_progress::Column::Status.is_in(replaceable))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            return Ok(true);
        }

        // Nothing matched: either the row is gone or its status forbids the write
        match BackfillProgressEntity::find_by_id(progress.id).one(&self.db).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound { id: progress.id }),
        }
    }

    async fn find_latest(
        &self,
        area_code: &str,
        endpoint_name: &str,
        period: TimeRange,
    ) -> Result<Option<BackfillProgress>, StoreError> {
        BackfillProgressEntity::find()
            .filter(backfill_progress::Column::AreaCode.eq(area_code))
            .filter(backfill_progress::Column::EndpointName.eq(endpoint_name))
            .filter(backfill_progress::Column::PeriodStart.eq(period.start.fixed_offset()))
            .filter(backfill_progress::Column::PeriodEnd.eq(period.end.fixed_offset()))
            .order_by_desc(backfill_progress::Column::Id)
            .one(&self.db)
            .await?
            .map(to_domain)
            .transpose()
    }
}

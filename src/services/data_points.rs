//! PostgreSQL data sink for normalized points

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::processor::dedupe_by_natural_key;
use super::storage::{DataPointStore, StoreError};
use crate::entities::{energy_data_points, prelude::EnergyDataPoints};
use crate::models::data_point::{DataType, NormalizedDataPoint};

const UPSERT_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct SeaOrmDataPointStore {
    db: DatabaseConnection,
}

impl SeaOrmDataPointStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active_model(point: &NormalizedDataPoint, now: DateTime<Utc>) -> energy_data_points::ActiveModel {
    energy_data_points::ActiveModel {
        timestamp: Set(point.timestamp.fixed_offset()),
        area_code: Set(point.area_code.clone()),
        data_type: Set(point.data_type.as_str().to_string()),
        business_type: Set(point.business_type.clone()),
        value: Set(point.value),
        unit: Set(point.unit.clone()),
        document_mrid: Set(point.document_mrid.clone()),
        revision_number: Set(point.revision_number as i32),
        time_series_mrid: Set(point.time_series_mrid.clone()),
        resolution: Set(point.resolution.clone()),
        position: Set(point.position as i32),
        period_start: Set(point.period_start.fixed_offset()),
        period_end: Set(point.period_end.fixed_offset()),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
        ..Default::default()
    }
}

#[async_trait]
impl DataPointStore for SeaOrmDataPointStore {
    async fn upsert_points(&self, points: &[NormalizedDataPoint]) -> Result<u64, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        // Postgres rejects a batch that touches the same conflict key twice
        let unique = dedupe_by_natural_key(points.to_vec());
        let now = Utc::now();
        let mut written = 0u64;

        for batch in unique.chunks(UPSERT_BATCH_SIZE) {
            let models = batch.iter().map(|p| to_active_model(p, now));

            EnergyDataPoints::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        energy_data_points::Column::Timestamp,
                        energy_data_points::Column::AreaCode,
                        energy_data_points::Column::DataType,
                        energy_data_points::Column::BusinessType,
                    ])
                    .update_columns([
                        energy_data_points::Column::Value,
                        energy_data_points::Column::Unit,
                        energy_data_points::Column::DocumentMrid,
                        energy_data_points::Column::RevisionNumber,
                        energy_data_points::Column::TimeSeriesMrid,
                        energy_data_points::Column::Resolution,
                        energy_data_points::Column::Position,
                        energy_data_points::Column::PeriodStart,
                        energy_data_points::Column::PeriodEnd,
                        energy_data_points::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?;

            written += batch.len() as u64;
        }

        tracing::debug!(points = written, "Upserted energy data points");
        Ok(written)
    }

    async fn covered_timestamps(
        &self,
        area_code: &str,
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows: Vec<sea_orm::prelude::DateTimeWithTimeZone> = EnergyDataPoints::find()
            .select_only()
            .column(energy_data_points::Column::Timestamp)
            .distinct()
            .filter(energy_data_points::Column::AreaCode.eq(area_code))
            .filter(energy_data_points::Column::DataType.eq(data_type.as_str()))
            .filter(energy_data_points::Column::Timestamp.gte(start.fixed_offset()))
            .filter(energy_data_points::Column::Timestamp.lt(end.fixed_offset()))
            .order_by_asc(energy_data_points::Column::Timestamp)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|ts| ts.with_timezone(&Utc)).collect())
    }
}

//! SeaORM Entity for normalized ENTSO-E time-series values

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "energy_data_points")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Start of the interval the value applies to
    pub timestamp: DateTimeWithTimeZone,
    /// Short area code, or `FROM->TO` for flows
    pub area_code: String,
    /// e.g. 'actual_load', 'day_ahead_price'
    pub data_type: String,
    pub business_type: String,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub value: Decimal,
    pub unit: String,
    pub document_mrid: String,
    pub revision_number: i32,
    pub time_series_mrid: String,
    pub resolution: String,
    pub position: i32,
    pub period_start: DateTimeWithTimeZone,
    pub period_end: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic meaning of a stored value, one per endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    ActualLoad,
    DayAheadLoadForecast,
    WeekAheadLoadForecast,
    MonthAheadLoadForecast,
    YearAheadLoadForecast,
    YearAheadForecastMargin,
    DayAheadPrice,
    PhysicalFlow,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::ActualLoad => "actual_load",
            DataType::DayAheadLoadForecast => "day_ahead_load_forecast",
            DataType::WeekAheadLoadForecast => "week_ahead_load_forecast",
            DataType::MonthAheadLoadForecast => "month_ahead_load_forecast",
            DataType::YearAheadLoadForecast => "year_ahead_load_forecast",
            DataType::YearAheadForecastMargin => "year_ahead_forecast_margin",
            DataType::DayAheadPrice => "day_ahead_price",
            DataType::PhysicalFlow => "physical_flow",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actual_load" => Ok(DataType::ActualLoad),
            "day_ahead_load_forecast" => Ok(DataType::DayAheadLoadForecast),
            "week_ahead_load_forecast" => Ok(DataType::WeekAheadLoadForecast),
            "month_ahead_load_forecast" => Ok(DataType::MonthAheadLoadForecast),
            "year_ahead_load_forecast" => Ok(DataType::YearAheadLoadForecast),
            "year_ahead_forecast_margin" => Ok(DataType::YearAheadForecastMargin),
            "day_ahead_price" => Ok(DataType::DayAheadPrice),
            "physical_flow" => Ok(DataType::PhysicalFlow),
            other => Err(format!("unknown data type '{}'", other)),
        }
    }
}

/// Unique key used for idempotent upsert
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub timestamp: DateTime<Utc>,
    pub area_code: String,
    pub data_type: DataType,
    pub business_type: String,
}

/// One absolute-timestamped value with provenance back to the source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataPoint {
    pub timestamp: DateTime<Utc>,
    pub area_code: String,
    pub data_type: DataType,
    pub business_type: String,
    pub value: Decimal,
    pub unit: String,
    pub document_mrid: String,
    pub revision_number: u32,
    pub time_series_mrid: String,
    pub resolution: String,
    pub position: u32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl NormalizedDataPoint {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            timestamp: self.timestamp,
            area_code: self.area_code.clone(),
            data_type: self.data_type,
            business_type: self.business_type.clone(),
        }
    }
}

//! Expands parsed time series into absolute-timestamped data points

use chrono::{DateTime, Duration, Months, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::models::data_point::{NaturalKey, NormalizedDataPoint};
use crate::models::documents::Period;
use crate::services::entsoe::{DataTarget, MarketDocument};

lazy_static! {
    static ref DATE_PART: Regex =
        Regex::new(r"^(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?$").unwrap();
    static ref TIME_PART: Regex = Regex::new(r"^(?:(\d+)H)?(?:(\d+)M)?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    #[error("invalid resolution '{resolution}'")]
    InvalidResolution { resolution: String },

    #[error("resolution '{resolution}' has no non-zero component")]
    ZeroResolution { resolution: String },

    #[error("invalid position {position} for resolution '{resolution}' (positions start at 1)")]
    InvalidPosition { resolution: String, position: u32 },

    #[error("timestamp overflow at position {position} for resolution '{resolution}'")]
    TimestampOverflow { resolution: String, position: u32 },
}

/// ISO-8601 duration limited to the components the platform emits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionDuration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl ResolutionDuration {
    pub fn parse(resolution: &str) -> Result<Self, ProcessingError> {
        let invalid = || ProcessingError::InvalidResolution {
            resolution: resolution.to_string(),
        };

        let body = resolution.trim().strip_prefix('P').ok_or_else(invalid)?;
        let (date, time) = match body.split_once('T') {
            Some((date, time)) if !time.is_empty() => (date, Some(time)),
            Some(_) => return Err(invalid()),
            None => (body, None),
        };

        let date_caps = DATE_PART.captures(date).ok_or_else(invalid)?;
        let component = |caps: &regex::Captures<'_>, idx: usize| -> Result<u32, ProcessingError> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid()))
                .transpose()
                .map(|v| v.unwrap_or(0))
        };

        let weeks = component(&date_caps, 3)?;
        let mut parsed = ResolutionDuration {
            years: component(&date_caps, 1)?,
            months: component(&date_caps, 2)?,
            days: component(&date_caps, 4)?
                .checked_add(weeks.checked_mul(7).ok_or_else(invalid)?)
                .ok_or_else(invalid)?,
            ..Default::default()
        };

        if let Some(time) = time {
            let time_caps = TIME_PART.captures(time).ok_or_else(invalid)?;
            parsed.hours = component(&time_caps, 1)?;
            parsed.minutes = component(&time_caps, 2)?;
        }

        if parsed == ResolutionDuration::default() {
            return Err(ProcessingError::ZeroResolution {
                resolution: resolution.to_string(),
            });
        }

        Ok(parsed)
    }

    /// Month-based components need calendar arithmetic
    pub fn is_calendar_relative(&self) -> bool {
        self.years > 0 || self.months > 0
    }

    fn total_months(&self) -> u64 {
        self.years as u64 * 12 + self.months as u64
    }

    fn fixed_part(&self) -> Duration {
        Duration::days(self.days as i64)
            + Duration::hours(self.hours as i64)
            + Duration::minutes(self.minutes as i64)
    }
}

/// Timestamp of the point at 1-based `position` within a period
pub fn derive_timestamp(
    period_start: DateTime<Utc>,
    resolution: &str,
    position: u32,
) -> Result<DateTime<Utc>, ProcessingError> {
    let duration = ResolutionDuration::parse(resolution)?;
    derive_with(period_start, &duration, resolution, position)
}

fn derive_with(
    period_start: DateTime<Utc>,
    duration: &ResolutionDuration,
    resolution: &str,
    position: u32,
) -> Result<DateTime<Utc>, ProcessingError> {
    if position < 1 {
        return Err(ProcessingError::InvalidPosition {
            resolution: resolution.to_string(),
            position,
        });
    }

    let overflow = || ProcessingError::TimestampOverflow {
        resolution: resolution.to_string(),
        position,
    };
    let offset = (position - 1) as i64;

    let mut timestamp = period_start;

    if duration.is_calendar_relative() {
        let months = duration
            .total_months()
            .checked_mul(offset as u64)
            .and_then(|m| u32::try_from(m).ok())
            .ok_or_else(overflow)?;
        timestamp = timestamp
            .checked_add_months(Months::new(months))
            .ok_or_else(overflow)?;
    }

    let step = duration.fixed_part();
    if !step.is_zero() {
        let advance = step
            .num_minutes()
            .checked_mul(offset)
            .and_then(Duration::try_minutes)
            .ok_or_else(overflow)?;
        timestamp = timestamp.checked_add_signed(advance).ok_or_else(overflow)?;
    }

    Ok(timestamp)
}

/// Collapses duplicate natural keys, keeping the last value at the position
/// of the first occurrence
pub fn dedupe_by_natural_key(points: Vec<NormalizedDataPoint>) -> Vec<NormalizedDataPoint> {
    let mut index: HashMap<NaturalKey, usize> = HashMap::with_capacity(points.len());
    let mut unique: Vec<NormalizedDataPoint> = Vec::with_capacity(points.len());

    for point in points {
        match index.get(&point.natural_key()) {
            Some(&idx) => unique[idx] = point,
            None => {
                index.insert(point.natural_key(), unique.len());
                unique.push(point);
            }
        }
    }

    unique
}

/// Per-series fields shared by every point of a period
struct SeriesContext<'a> {
    document_mrid: &'a str,
    revision_number: u32,
    time_series_mrid: &'a str,
    business_type: &'static str,
    unit: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntsoeDataProcessor;

impl EntsoeDataProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(
        &self,
        target: &DataTarget,
        document: &MarketDocument,
    ) -> Result<Vec<NormalizedDataPoint>, ProcessingError> {
        let area_code = target.area_key();
        let mut points = Vec::new();

        match document {
            MarketDocument::Load(doc) => {
                for series in &doc.time_series {
                    let ctx = SeriesContext {
                        document_mrid: &doc.mrid,
                        revision_number: doc.revision_number,
                        time_series_mrid: &series.mrid,
                        business_type: series.business_type.code(),
                        unit: series.quantity_unit.clone(),
                    };
                    for period in &series.periods {
                        self.expand_period(target, &area_code, &ctx, period, &mut points)?;
                    }
                }
            }
            MarketDocument::Publication(doc) => {
                for series in &doc.time_series {
                    let ctx = SeriesContext {
                        document_mrid: &doc.mrid,
                        revision_number: doc.revision_number,
                        time_series_mrid: &series.mrid,
                        business_type: series.business_type.code(),
                        unit: series.unit(),
                    };
                    for period in &series.periods {
                        self.expand_period(target, &area_code, &ctx, period, &mut points)?;
                    }
                }
            }
        }

        let total = points.len();
        let points = dedupe_by_natural_key(points);
        if points.len() < total {
            tracing::debug!(
                data_target = %target,
                duplicates = total - points.len(),
                "Collapsed duplicate data points"
            );
        }

        Ok(points)
    }

    fn expand_period(
        &self,
        target: &DataTarget,
        area_code: &str,
        ctx: &SeriesContext<'_>,
        period: &Period,
        out: &mut Vec<NormalizedDataPoint>,
    ) -> Result<(), ProcessingError> {
        let duration = ResolutionDuration::parse(&period.resolution)?;

        for point in &period.points {
            let Some(value) = point.value() else {
                tracing::warn!(
                    data_target = %target,
                    time_series = ctx.time_series_mrid,
                    position = point.position,
                    "Point without quantity or price, skipping"
                );
                continue;
            };

            let timestamp = derive_with(
                period.time_interval.start,
                &duration,
                &period.resolution,
                point.position,
            )?;

            out.push(NormalizedDataPoint {
                timestamp,
                area_code: area_code.to_string(),
                data_type: target.endpoint.data_type(),
                business_type: ctx.business_type.to_string(),
                value,
                unit: ctx.unit.clone(),
                document_mrid: ctx.document_mrid.to_string(),
                revision_number: ctx.revision_number,
                time_series_mrid: ctx.time_series_mrid.to_string(),
                resolution: period.resolution.clone(),
                position: point.position,
                period_start: period.time_interval.start,
                period_end: period.time_interval.end,
            });
        }

        Ok(())
    }
}

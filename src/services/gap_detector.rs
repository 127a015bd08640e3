//! Coverage analysis over stored timestamps

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::entsoe::DataTarget;
use super::storage::{DataPointStore, StoreError};
use crate::models::backfill::{CoverageGap, TimeRange};

/// Sub-intervals of `requested` not covered by any `[ts, ts + slot)`
pub fn find_missing_ranges(
    requested: TimeRange,
    covered: &[DateTime<Utc>],
    slot: Duration,
) -> Vec<TimeRange> {
    if requested.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<DateTime<Utc>> = covered.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut missing = Vec::new();
    let mut cursor = requested.start;

    for ts in sorted {
        let slot_end = ts + slot;
        if slot_end <= requested.start || ts >= requested.end {
            continue;
        }
        if ts > cursor {
            missing.push(TimeRange::new(cursor, ts));
        }
        if slot_end > cursor {
            cursor = slot_end;
        }
        if cursor >= requested.end {
            break;
        }
    }

    if cursor < requested.end {
        missing.push(TimeRange::new(cursor, requested.end));
    }

    missing
}

/// Covered share of `requested` in percent, two decimals
pub fn coverage_percentage(requested: TimeRange, missing: &[TimeRange]) -> Decimal {
    let total = requested.duration().num_seconds();
    if total <= 0 {
        return Decimal::ONE_HUNDRED.round_dp(2);
    }

    let missing_secs: i64 = missing.iter().map(|r| r.duration().num_seconds()).sum();
    let covered = (total - missing_secs).max(0);

    (Decimal::from(covered) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
}

/// Splits every gap into consecutive chunks of at most `max_chunk`
pub fn plan_chunks(missing: &[TimeRange], max_chunk: Duration) -> Vec<TimeRange> {
    missing.iter().flat_map(|gap| gap.split(max_chunk)).collect()
}

#[derive(Clone)]
pub struct GapDetector {
    store: Arc<dyn DataPointStore>,
}

impl GapDetector {
    pub fn new(store: Arc<dyn DataPointStore>) -> Self {
        Self { store }
    }

    pub async fn detect(
        &self,
        target: &DataTarget,
        requested: TimeRange,
    ) -> Result<CoverageGap, StoreError> {
        let area_code = target.area_key();
        let slot = target.endpoint.nominal_resolution();

        // A point stamped before the range still covers it for one slot
        let covered = self
            .store
            .covered_timestamps(
                &area_code,
                target.endpoint.data_type(),
                requested.start - slot,
                requested.end,
            )
            .await?;

        let missing = find_missing_ranges(requested, &covered, slot);
        let coverage = coverage_percentage(requested, &missing);

        tracing::debug!(
            area = %area_code,
            endpoint = target.endpoint.name(),
            stored = covered.len(),
            gaps = missing.len(),
            coverage = %coverage,
            "Coverage analysed"
        );

        Ok(CoverageGap {
            area_code,
            endpoint_name: target.endpoint.name().to_string(),
            requested,
            missing,
            coverage_percentage: coverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    #[test]
    fn test_empty_store_is_one_gap() {
        let requested = TimeRange::new(hour(0), hour(24));
        let missing = find_missing_ranges(requested, &[], Duration::hours(1));
        assert_eq!(missing, vec![requested]);
        assert_eq!(coverage_percentage(requested, &missing), dec!(0.00));
    }

    #[test]
    fn test_full_coverage_has_no_gaps() {
        let requested = TimeRange::new(hour(0), hour(24));
        let covered: Vec<_> = (0..24).map(hour).collect();
        let missing = find_missing_ranges(requested, &covered, Duration::hours(1));
        assert!(missing.is_empty());
        assert_eq!(coverage_percentage(requested, &missing), dec!(100.00));
    }

    #[test]
    fn test_holes_are_reported_in_order() {
        let requested = TimeRange::new(hour(0), hour(10));
        let covered = vec![hour(7), hour(0), hour(1), hour(2), hour(5)];
        let missing = find_missing_ranges(requested, &covered, Duration::hours(1));

        assert_eq!(
            missing,
            vec![
                TimeRange::new(hour(3), hour(5)),
                TimeRange::new(hour(6), hour(7)),
                TimeRange::new(hour(8), hour(10)),
            ]
        );
        assert_eq!(coverage_percentage(requested, &missing), dec!(50.00));
    }

    #[test]
    fn test_sub_slot_points_cover_their_slot() {
        let requested = TimeRange::new(hour(0), hour(2));
        let covered = vec![hour(0) + Duration::minutes(45)];
        let missing = find_missing_ranges(requested, &covered, Duration::hours(1));
        assert_eq!(
            missing,
            vec![
                TimeRange::new(hour(0), hour(0) + Duration::minutes(45)),
                TimeRange::new(hour(1) + Duration::minutes(45), hour(2)),
            ]
        );
    }

    #[test]
    fn test_plan_chunks_bounds_length() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let gaps = vec![
            TimeRange::new(start, start + Duration::days(65)),
            TimeRange::new(start + Duration::days(100), start + Duration::days(110)),
        ];

        let chunks = plan_chunks(&gaps, Duration::days(30));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], TimeRange::new(start, start + Duration::days(30)));
        assert_eq!(
            chunks[2],
            TimeRange::new(start + Duration::days(60), start + Duration::days(65))
        );
        assert!(chunks.iter().all(|c| c.duration() <= Duration::days(30)));
    }
}

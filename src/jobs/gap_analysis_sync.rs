//! Gap Analysis Job
//!
//! Checks stored coverage for every configured target over a lookback window
//! and backfills each target with gaps. Targets are handled one at a time so
//! backfills share the upstream rate limit. The window only moves at midnight,
//! so repeated ticks resume or skip the day's job for a target rather than
//! creating another one.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use std::time::Instant;
use tokio::time::{Duration as TokioDuration, interval};
use tracing::{error, info, warn};

use crate::models::backfill::TimeRange;
use crate::services::backfill::{BackfillService, GapBackfill};
use crate::services::entsoe::DataTarget;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapAnalysisSummary {
    pub success: bool,
    pub targets_analyzed: usize,
    pub targets_with_gaps: usize,
    pub backfills_started: usize,
    pub backfills_resumed: usize,
    pub backfills_skipped: usize,
    pub backfills_completed: usize,
    pub backfills_failed: usize,
    pub data_points: u64,
    pub duration_ms: u64,
    pub failure_reasons: Vec<String>,
}

/// `[midnight - lookback_days, midnight)` of the current UTC day
///
/// Today is left to real-time collection.
pub fn analysis_window(now: DateTime<Utc>, lookback_days: i64) -> TimeRange {
    let midnight = now.duration_trunc(Duration::days(1)).unwrap_or(now);
    TimeRange::new(midnight - Duration::days(lookback_days.max(1)), midnight)
}

pub async fn run_gap_analysis(
    service: &BackfillService,
    targets: &[DataTarget],
    window: TimeRange,
) -> GapAnalysisSummary {
    let started = Instant::now();
    let mut summary = GapAnalysisSummary::default();

    for target in targets {
        let gap = match service.analyze_gaps(target, window).await {
            Ok(gap) => gap,
            Err(e) => {
                warn!(data_target = %target, error = %e, "Gap analysis failed");
                summary.failure_reasons.push(format!("{}: {}", target, e));
                continue;
            }
        };
        summary.targets_analyzed += 1;

        if !gap.has_gaps() {
            continue;
        }
        summary.targets_with_gaps += 1;

        info!(
            data_target = %target,
            gaps = gap.missing.len(),
            coverage = %gap.coverage_percentage,
            "Gaps found"
        );

        let result = match service.backfill_gaps(target, window).await {
            Ok(GapBackfill::Started(result)) => {
                summary.backfills_started += 1;
                Ok(result)
            }
            Ok(GapBackfill::Resumed(result)) => {
                summary.backfills_resumed += 1;
                Ok(result)
            }
            Ok(GapBackfill::Skipped { .. }) => {
                summary.backfills_skipped += 1;
                continue;
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(result) => {
                summary.data_points += result.total_data_points;
                if result.success {
                    summary.backfills_completed += 1;
                } else {
                    summary.backfills_failed += 1;
                    summary.failure_reasons.extend(result.failure_reasons);
                }
            }
            Err(e) => {
                error!(data_target = %target, error = %e, "Backfill aborted");
                summary.backfills_failed += 1;
                summary.failure_reasons.push(format!("{}: {}", target, e));
            }
        }
    }

    summary.success = summary.failure_reasons.is_empty();
    summary.duration_ms = started.elapsed().as_millis() as u64;
    summary
}

/// Start the gap analysis job
pub async fn start_gap_analysis_job(
    service: BackfillService,
    targets: Vec<DataTarget>,
    interval_secs: u64,
    lookback_days: i64,
) {
    tokio::spawn(async move {
        info!(
            targets = targets.len(),
            interval_secs = interval_secs,
            lookback_days = lookback_days,
            "Gap analysis job started"
        );

        let mut interval = interval(TokioDuration::from_secs(interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping gap analysis job");
                    break;
                }
                _ = interval.tick() => {
                    let window = analysis_window(Utc::now(), lookback_days);
                    let summary = run_gap_analysis(&service, &targets, window).await;

                    info!(
                        success = summary.success,
                        analyzed = summary.targets_analyzed,
                        with_gaps = summary.targets_with_gaps,
                        backfills_resumed = summary.backfills_resumed,
                        backfills_skipped = summary.backfills_skipped,
                        backfills_completed = summary.backfills_completed,
                        backfills_failed = summary.backfills_failed,
                        data_points = summary.data_points,
                        duration_ms = summary.duration_ms,
                        "Gap analysis completed"
                    );
                }
            }
        }

        info!("Gap analysis job stopped");
    });
}

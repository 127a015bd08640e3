//! Real-time Collection Job
//!
//! Periodically fetches a short window around now for every configured
//! (endpoint, area) target and upserts the normalized points.
//! Supports graceful shutdown via SIGINT.

use chrono::{DateTime, Duration, DurationRound, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration as TokioDuration, interval};
use tracing::{error, info, warn};

use crate::models::backfill::TimeRange;
use crate::services::entsoe::{DataTarget, EntsoeClient, FetchOutcome};
use crate::services::processor::EntsoeDataProcessor;
use crate::services::storage::DataPointStore;

/// Hours of history re-fetched on every tick, picks up late revisions
const LOOKBACK_HOURS: i64 = 24;

/// Hours ahead, covers day-ahead forecasts and prices for tomorrow
const LOOKAHEAD_HOURS: i64 = 48;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub success: bool,
    pub targets: usize,
    pub succeeded: usize,
    pub no_data: usize,
    pub failed: usize,
    pub data_points: u64,
    pub duration_ms: u64,
    pub failure_reasons: Vec<String>,
}

enum TargetOutcome {
    Stored(u64),
    NoData,
    Failed(String),
}

/// Hour-aligned window `[now - 24h, now + 48h)`
pub fn collection_window(now: DateTime<Utc>) -> TimeRange {
    let anchor = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    TimeRange::new(
        anchor - Duration::hours(LOOKBACK_HOURS),
        anchor + Duration::hours(LOOKAHEAD_HOURS),
    )
}

async fn collect_target(
    client: &EntsoeClient,
    processor: &EntsoeDataProcessor,
    points: &dyn DataPointStore,
    target: &DataTarget,
    window: TimeRange,
) -> TargetOutcome {
    let document = match client.fetch_target(target, window.start, window.end).await {
        Ok(FetchOutcome::Data(document)) => document,
        Ok(FetchOutcome::NoData) => return TargetOutcome::NoData,
        Ok(FetchOutcome::Rejected(reason)) => {
            return TargetOutcome::Failed(format!("{}: {}", target, reason));
        }
        Err(e) => return TargetOutcome::Failed(format!("{}: {}", target, e)),
    };

    let normalized = match processor.process(target, &document) {
        Ok(normalized) => normalized,
        Err(e) => return TargetOutcome::Failed(format!("{}: {}", target, e)),
    };

    match points.upsert_points(&normalized).await {
        Ok(written) => TargetOutcome::Stored(written),
        Err(e) => TargetOutcome::Failed(format!("{}: {}", target, e)),
    }
}

/// Collects every target concurrently; never fails as a whole
pub async fn run_realtime_collection(
    client: &EntsoeClient,
    points: &dyn DataPointStore,
    targets: &[DataTarget],
    window: TimeRange,
) -> CollectionSummary {
    let started = Instant::now();
    let processor = EntsoeDataProcessor::new();

    let outcomes = join_all(
        targets
            .iter()
            .map(|target| collect_target(client, &processor, points, target, window)),
    )
    .await;

    let mut summary = CollectionSummary {
        targets: targets.len(),
        ..Default::default()
    };

    for outcome in outcomes {
        match outcome {
            TargetOutcome::Stored(count) => {
                summary.succeeded += 1;
                summary.data_points += count;
            }
            TargetOutcome::NoData => summary.no_data += 1,
            TargetOutcome::Failed(reason) => {
                warn!(reason = %reason, "Collection target failed");
                summary.failed += 1;
                summary.failure_reasons.push(reason);
            }
        }
    }

    summary.success = summary.failed == 0;
    summary.duration_ms = started.elapsed().as_millis() as u64;
    summary
}

/// Start the real-time collection job
///
/// Spawns a background task that runs one collection per `interval_secs`
/// until ctrl-c.
pub async fn start_realtime_collection_job(
    client: EntsoeClient,
    points: Arc<dyn DataPointStore>,
    targets: Vec<DataTarget>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        info!(
            targets = targets.len(),
            interval_secs = interval_secs,
            "Real-time collection job started"
        );

        let mut interval = interval(TokioDuration::from_secs(interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping real-time collection job");
                    break;
                }
                _ = interval.tick() => {
                    let window = collection_window(Utc::now());
                    let summary = run_realtime_collection(&client, points.as_ref(), &targets, window).await;

                    if summary.success {
                        info!(
                            targets = summary.targets,
                            succeeded = summary.succeeded,
                            no_data = summary.no_data,
                            data_points = summary.data_points,
                            duration_ms = summary.duration_ms,
                            "Real-time collection completed"
                        );
                    } else {
                        error!(
                            targets = summary.targets,
                            failed = summary.failed,
                            data_points = summary.data_points,
                            duration_ms = summary.duration_ms,
                            "Real-time collection completed with failures"
                        );
                    }
                }
            }
        }

        info!("Real-time collection job stopped");
    });
}

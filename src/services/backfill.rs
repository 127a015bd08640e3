//! Chunked, resumable backfill of historical ENTSO-E data
//!
//! A job covers one (area, endpoint) pair over a fixed period. Each run
//! recomputes the coverage gaps of that period from stored data, splits them
//! into chunks and fetches the chunks one at a time, persisting progress after
//! every chunk. Chunk failures are recorded and the run moves on; only a
//! persistence failure aborts the job.
//!
//! Progress writes are conditional on the stored status, so a cancellation
//! written by another process is never overwritten by the runner.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::entsoe::{
    ClientError, DataTarget, Endpoint, EntsoeClient, FetchOutcome, RequestValidationError,
};
use super::gap_detector::{GapDetector, plan_chunks};
use super::processor::{EntsoeDataProcessor, ProcessingError};
use super::storage::{DataPointStore, ProgressStore, StoreError};
use crate::models::backfill::{
    BackfillProgress, BackfillStatus, BackfillSummary, CoverageGap, InvalidTransition, TimeRange,
};

/// Upper bound for a single chunk request
const MAX_CHUNK_DAYS: i64 = 365;

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] RequestValidationError),

    #[error("backfill {id} not found")]
    NotFound { id: i64 },

    #[error("backfill {id} cannot be resumed from status {status}")]
    NotResumable { id: i64, status: BackfillStatus },

    #[error("backfill {id} was moved to {status} by another writer")]
    Superseded { id: i64, status: BackfillStatus },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Pause between consecutive chunk requests
    pub rate_limit_delay_ms: u64,
    /// Overrides the endpoint default chunk length
    pub chunk_days: Option<i64>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: 1000,
            chunk_days: None,
        }
    }
}

enum ChunkResult {
    Stored(u64),
    /// Acknowledgement without data, or a document without points
    NoData,
}

enum ChunkFailure {
    /// Fetch, rejection or processing problem; recorded on the job
    Chunk(String),
    /// Data sink failure; aborts the job
    Sink(StoreError),
}

impl From<ClientError> for ChunkFailure {
    fn from(e: ClientError) -> Self {
        ChunkFailure::Chunk(e.to_string())
    }
}

impl From<ProcessingError> for ChunkFailure {
    fn from(e: ProcessingError) -> Self {
        ChunkFailure::Chunk(e.to_string())
    }
}

/// What `backfill_gaps` did for one target
#[derive(Debug, Clone, PartialEq)]
pub enum GapBackfill {
    Started(BackfillSummary),
    Resumed(BackfillSummary),
    /// An earlier job for the same period already ended (or is running);
    /// gaps left behind by a finished job are ranges without upstream data
    Skipped { backfill_id: i64, status: BackfillStatus },
}

#[derive(Clone)]
pub struct BackfillService {
    client: EntsoeClient,
    processor: EntsoeDataProcessor,
    points: Arc<dyn DataPointStore>,
    progress: Arc<dyn ProgressStore>,
    gaps: GapDetector,
    config: BackfillConfig,
}

impl BackfillService {
    pub fn new(
        client: EntsoeClient,
        points: Arc<dyn DataPointStore>,
        progress: Arc<dyn ProgressStore>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            client,
            processor: EntsoeDataProcessor::new(),
            gaps: GapDetector::new(points.clone()),
            points,
            progress,
            config,
        }
    }

    pub fn chunk_length(&self, endpoint: Endpoint) -> Duration {
        let days = self
            .config
            .chunk_days
            .unwrap_or_else(|| endpoint.default_chunk_days())
            .clamp(1, MAX_CHUNK_DAYS);
        Duration::days(days)
    }

    pub async fn analyze_gaps(
        &self,
        target: &DataTarget,
        range: TimeRange,
    ) -> Result<CoverageGap, BackfillError> {
        validate_range(target, range)?;
        Ok(self.gaps.detect(target, range).await?)
    }

    /// Persists a PENDING job without running it
    pub async fn create_backfill(
        &self,
        target: &DataTarget,
        range: TimeRange,
    ) -> Result<BackfillProgress, BackfillError> {
        validate_range(target, range)?;

        let progress = BackfillProgress::new(
            target.area_key(),
            target.endpoint.name(),
            range,
            self.config.rate_limit_delay_ms,
            Utc::now(),
        );
        let created = self.progress.create(&progress).await?;

        info!(
            backfill_id = created.id,
            area = %created.area_code,
            endpoint = %created.endpoint_name,
            period = %range,
            "Backfill created"
        );
        Ok(created)
    }

    pub async fn start_backfill(
        &self,
        target: &DataTarget,
        range: TimeRange,
    ) -> Result<BackfillSummary, BackfillError> {
        let created = self.create_backfill(target, range).await?;
        self.run_backfill(created.id).await
    }

    /// Backfills `range` for a scheduler tick, reusing the latest job for the
    /// same target and period instead of stacking up new ones
    pub async fn backfill_gaps(
        &self,
        target: &DataTarget,
        range: TimeRange,
    ) -> Result<GapBackfill, BackfillError> {
        let existing = self
            .progress
            .find_latest(&target.area_key(), target.endpoint.name(), range)
            .await?;

        match existing {
            Some(job) if is_runnable(&job) => {
                info!(backfill_id = job.id, data_target = %target, "Resuming earlier backfill");
                Ok(GapBackfill::Resumed(self.run_backfill(job.id).await?))
            }
            // Failed before anything completed; not resumable, start over
            Some(job) if job.status() == BackfillStatus::Failed => {
                Ok(GapBackfill::Started(self.start_backfill(target, range).await?))
            }
            Some(job) => {
                debug!(
                    backfill_id = job.id,
                    data_target = %target,
                    status = %job.status(),
                    "Earlier backfill covers this period, skipping"
                );
                Ok(GapBackfill::Skipped {
                    backfill_id: job.id,
                    status: job.status(),
                })
            }
            None => Ok(GapBackfill::Started(self.start_backfill(target, range).await?)),
        }
    }

    /// Resumes a failed job (or runs a pending one)
    pub async fn resume_backfill(&self, id: i64) -> Result<BackfillSummary, BackfillError> {
        let progress = self.load(id).await?;
        if !is_runnable(&progress) {
            return Err(BackfillError::NotResumable {
                id,
                status: progress.status(),
            });
        }
        info!(backfill_id = id, completed = progress.completed_chunks, "Resuming backfill");
        self.run_backfill(id).await
    }

    pub async fn cancel_backfill(&self, id: i64) -> Result<BackfillProgress, BackfillError> {
        let mut progress = self.load(id).await?;
        let from = progress.status();
        progress.cancel(Utc::now())?;

        if !self.progress.update(&progress).await? {
            // The job finished between our read and write
            let stored = self.load(id).await?;
            return Err(InvalidTransition {
                id,
                from: stored.status(),
                to: BackfillStatus::Cancelled,
            }
            .into());
        }

        info!(backfill_id = id, from = %from, "Backfill cancelled");
        Ok(progress)
    }

    pub async fn run_backfill(&self, id: i64) -> Result<BackfillSummary, BackfillError> {
        let started = Instant::now();
        let mut progress = self.load(id).await?;

        if !is_runnable(&progress) {
            return Err(BackfillError::NotResumable {
                id,
                status: progress.status(),
            });
        }

        let endpoint: Endpoint = progress.endpoint_name.parse()?;
        let target = DataTarget::new(endpoint, &progress.area_code)?;

        let gap = self.gaps.detect(&target, progress.period()).await?;
        let chunks = plan_chunks(&gap.missing, self.chunk_length(endpoint));

        let now = Utc::now();
        if progress.status() == BackfillStatus::Pending && progress.completed_chunks == 0 {
            progress.plan(chunks.len() as u32, now);
        } else {
            progress.plan_resume(chunks.len() as u32, now);
        }
        progress.start(now)?;

        let mut failure_reasons = Vec::new();
        if !self.persist(&progress).await? {
            return self.write_refused(progress, started, failure_reasons).await;
        }

        info!(
            backfill_id = id,
            area = %progress.area_code,
            endpoint = %progress.endpoint_name,
            coverage = %gap.coverage_percentage,
            chunks = chunks.len(),
            "Backfill started"
        );

        let delay = std::time::Duration::from_millis(progress.rate_limit_delay_ms);

        for (idx, chunk) in chunks.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(delay).await;
            }

            if self.cancel_requested(id).await? {
                return self.stop_cancelled(progress, started, failure_reasons).await;
            }

            progress.begin_chunk(*chunk, Utc::now());
            if !self.persist(&progress).await? {
                return self.write_refused(progress, started, failure_reasons).await;
            }

            match self.run_chunk(&target, *chunk).await {
                Ok(ChunkResult::Stored(points)) => {
                    debug!(
                        backfill_id = id,
                        chunk = %chunk,
                        points,
                        "Chunk completed"
                    );
                    progress.record_chunk_success(points, Utc::now());
                }
                Ok(ChunkResult::NoData) => {
                    debug!(backfill_id = id, chunk = %chunk, "Chunk completed without data");
                    progress.record_chunk_no_data(Utc::now());
                }
                Err(ChunkFailure::Chunk(reason)) => {
                    warn!(backfill_id = id, chunk = %chunk, error = %reason, "Chunk failed");
                    let reason = format!("{}: {}", chunk, reason);
                    progress.record_chunk_failure(reason.clone(), Utc::now());
                    failure_reasons.push(reason);
                }
                Err(ChunkFailure::Sink(e)) => {
                    return Err(self.abort(progress, e).await);
                }
            }

            // Refused when a cancellation landed while the chunk was in flight
            if !self.persist(&progress).await? {
                return self.write_refused(progress, started, failure_reasons).await;
            }
        }

        let mut finished = progress.clone();
        finished.finish(Utc::now())?;
        if !self.persist(&finished).await? {
            return self.write_refused(progress, started, failure_reasons).await;
        }
        let progress = finished;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            backfill_id = id,
            status = %progress.status(),
            completed = progress.completed_chunks,
            failed = progress.failed_chunks,
            points = progress.total_data_points,
            duration_ms,
            "Backfill finished"
        );

        Ok(BackfillSummary::from_progress(&progress, duration_ms, failure_reasons))
    }

    async fn run_chunk(
        &self,
        target: &DataTarget,
        chunk: TimeRange,
    ) -> Result<ChunkResult, ChunkFailure> {
        let document = match self.client.fetch_target(target, chunk.start, chunk.end).await? {
            FetchOutcome::Data(document) => document,
            FetchOutcome::NoData => return Ok(ChunkResult::NoData),
            FetchOutcome::Rejected(reason) => return Err(ChunkFailure::Chunk(reason.to_string())),
        };

        let points = self.processor.process(target, &document)?;
        if points.is_empty() {
            return Ok(ChunkResult::NoData);
        }

        self.points
            .upsert_points(&points)
            .await
            .map(ChunkResult::Stored)
            .map_err(ChunkFailure::Sink)
    }

    async fn load(&self, id: i64) -> Result<BackfillProgress, BackfillError> {
        self.progress
            .get(id)
            .await?
            .ok_or(BackfillError::NotFound { id })
    }

    /// False when the store refused the write because of the stored status
    async fn persist(&self, progress: &BackfillProgress) -> Result<bool, BackfillError> {
        match self.progress.update(progress).await {
            Ok(written) => Ok(written),
            Err(e) => Err(self.abort(progress.clone(), e).await),
        }
    }

    async fn cancel_requested(&self, id: i64) -> Result<bool, BackfillError> {
        Ok(matches!(
            self.progress.get(id).await?,
            Some(stored) if stored.status() == BackfillStatus::Cancelled
        ))
    }

    /// A progress write was refused; the stored record moved on without us
    async fn write_refused(
        &self,
        progress: BackfillProgress,
        started: Instant,
        failure_reasons: Vec<String>,
    ) -> Result<BackfillSummary, BackfillError> {
        let stored = self.load(progress.id).await?;
        if stored.status() == BackfillStatus::Cancelled {
            return self.stop_cancelled(progress, started, failure_reasons).await;
        }

        warn!(
            backfill_id = progress.id,
            stored_status = %stored.status(),
            "Backfill record changed underneath the runner, stopping"
        );
        Err(BackfillError::Superseded {
            id: progress.id,
            status: stored.status(),
        })
    }

    async fn stop_cancelled(
        &self,
        mut progress: BackfillProgress,
        started: Instant,
        failure_reasons: Vec<String>,
    ) -> Result<BackfillSummary, BackfillError> {
        progress.cancel(Utc::now())?;
        // Keeps the counters of the chunks that did run
        self.persist(&progress).await?;

        info!(
            backfill_id = progress.id,
            completed = progress.completed_chunks,
            total = progress.total_chunks,
            "Backfill cancelled, stopped scheduling chunks"
        );

        let duration_ms = started.elapsed().as_millis() as u64;
        Ok(BackfillSummary::from_progress(&progress, duration_ms, failure_reasons))
    }

    /// Marks the job FAILED when the store still accepts writes
    async fn abort(&self, mut progress: BackfillProgress, cause: StoreError) -> BackfillError {
        error!(backfill_id = progress.id, error = %cause, "Persistence failed, aborting backfill");

        if progress.fail(cause.to_string(), Utc::now()).is_ok()
            && let Err(e) = self.progress.update(&progress).await
        {
            warn!(backfill_id = progress.id, error = %e, "Could not record backfill failure");
        }

        BackfillError::Store(cause)
    }
}

fn is_runnable(progress: &BackfillProgress) -> bool {
    progress.status() == BackfillStatus::Pending || progress.can_be_resumed()
}

fn validate_range(target: &DataTarget, range: TimeRange) -> Result<(), RequestValidationError> {
    if range.is_empty() {
        return Err(RequestValidationError::InvalidPeriod {
            endpoint: target.endpoint.name(),
            start: range.start,
            end: range.end,
        });
    }
    Ok(())
}

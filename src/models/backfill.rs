//! Backfill job state
//!
//! `BackfillProgress` is mutated only through its transition methods, which
//! enforce the status graph:
//!
//! ```text
//! PENDING -> IN_PROGRESS -> COMPLETED
//!    |            |-------> FAILED -> IN_PROGRESS (resume)
//!    |            '-------> CANCELLED
//!    '-> CANCELLED / FAILED
//! ```

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackfillStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl BackfillStatus {
    pub const ALL: [BackfillStatus; 5] = [
        BackfillStatus::Pending,
        BackfillStatus::InProgress,
        BackfillStatus::Completed,
        BackfillStatus::Failed,
        BackfillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackfillStatus::Pending => "PENDING",
            BackfillStatus::InProgress => "IN_PROGRESS",
            BackfillStatus::Completed => "COMPLETED",
            BackfillStatus::Failed => "FAILED",
            BackfillStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BackfillStatus::Completed | BackfillStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BackfillStatus) -> bool {
        use BackfillStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Failed, InProgress)
                | (Failed, Cancelled)
        )
    }

    /// Whether a stored record in this status may be overwritten by one in
    /// `next`; a writer holding a stale copy can never undo a cancellation
    pub fn can_be_replaced_by(&self, next: BackfillStatus) -> bool {
        *self == next || self.can_transition_to(next)
    }
}

impl fmt::Display for BackfillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackfillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BackfillStatus::Pending),
            "IN_PROGRESS" => Ok(BackfillStatus::InProgress),
            "COMPLETED" => Ok(BackfillStatus::Completed),
            "FAILED" => Ok(BackfillStatus::Failed),
            "CANCELLED" => Ok(BackfillStatus::Cancelled),
            other => Err(format!("unknown backfill status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backfill {id}: transition {from} -> {to} is not allowed")]
pub struct InvalidTransition {
    pub id: i64,
    pub from: BackfillStatus,
    pub to: BackfillStatus,
}

/// Half-open UTC interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Split into consecutive pieces no longer than `max_len`
    pub fn split(&self, max_len: Duration) -> Vec<TimeRange> {
        if self.is_empty() || max_len <= Duration::zero() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = std::cmp::min(cursor + max_len, self.end);
            pieces.push(TimeRange::new(cursor, next));
            cursor = next;
        }
        pieces
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Missing sub-intervals of a requested range for one area/endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub area_code: String,
    pub endpoint_name: String,
    pub requested: TimeRange,
    pub missing: Vec<TimeRange>,
    pub coverage_percentage: Decimal,
}

impl CoverageGap {
    pub fn has_gaps(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn missing_duration(&self) -> Duration {
        self.missing
            .iter()
            .fold(Duration::zero(), |acc, range| acc + range.duration())
    }
}

/// Persisted, resumable state of one backfill job
///
/// `status` only moves through the transition methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillProgress {
    /// Assigned by the progress store; 0 until created
    pub id: i64,
    pub area_code: String,
    pub endpoint_name: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    status: BackfillStatus,
    pub total_chunks: u32,
    /// Includes `no_data_chunks`
    pub completed_chunks: u32,
    /// Completed chunks for which the upstream had nothing; their ranges stay
    /// gaps and are planned again on resume
    pub no_data_chunks: u32,
    pub failed_chunks: u32,
    pub total_data_points: u64,
    pub current_chunk_start: Option<DateTime<Utc>>,
    pub current_chunk_end: Option<DateTime<Utc>>,
    pub rate_limit_delay_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackfillProgress {
    pub fn new(
        area_code: impl Into<String>,
        endpoint_name: impl Into<String>,
        period: TimeRange,
        rate_limit_delay_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            area_code: area_code.into(),
            endpoint_name: endpoint_name.into(),
            period_start: period.start,
            period_end: period.end,
            status: BackfillStatus::Pending,
            total_chunks: 0,
            completed_chunks: 0,
            no_data_chunks: 0,
            failed_chunks: 0,
            total_data_points: 0,
            current_chunk_start: None,
            current_chunk_end: None,
            rate_limit_delay_ms,
            started_at: None,
            completed_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a record read back from storage
    pub(crate) fn with_stored_status(mut self, status: BackfillStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> BackfillStatus {
        self.status
    }

    pub fn period(&self) -> TimeRange {
        TimeRange::new(self.period_start, self.period_end)
    }

    /// completed / total * 100, two decimals; 0 when nothing is planned
    pub fn progress_percentage(&self) -> Decimal {
        if self.total_chunks == 0 {
            return Decimal::ZERO.round_dp(2);
        }
        (Decimal::from(self.completed_chunks) * Decimal::ONE_HUNDRED
            / Decimal::from(self.total_chunks))
        .round_dp(2)
    }

    pub fn can_be_resumed(&self) -> bool {
        matches!(self.status, BackfillStatus::Failed | BackfillStatus::Pending)
            && self.completed_chunks > 0
    }

    fn transition(&mut self, next: BackfillStatus, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Record the chunk plan of a fresh job
    pub fn plan(&mut self, total_chunks: u32, now: DateTime<Utc>) {
        self.total_chunks = total_chunks;
        self.updated_at = now;
    }

    /// Re-plan a resumed job: completed work is kept, failures are re-attempted
    ///
    /// `remaining_chunks` comes from recomputed gaps, which include the ranges
    /// of earlier no-data chunks, so those are taken off the completed count.
    pub fn plan_resume(&mut self, remaining_chunks: u32, now: DateTime<Utc>) {
        self.completed_chunks = self.completed_chunks.saturating_sub(self.no_data_chunks);
        self.no_data_chunks = 0;
        self.total_chunks = self.completed_chunks + remaining_chunks;
        self.failed_chunks = 0;
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(BackfillStatus::InProgress, now)?;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.completed_at = None;
        Ok(())
    }

    pub fn begin_chunk(&mut self, chunk: TimeRange, now: DateTime<Utc>) {
        self.current_chunk_start = Some(chunk.start);
        self.current_chunk_end = Some(chunk.end);
        self.updated_at = now;
    }

    pub fn record_chunk_success(&mut self, data_points: u64, now: DateTime<Utc>) {
        self.completed_chunks += 1;
        self.total_data_points += data_points;
        self.updated_at = now;
    }

    pub fn record_chunk_no_data(&mut self, now: DateTime<Utc>) {
        self.completed_chunks += 1;
        self.no_data_chunks += 1;
        self.updated_at = now;
    }

    pub fn record_chunk_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.failed_chunks += 1;
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    /// Close an in-progress job: FAILED if any chunk failed, COMPLETED otherwise
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        let next = if self.failed_chunks > 0 {
            BackfillStatus::Failed
        } else {
            BackfillStatus::Completed
        };
        self.transition(next, now)?;
        self.current_chunk_start = None;
        self.current_chunk_end = None;
        if next == BackfillStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(BackfillStatus::Failed, now)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(BackfillStatus::Cancelled, now)?;
        self.current_chunk_start = None;
        self.current_chunk_end = None;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Result handed back to the scheduler or the CLI after a backfill run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub backfill_id: i64,
    pub area_code: String,
    pub endpoint_name: String,
    pub success: bool,
    pub status: BackfillStatus,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub no_data_chunks: u32,
    pub failed_chunks: u32,
    pub total_data_points: u64,
    pub progress_percentage: Decimal,
    pub duration_ms: u64,
    pub failure_reasons: Vec<String>,
}

impl BackfillSummary {
    pub fn from_progress(progress: &BackfillProgress, duration_ms: u64, failure_reasons: Vec<String>) -> Self {
        Self {
            backfill_id: progress.id,
            area_code: progress.area_code.clone(),
            endpoint_name: progress.endpoint_name.clone(),
            success: progress.status == BackfillStatus::Completed,
            status: progress.status,
            total_chunks: progress.total_chunks,
            completed_chunks: progress.completed_chunks,
            no_data_chunks: progress.no_data_chunks,
            failed_chunks: progress.failed_chunks,
            total_data_points: progress.total_data_points,
            progress_percentage: progress.progress_percentage(),
            duration_ms,
            failure_reasons,
        }
    }
}

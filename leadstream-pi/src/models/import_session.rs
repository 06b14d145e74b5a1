//! Import session state machine and progress tracking
//!
//! One session per import run: `connecting → streaming → {complete | error}`.
//! The session is the single source of truth for target count and terminal
//! status; consumers reconcile against it. Sessions live only for the
//! duration of their stream and are never persisted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use leadstream_common::{Error, Result};

/// Import session status
///
/// Monotonic: once a terminal status is reached no further transitions
/// occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Channel open, source not yet confirmed
    Connecting,
    /// Records are flowing
    Streaming,
    /// Run finished; final total reported
    Complete,
    /// Run failed; cause reported
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Streaming => write!(f, "streaming"),
            SessionStatus::Complete => write!(f, "complete"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

/// Progress derived from batch events
///
/// `current` is always the sum of record counts over the batch events seen
/// so far; batch errors contribute nothing. `percentage` is recomputed from
/// `current`/`target` on every update, never stored independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Records landed so far
    pub current: usize,

    /// Records the run is trying to acquire
    pub target: usize,

    /// Batch events seen so far
    pub batches_seen: usize,

    /// Completion percentage for display (0-100)
    pub percentage: u8,

    /// Estimated remaining time (seconds), None until throughput is known
    pub estimated_remaining_seconds: Option<u64>,
}

impl ImportProgress {
    pub fn new(target: usize) -> Self {
        Self {
            current: 0,
            target,
            batches_seen: 0,
            percentage: 0,
            estimated_remaining_seconds: None,
        }
    }

    /// Fold one batch into the running totals.
    ///
    /// `elapsed_ms` is monotonic time since the streaming transition.
    pub fn record_batch(&mut self, batch_size: usize, elapsed_ms: u64) {
        self.current += batch_size;
        self.batches_seen += 1;
        self.percentage = percentage(self.current, self.target);
        self.estimated_remaining_seconds =
            estimate_remaining_seconds(self.current, self.target, elapsed_ms);
    }

    /// Apply the one-shot target correction from the `start` event.
    ///
    /// Subsequent percentages and estimates use the corrected target;
    /// values already reported are not revised.
    pub fn retarget(&mut self, target: usize) {
        self.target = target;
        self.percentage = percentage(self.current, self.target);
    }
}

/// Completion percentage, rounded, clamped to 100 for display.
///
/// `current` itself is never clamped; the final batch may overshoot the
/// target when the source's page size does not divide evenly.
pub fn percentage(current: usize, target: usize) -> u8 {
    if target == 0 {
        return 0;
    }
    let pct = (current as f64 / target as f64 * 100.0).round();
    pct.min(100.0) as u8
}

/// Remaining-time estimate from observed throughput.
///
/// Rate is records per elapsed millisecond; unknown until at least one
/// record has landed with measurable elapsed time.
pub fn estimate_remaining_seconds(
    current: usize,
    target: usize,
    elapsed_ms: u64,
) -> Option<u64> {
    if current == 0 || elapsed_ms == 0 {
        return None;
    }
    let rate = current as f64 / elapsed_ms as f64;
    let remaining = target.saturating_sub(current) as f64;
    Some((remaining / rate / 1000.0).round() as u64)
}

/// Import session (in-memory state)
#[derive(Debug, Clone)]
pub struct ImportSession {
    /// Unique session identifier, constant for the session's lifetime
    pub session_id: Uuid,

    /// Current status
    status: SessionStatus,

    /// Saved-search query driving this run
    pub source_query: String,

    /// Progress tracking
    pub progress: ImportProgress,

    /// Session start time (wall clock, for reporting)
    pub started_at: DateTime<Utc>,

    /// Monotonic clock anchor for throughput, set at the streaming
    /// transition
    streaming_since: Option<Instant>,
}

impl ImportSession {
    /// Create a new session in `Connecting` state.
    ///
    /// `target_count` here is the feasible target after clamping. Fails
    /// with `InvalidInput` when the query is empty or the target is zero.
    pub fn create(target_count: usize, source_query: &str) -> Result<Self> {
        if source_query.trim().is_empty() {
            return Err(Error::InvalidInput(
                "source query must not be empty".to_string(),
            ));
        }
        if target_count == 0 {
            return Err(Error::InvalidInput(
                "target count must be positive".to_string(),
            ));
        }

        Ok(Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::Connecting,
            source_query: source_query.to_string(),
            progress: ImportProgress::new(target_count),
            started_at: Utc::now(),
            streaming_since: None,
        })
    }

    /// Current status, for the emitter to decide whether to keep writing
    pub fn current_status(&self) -> SessionStatus {
        self.status
    }

    /// Transition to a new status.
    ///
    /// Transitions out of a terminal status are ignored.
    pub fn transition_to(&mut self, next: SessionStatus) {
        if self.status.is_terminal() {
            tracing::warn!(
                session_id = %self.session_id,
                from = %self.status,
                to = %next,
                "ignoring transition out of terminal status"
            );
            return;
        }
        if next == SessionStatus::Streaming && self.streaming_since.is_none() {
            self.streaming_since = Some(Instant::now());
        }
        self.status = next;
    }

    /// Milliseconds of streaming elapsed so far (0 before streaming starts)
    pub fn elapsed_ms(&self) -> u64 {
        self.streaming_since
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Fold one successful batch into the session's progress
    pub fn record_batch(&mut self, batch_size: usize) {
        let elapsed_ms = self.elapsed_ms();
        self.progress.record_batch(batch_size, elapsed_ms);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_empty_query_and_zero_target() {
        assert!(ImportSession::create(100, "   ").is_err());
        assert!(ImportSession::create(0, "saved-search-7").is_err());
        assert!(ImportSession::create(100, "saved-search-7").is_ok());
    }

    #[test]
    fn new_sessions_start_connecting() {
        let session = ImportSession::create(100, "q").unwrap();
        assert_eq!(session.current_status(), SessionStatus::Connecting);
        assert!(!session.is_terminal());
    }

    #[test]
    fn terminal_status_is_monotonic() {
        let mut session = ImportSession::create(100, "q").unwrap();
        session.transition_to(SessionStatus::Streaming);
        session.transition_to(SessionStatus::Complete);
        session.transition_to(SessionStatus::Streaming);
        assert_eq!(session.current_status(), SessionStatus::Complete);
        session.transition_to(SessionStatus::Error);
        assert_eq!(session.current_status(), SessionStatus::Complete);
    }

    #[test]
    fn percentage_is_rounded_from_current_and_target() {
        assert_eq!(percentage(1250, 2500), 50);
        assert_eq!(percentage(0, 2500), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
    }

    #[test]
    fn percentage_is_clamped_on_overshoot() {
        // Final batch may overshoot the target; display stays at 100.
        assert_eq!(percentage(105, 100), 100);
    }

    #[test]
    fn eta_is_unknown_until_throughput_exists() {
        assert_eq!(estimate_remaining_seconds(0, 100, 5000), None);
        assert_eq!(estimate_remaining_seconds(10, 100, 0), None);
    }

    #[test]
    fn eta_follows_observed_rate() {
        // 40 records in 2000 ms -> 0.02 records/ms; 60 remaining -> 3000 ms.
        assert_eq!(estimate_remaining_seconds(40, 100, 2000), Some(3));
        // Overshoot leaves nothing remaining.
        assert_eq!(estimate_remaining_seconds(105, 100, 2000), Some(0));
    }

    #[test]
    fn batch_errors_do_not_move_progress() {
        let mut progress = ImportProgress::new(100);
        progress.record_batch(40, 1000);
        let before = progress.clone();

        // A batch error produces no record_batch call at all; the next
        // successful batch continues from the same totals.
        progress.record_batch(35, 2000);
        assert_eq!(progress.current, before.current + 35);
        assert_eq!(progress.batches_seen, before.batches_seen + 1);
    }

    #[test]
    fn retarget_recomputes_percentage_once() {
        let mut progress = ImportProgress::new(500);
        progress.record_batch(50, 1000);
        assert_eq!(progress.percentage, 10);

        progress.retarget(100);
        assert_eq!(progress.target, 100);
        assert_eq!(progress.percentage, 50);
    }
}

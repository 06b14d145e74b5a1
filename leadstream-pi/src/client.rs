//! Programmatic consumer for the import stream
//!
//! Downstream surfaces (and the integration tests) consume the SSE stream
//! through this client: it reassembles frames from raw reads of arbitrary
//! size, tracks the session state machine, and accumulates the imported
//! records. A channel that closes without a terminal event is surfaced as
//! an error, never reinterpreted as success.

use futures::StreamExt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use leadstream_common::sse::{decode_frame, FrameAssembler};
use leadstream_common::{ImportEvent, Prospect};

use crate::api::StartImportRequest;
use crate::models::{ImportProgress, SessionStatus};

/// Target assumed until the `start` event corrects it
const FALLBACK_TARGET: usize = 2500;

/// Client-side errors raised before any streaming begins
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was rejected with a non-streaming error response
    #[error("import request rejected: HTTP {status}")]
    Rejected { status: u16, body: String },

    /// The request never reached the service
    #[error("transport error: {0}")]
    Transport(String),
}

/// Final outcome of one consumed import stream.
///
/// Records accumulated before a failure survive it: `prospects` holds
/// whatever landed, whichever way the stream ended.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub session_id: Option<Uuid>,
    pub status: SessionStatus,
    pub prospects: Vec<Prospect>,
    pub progress: ImportProgress,
    /// Non-fatal page failures reported along the way: (batch, cause)
    pub batch_failures: Vec<(usize, String)>,
    /// Cause, when `status` is `Error`
    pub error: Option<String>,
}

/// Consumer-side state machine for the import stream.
///
/// Feed raw chunks in; complete frames are split off, parsed, and applied.
/// Unparseable frame bodies are logged and skipped — they never end the
/// stream. Transport and state tracking are separate so the state machine
/// is testable without a network.
pub struct ImportStreamState {
    assembler: FrameAssembler,
    status: SessionStatus,
    session_id: Option<Uuid>,
    prospects: Vec<Prospect>,
    progress: ImportProgress,
    batch_failures: Vec<(usize, String)>,
    error: Option<String>,
    started_at: Instant,
}

impl ImportStreamState {
    pub fn new(requested_target: usize) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            status: SessionStatus::Connecting,
            session_id: None,
            prospects: Vec::new(),
            progress: ImportProgress::new(requested_target),
            batch_failures: Vec::new(),
            error: None,
            started_at: Instant::now(),
        }
    }

    /// Feed one raw chunk; returns the events dispatched from it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ImportEvent> {
        let mut dispatched = Vec::new();
        for frame in self.assembler.push(chunk) {
            match decode_frame(&frame) {
                Ok(Some(event)) => {
                    self.apply(&event);
                    dispatched.push(event);
                }
                Ok(None) => {} // heartbeat comment
                Err(e) => {
                    warn!(error = %e, "skipping unparseable frame");
                }
            }
        }
        dispatched
    }

    fn apply(&mut self, event: &ImportEvent) {
        if self.status.is_terminal() {
            warn!(kind = event.event_type(), "ignoring event after terminal");
            return;
        }

        match event {
            ImportEvent::Session { session_id } => {
                debug!(session_id = %session_id, "session created");
                self.session_id = Some(*session_id);
                self.status = SessionStatus::Streaming;
                self.started_at = Instant::now();
            }
            ImportEvent::Start { target } => {
                self.progress.retarget(*target);
            }
            ImportEvent::Batch {
                prospects,
                total,
                target,
                ..
            } => {
                if *target != self.progress.target {
                    self.progress.retarget(*target);
                }
                self.prospects.extend(prospects.iter().cloned());
                let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
                self.progress.record_batch(prospects.len(), elapsed_ms);

                // The coordinator's running total is authoritative; a
                // mismatch means the stream dropped or duplicated a batch.
                if self.prospects.len() != *total {
                    warn!(
                        local = self.prospects.len(),
                        reported = total,
                        "running total does not match accumulated records"
                    );
                }
            }
            ImportEvent::BatchError { batch, error } => {
                debug!(batch, %error, "batch failed upstream, continuing");
                self.batch_failures.push((*batch, error.clone()));
            }
            ImportEvent::Complete { session_id, .. } => {
                self.session_id.get_or_insert(*session_id);
                self.status = SessionStatus::Complete;
                self.progress.estimated_remaining_seconds = Some(0);
            }
            ImportEvent::Error { error } => {
                self.status = SessionStatus::Error;
                self.error = Some(error.clone());
            }
        }
    }

    /// Terminal status reached? The read loop stops here.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Current status, for callers polling mid-stream
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Records ingested so far (reviewable while the import continues)
    pub fn prospects(&self) -> &[Prospect] {
        &self.prospects
    }

    pub fn progress(&self) -> &ImportProgress {
        &self.progress
    }

    /// Close the read loop and produce the outcome.
    ///
    /// End-of-input before a terminal event is a protocol violation — a
    /// silently-dropped connection is never success.
    pub fn finish(mut self) -> ImportOutcome {
        if !self.status.is_terminal() {
            warn!("stream closed without a terminal event");
            self.status = SessionStatus::Error;
            self.error = Some("stream closed without a terminal event".to_string());
        }
        ImportOutcome {
            session_id: self.session_id,
            status: self.status,
            prospects: self.prospects,
            progress: self.progress,
            batch_failures: self.batch_failures,
            error: self.error,
        }
    }
}

/// HTTP client that starts an import and consumes its stream
pub struct ImportStreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl ImportStreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Start an import and consume the stream to its end.
    ///
    /// Non-2xx responses reject before streaming and surface as
    /// [`ClientError::Rejected`]; everything after the stream opens ends
    /// up in the [`ImportOutcome`], including partial results.
    pub async fn run(&self, request: &StartImportRequest) -> Result<ImportOutcome, ClientError> {
        let response = self
            .http
            .post(format!("{}/import/stream", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let requested = request
            .target_count
            .map(|count| count as usize)
            .unwrap_or(FALLBACK_TARGET);
        let mut state = ImportStreamState::new(requested);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    state.feed(&bytes);
                    if state.is_terminal() {
                        break;
                    }
                }
                Err(e) => {
                    // Read failure mid-stream; finish() reports the missing
                    // terminal event.
                    warn!(error = %e, "stream read failed");
                    break;
                }
            }
        }

        Ok(state.finish())
    }
}

//! Batch production for the streaming import
//!
//! Walks the directory source page by page, strictly sequentially, and
//! emits import events into the session's emitter channel. One producer
//! drives one session; batch numbers and running totals are monotonic
//! because nothing else touches them.
//!
//! Failure policy: a page that fails recoverably is reported as a
//! `batch_error` and the run continues with the next page; a fatal source
//! error ends the run with a terminal `error`. Exactly one terminal event
//! is emitted per run, and nothing after it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use leadstream_common::ImportEvent;

use crate::models::{ImportSession, SessionStatus};
use crate::services::source::{ProspectSource, SourceError};

/// Producer tuning
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Records requested per directory page
    pub page_size: usize,
    /// Pause between pages, easy on the directory's rate limits
    pub page_delay: Duration,
    /// Consecutive recoverable page failures tolerated before giving up
    pub max_consecutive_failures: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay: Duration::from_millis(500),
            max_consecutive_failures: 3,
        }
    }
}

/// Drives one import session from its source to a terminal event
pub struct BatchProducer {
    source: Arc<dyn ProspectSource>,
    config: ProducerConfig,
}

impl BatchProducer {
    pub fn new(source: Arc<dyn ProspectSource>, config: ProducerConfig) -> Self {
        Self { source, config }
    }

    /// Run the session to its terminal event.
    ///
    /// Events go out through `tx`; the channel is bounded, so a slow
    /// consumer backpressures production here instead of growing memory.
    /// A closed channel (consumer gone) halts production immediately —
    /// closing the channel is the sole cancellation primitive.
    ///
    /// Returns the session so the caller can inspect its final state.
    pub async fn run(
        &self,
        mut session: ImportSession,
        tx: mpsc::Sender<ImportEvent>,
    ) -> ImportSession {
        let session_id = session.session_id;
        let target = session.progress.target;

        if !emit(&tx, ImportEvent::Session { session_id }).await {
            return session;
        }
        session.transition_to(SessionStatus::Streaming);

        if !emit(&tx, ImportEvent::Start { target }).await {
            return session;
        }

        let mut cursor: Option<String> = None;
        let mut batch = 0usize;
        let mut total = 0usize;
        let mut consecutive_failures = 0usize;

        while total < target {
            batch += 1;

            let page = self
                .source
                .fetch_page(&session.source_query, cursor.as_deref(), self.config.page_size)
                .await;

            match page {
                Ok(page) => {
                    consecutive_failures = 0;
                    let count = page.prospects.len();
                    total += count;

                    info!(
                        session_id = %session_id,
                        batch,
                        count,
                        total,
                        target,
                        "batch fetched"
                    );

                    // An empty page emits no batch event; it only signals
                    // exhaustion below.
                    if count > 0 {
                        session.record_batch(count);
                        if !emit(
                            &tx,
                            ImportEvent::Batch {
                                batch,
                                prospects: page.prospects,
                                total,
                                target,
                            },
                        )
                        .await
                        {
                            return session;
                        }
                    }

                    cursor = page.cursor;
                    if cursor.is_none() || count == 0 {
                        info!(session_id = %session_id, total, "source exhausted");
                        break;
                    }
                    if total < target {
                        tokio::time::sleep(self.config.page_delay).await;
                    }
                }
                Err(SourceError::Recoverable(cause)) => {
                    warn!(
                        session_id = %session_id,
                        batch,
                        %cause,
                        "batch failed, continuing with next page"
                    );
                    if !emit(
                        &tx,
                        ImportEvent::BatchError {
                            batch,
                            error: cause,
                        },
                    )
                    .await
                    {
                        return session;
                    }

                    // Nothing fetched yet: the source is effectively
                    // rejecting the query, not hiccuping on one page.
                    if total == 0 {
                        return self
                            .fail(
                                session,
                                &tx,
                                "failed to fetch prospects from directory".to_string(),
                            )
                            .await;
                    }

                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return self
                            .fail(
                                session,
                                &tx,
                                format!(
                                    "giving up after {consecutive_failures} consecutive page failures"
                                ),
                            )
                            .await;
                    }
                }
                Err(SourceError::Fatal(cause)) => {
                    return self.fail(session, &tx, cause).await;
                }
            }
        }

        session.transition_to(SessionStatus::Complete);
        info!(
            session_id = %session_id,
            total,
            batches = batch,
            "import complete"
        );
        let _ = emit(&tx, ImportEvent::Complete { session_id, total }).await;
        session
    }

    /// End the run with a terminal error event
    async fn fail(
        &self,
        mut session: ImportSession,
        tx: &mpsc::Sender<ImportEvent>,
        cause: String,
    ) -> ImportSession {
        error!(
            session_id = %session.session_id,
            error = %cause,
            "import failed"
        );
        session.transition_to(SessionStatus::Error);
        let _ = emit(tx, ImportEvent::Error { error: cause }).await;
        session
    }
}

/// Send one event; false means the consumer closed its end and production
/// must stop.
async fn emit(tx: &mpsc::Sender<ImportEvent>, event: ImportEvent) -> bool {
    if tx.send(event).await.is_err() {
        info!("emitter channel closed, halting production");
        return false;
    }
    true
}

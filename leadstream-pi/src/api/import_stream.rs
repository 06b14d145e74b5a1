//! Streaming import API handler
//!
//! POST /import/stream opens the long-lived push channel: validation
//! failures are rejected with a non-streaming error response before any
//! streaming begins; on success the response is the SSE event stream
//! (`session`, `start`, `batch`, `batch_error`, then exactly one of
//! `complete` or `error`).

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use leadstream_common::sse::to_sse_event;

use crate::error::{ApiError, ApiResult};
use crate::models::{ImportSession, SessionStatus};
use crate::services::{BatchProducer, ProducerConfig};
use crate::AppState;

/// POST /import/stream request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartImportRequest {
    /// Saved-search query to import from
    pub source_query: String,
    /// Records to acquire; clamped into the service's feasible range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_count: Option<i64>,
    pub requester_id: String,
    pub workspace_id: String,
}

/// POST /import/stream
///
/// Begin a streaming import. The producer runs as a background task and
/// pushes events through a bounded channel; the SSE response drains it.
pub async fn import_stream(
    State(state): State<AppState>,
    Json(request): Json<StartImportRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if request.source_query.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "source_query is required".to_string(),
        ));
    }
    if let Some(count) = request.target_count {
        if count <= 0 {
            return Err(ApiError::BadRequest(
                "target_count must be positive".to_string(),
            ));
        }
    }
    if request.requester_id.trim().is_empty() || request.workspace_id.trim().is_empty() {
        return Err(ApiError::Unauthorized(
            "requester_id and workspace_id are required".to_string(),
        ));
    }

    let import = &state.import;
    let target = request
        .target_count
        .map(|count| count as usize)
        .unwrap_or(import.default_target)
        .clamp(import.min_target, import.max_target);

    let session = ImportSession::create(target, &request.source_query)?;
    let session_id = session.session_id;

    info!(
        session_id = %session_id,
        requester_id = %request.requester_id,
        workspace_id = %request.workspace_id,
        target,
        "import stream starting"
    );

    let (tx, mut rx) = mpsc::channel(import.emitter_queue_depth);

    let producer = BatchProducer::new(
        state.source.clone(),
        ProducerConfig {
            page_size: import.page_size,
            page_delay: Duration::from_millis(import.page_delay_ms),
            max_consecutive_failures: import.max_consecutive_failures,
        },
    );

    // Background task for batch production
    let last_error = state.last_error.clone();
    tokio::spawn(async move {
        let session = producer.run(session, tx).await;
        match session.current_status() {
            SessionStatus::Complete => {
                info!(
                    session_id = %session_id,
                    total = session.progress.current,
                    "import session finished"
                );
            }
            SessionStatus::Error => {
                warn!(session_id = %session_id, "import session failed");
                *last_error.write().await =
                    Some(format!("import session {session_id} failed"));
            }
            status => {
                // Consumer closed its end before a terminal event; the
                // producer has already released the source.
                debug!(session_id = %session_id, %status, "import session abandoned");
            }
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(to_sse_event(&event));
        }
        debug!(session_id = %session_id, "import event channel drained");
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new().route("/import/stream", post(import_stream))
}

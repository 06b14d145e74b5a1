//! Import stream event types
//!
//! The import stream pushes a closed set of event kinds over SSE. The event
//! kind travels in the frame's `event:` designator line; the `data:` line
//! carries the kind-specific JSON payload. Exactly one terminal event
//! (`complete` or `error`) ends every stream.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::prospect::Prospect;

/// Import stream event types
///
/// Shared between the emitting service and stream consumers so both sides
/// agree on the wire contract. Dispatched by kind at the parse boundary;
/// malformed payloads surface as [`WireError`] rather than panics.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    /// Import session created; first event on every stream
    Session {
        session_id: Uuid,
    },

    /// Run parameters confirmed. `target` is the feasible count the producer
    /// settled on and may differ from what the caller requested.
    Start {
        target: usize,
    },

    /// One page of records landed
    Batch {
        batch: usize,
        prospects: Vec<Prospect>,
        total: usize,
        target: usize,
    },

    /// One page failed recoverably; the run continues
    BatchError {
        batch: usize,
        error: String,
    },

    /// Terminal: the run finished with `total` records
    Complete {
        session_id: Uuid,
        total: usize,
    },

    /// Terminal: the run cannot continue
    Error {
        error: String,
    },
}

/// Wire decode errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct SessionData {
    session_id: Uuid,
}

#[derive(Deserialize)]
struct StartData {
    target: usize,
}

#[derive(Deserialize)]
struct BatchData {
    batch: usize,
    #[serde(default)]
    prospects: Vec<Prospect>,
    total: usize,
    target: usize,
}

#[derive(Deserialize)]
struct BatchErrorData {
    batch: usize,
    error: String,
}

#[derive(Deserialize)]
struct CompleteData {
    session_id: Uuid,
    total: usize,
}

#[derive(Deserialize)]
struct ErrorData {
    error: String,
}

impl ImportEvent {
    /// Get event kind as string for the wire designator line
    pub fn event_type(&self) -> &'static str {
        match self {
            ImportEvent::Session { .. } => "session",
            ImportEvent::Start { .. } => "start",
            ImportEvent::Batch { .. } => "batch",
            ImportEvent::BatchError { .. } => "batch_error",
            ImportEvent::Complete { .. } => "complete",
            ImportEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportEvent::Complete { .. } | ImportEvent::Error { .. }
        )
    }

    /// JSON payload for the wire `data:` line
    pub fn data_json(&self) -> serde_json::Value {
        match self {
            ImportEvent::Session { session_id } => json!({ "session_id": session_id }),
            ImportEvent::Start { target } => json!({ "target": target }),
            ImportEvent::Batch {
                batch,
                prospects,
                total,
                target,
            } => json!({
                "batch": batch,
                "prospects": prospects,
                "total": total,
                "target": target,
            }),
            ImportEvent::BatchError { batch, error } => json!({
                "batch": batch,
                "error": error,
            }),
            ImportEvent::Complete { session_id, total } => json!({
                "session_id": session_id,
                "total": total,
            }),
            ImportEvent::Error { error } => json!({ "error": error }),
        }
    }

    /// Rebuild an event from its wire designator and JSON payload
    pub fn from_wire(kind: &str, data: &str) -> Result<Self, WireError> {
        match kind {
            "session" => {
                let d: SessionData = parse_payload("session", data)?;
                Ok(ImportEvent::Session {
                    session_id: d.session_id,
                })
            }
            "start" => {
                let d: StartData = parse_payload("start", data)?;
                Ok(ImportEvent::Start { target: d.target })
            }
            "batch" => {
                let d: BatchData = parse_payload("batch", data)?;
                Ok(ImportEvent::Batch {
                    batch: d.batch,
                    prospects: d.prospects,
                    total: d.total,
                    target: d.target,
                })
            }
            "batch_error" => {
                let d: BatchErrorData = parse_payload("batch_error", data)?;
                Ok(ImportEvent::BatchError {
                    batch: d.batch,
                    error: d.error,
                })
            }
            "complete" => {
                let d: CompleteData = parse_payload("complete", data)?;
                Ok(ImportEvent::Complete {
                    session_id: d.session_id,
                    total: d.total,
                })
            }
            "error" => {
                let d: ErrorData = parse_payload("error", data)?;
                Ok(ImportEvent::Error { error: d.error })
            }
            other => Err(WireError::UnknownKind(other.to_string())),
        }
    }
}

fn parse_payload<'a, T: Deserialize<'a>>(
    kind: &'static str,
    data: &'a str,
) -> Result<T, WireError> {
    serde_json::from_str(data).map_err(|source| WireError::MalformedPayload { kind, source })
}

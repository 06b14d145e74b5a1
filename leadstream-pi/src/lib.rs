//! leadstream-pi library interface
//!
//! Exposes the service surface (state, router, consumer client) for
//! integration testing and downstream use.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::ImportSettings;
use crate::services::source::ProspectSource;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Directory source backing all import sessions
    pub source: Arc<dyn ProspectSource>,
    /// Import pipeline tuning (page size, clamp bounds, pacing)
    pub import: ImportSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last session failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(source: Arc<dyn ProspectSource>, import: ImportSettings) -> Self {
        Self {
            source,
            import,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! leadstream-pi - Prospect Ingest Microservice
//!
//! Imports prospect records from the professional-network directory behind
//! a saved search and streams them to consumers in batches over SSE, with
//! progress and time-remaining reporting.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use leadstream_pi::config::Settings;
use leadstream_pi::services::DirectorySearchClient;
use leadstream_pi::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting leadstream-pi (Prospect Ingest) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;

    let api_key = settings.directory.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "Directory API key not configured. Please configure using one of:\n\
             1. Environment: LEADSTREAM_DIRECTORY_API_KEY=your-key-here\n\
             2. TOML config: ~/.config/leadstream/leadstream-pi.toml (api_key under [directory])"
        )
    })?;
    let account_id = settings.directory.account_id.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "Directory account not configured. Set LEADSTREAM_DIRECTORY_ACCOUNT_ID or \
             account_id under [directory] in the TOML config."
        )
    })?;

    let source = Arc::new(DirectorySearchClient::new(
        settings.directory.base_url.clone(),
        api_key,
        account_id,
    ));

    let state = AppState::new(source, settings.import.clone());
    let app = leadstream_pi::build_router(state);

    let addr = settings.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

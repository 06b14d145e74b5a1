//! Configuration resolution for leadstream-pi
//!
//! Settings resolve with ENV → TOML → compiled-default priority. The TOML
//! file lives at `~/.config/leadstream/leadstream-pi.toml` unless
//! `LEADSTREAM_CONFIG` points elsewhere.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

use leadstream_common::{Error, Result};

/// Default listen port for the Prospect Ingest service
pub const DEFAULT_PORT: u16 = 5810;

/// Service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address, host:port
    pub bind_addr: String,
    pub directory: DirectorySettings,
    pub import: ImportSettings,
}

/// Directory search API access
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Directory API base URL, e.g. "https://api6.example.com:13670"
    pub base_url: String,
    pub api_key: Option<String>,
    /// Connected directory account the searches run under
    pub account_id: Option<String>,
}

/// Import pipeline tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Records requested per directory page
    pub page_size: usize,
    /// Target used when the caller does not ask for a count
    pub default_target: usize,
    /// Lower clamp bound for requested targets
    pub min_target: usize,
    /// Upper clamp bound for requested targets
    pub max_target: usize,
    /// Pause between directory pages (milliseconds)
    pub page_delay_ms: u64,
    /// Consecutive recoverable page failures tolerated before giving up
    pub max_consecutive_failures: usize,
    /// Bounded emitter queue depth; a slow consumer backpressures the
    /// producer once this many events are in flight
    pub emitter_queue_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            directory: DirectorySettings::default(),
            import: ImportSettings::default(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            default_target: 500,
            min_target: 25,
            max_target: 2500,
            page_delay_ms: 500,
            max_consecutive_failures: 3,
            emitter_queue_depth: 32,
        }
    }
}

impl Settings {
    /// Load settings with ENV → TOML → default priority
    pub fn load() -> Result<Self> {
        let mut settings = match config_file_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("read {} failed: {e}", path.display())))?;
                let settings: Settings = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {} failed: {e}", path.display())))?;
                info!("Settings loaded from {}", path.display());
                settings
            }
            _ => Settings::default(),
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Environment variables win over TOML values
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("LEADSTREAM_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("LEADSTREAM_DIRECTORY_URL") {
            self.directory.base_url = url;
        }
        if let Ok(key) = std::env::var("LEADSTREAM_DIRECTORY_API_KEY") {
            if self.directory.api_key.is_some() {
                warn!("Directory API key found in both TOML and environment. Using environment (highest priority).");
            }
            self.directory.api_key = Some(key);
        }
        if let Ok(account) = std::env::var("LEADSTREAM_DIRECTORY_ACCOUNT_ID") {
            self.directory.account_id = Some(account);
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address {}: {e}", self.bind_addr)))
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LEADSTREAM_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("leadstream").join("leadstream-pi.toml"))
}

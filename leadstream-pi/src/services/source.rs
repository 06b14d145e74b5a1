//! Directory search source
//!
//! Paginated access to the professional-network directory that backs saved
//! searches, plus the mapping from raw directory items into Prospect
//! records. The rest of the pipeline only sees the [`ProspectSource`]
//! trait, so page fetching stays swappable in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use leadstream_common::Prospect;

/// Directory requests that take longer than this are abandoned
const SEARCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Source errors, classified by whether the run can continue
#[derive(Debug, Error)]
pub enum SourceError {
    /// One page failed; later pages may still succeed
    #[error("{0}")]
    Recoverable(String),

    /// The source cannot serve this query at all
    #[error("{0}")]
    Fatal(String),
}

/// One page of mapped records plus the continuation cursor
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub prospects: Vec<Prospect>,
    /// None when the source is exhausted
    pub cursor: Option<String>,
}

/// Paginated "fetch next page for query" capability
#[async_trait]
pub trait ProspectSource: Send + Sync {
    async fn fetch_page(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<SourcePage, SourceError>;
}

/// Directory search API client
///
/// Speaks the hosted directory-search wire: POST to the search endpoint
/// with the saved-search URL as body, API key header, and cursor
/// pagination via query parameters.
pub struct DirectorySearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawDirectoryItem>,
    cursor: Option<String>,
}

/// Raw directory item, before normalization
#[derive(Debug, Deserialize)]
struct RawDirectoryItem {
    id: Option<String>,
    public_identifier: Option<String>,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    headline: Option<String>,
    title: Option<String>,
    company_name: Option<String>,
    current_company: Option<String>,
    location: Option<String>,
    profile_url: Option<String>,
    profile_picture_url: Option<String>,
    network_distance: Option<serde_json::Value>,
    connection_degree: Option<serde_json::Value>,
}

impl RawDirectoryItem {
    /// Map into a Prospect.
    ///
    /// Returns None when the item lacks an identity or a profile URL;
    /// such records cannot be reviewed downstream and are skipped.
    fn into_prospect(self) -> Option<Prospect> {
        let profile_url = self.profile_url?;
        let id = self.id.or(self.public_identifier)?;

        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!(
                "{} {}",
                self.first_name.unwrap_or_default(),
                self.last_name.unwrap_or_default()
            )
            .trim()
            .to_string(),
        };

        let connection_degree = self
            .network_distance
            .as_ref()
            .and_then(parse_connection_degree)
            .or_else(|| self.connection_degree.as_ref().and_then(parse_connection_degree));

        Some(Prospect {
            id,
            name,
            title: self.title.or(self.headline).unwrap_or_default(),
            company: self
                .company_name
                .or(self.current_company)
                .unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            profile_url,
            profile_picture_url: self.profile_picture_url,
            connection_degree,
        })
    }
}

/// Normalize the directory's relationship-distance representations.
///
/// The directory reports distance as an integer, as `DISTANCE_n`, or as
/// `FIRST_DEGREE`-style strings depending on the endpoint.
fn parse_connection_degree(value: &serde_json::Value) -> Option<u8> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().filter(|n| (1..=9).contains(n)).map(|n| n as u8),
        serde_json::Value::String(s) => {
            let s = s.trim().to_ascii_uppercase();
            match s.as_str() {
                "FIRST_DEGREE" => Some(1),
                "SECOND_DEGREE" => Some(2),
                "THIRD_DEGREE" => Some(3),
                _ => s.strip_prefix("DISTANCE_").and_then(|n| n.parse().ok()),
            }
        }
        _ => None,
    }
}

impl DirectorySearchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            account_id: account_id.into(),
        }
    }
}

#[async_trait]
impl ProspectSource for DirectorySearchClient {
    async fn fetch_page(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<SourcePage, SourceError> {
        let url = format!("{}/api/v1/linkedin/search", self.base_url);
        let limit = limit.to_string();
        let mut params = vec![
            ("account_id", self.account_id.as_str()),
            ("limit", limit.as_str()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response = self
            .http
            .post(&url)
            .query(&params)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "url": query }))
            .send()
            .await
            .map_err(|e| SourceError::Recoverable(format!("directory request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::Fatal(format!(
                "directory authorization rejected (HTTP {})",
                status.as_u16()
            )));
        }
        if status.is_client_error() {
            return Err(SourceError::Fatal(format!(
                "directory rejected the query (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Recoverable(format!(
                "directory error (HTTP {})",
                status.as_u16()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Recoverable(format!("malformed directory page: {e}")))?;

        let raw_count = body.items.len();
        let prospects: Vec<Prospect> = body
            .items
            .into_iter()
            .filter_map(RawDirectoryItem::into_prospect)
            .collect();

        let skipped = raw_count - prospects.len();
        if skipped > 0 {
            warn!(skipped, "directory items without identity or profile URL");
        }
        debug!(
            mapped = prospects.len(),
            has_more = body.cursor.is_some(),
            "directory page fetched"
        );

        Ok(SourcePage {
            prospects,
            cursor: body.cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_integer_and_string_connection_degrees() {
        assert_eq!(parse_connection_degree(&json!(2)), Some(2));
        assert_eq!(parse_connection_degree(&json!("FIRST_DEGREE")), Some(1));
        assert_eq!(parse_connection_degree(&json!("second_degree")), Some(2));
        assert_eq!(parse_connection_degree(&json!("DISTANCE_3")), Some(3));
        assert_eq!(parse_connection_degree(&json!("OUT_OF_NETWORK")), None);
        assert_eq!(parse_connection_degree(&json!(0)), None);
        assert_eq!(parse_connection_degree(&json!(null)), None);
    }

    #[test]
    fn maps_raw_items_with_fallback_fields() {
        let raw: RawDirectoryItem = serde_json::from_value(json!({
            "public_identifier": "dana-reyes",
            "first_name": "Dana",
            "last_name": "Reyes",
            "headline": "VP Engineering at Initech",
            "current_company": "Initech",
            "location": "Austin, TX",
            "profile_url": "https://example.com/in/dana-reyes",
            "network_distance": "DISTANCE_2"
        }))
        .unwrap();

        let prospect = raw.into_prospect().unwrap();
        assert_eq!(prospect.id, "dana-reyes");
        assert_eq!(prospect.name, "Dana Reyes");
        assert_eq!(prospect.title, "VP Engineering at Initech");
        assert_eq!(prospect.company, "Initech");
        assert_eq!(prospect.connection_degree, Some(2));
    }

    #[test]
    fn items_without_profile_url_are_dropped() {
        let raw: RawDirectoryItem = serde_json::from_value(json!({
            "id": "abc",
            "name": "No Url"
        }))
        .unwrap();
        assert!(raw.into_prospect().is_none());
    }

    #[test]
    fn search_response_tolerates_missing_items() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.items.is_empty());
        assert!(body.cursor.is_none());
    }
}

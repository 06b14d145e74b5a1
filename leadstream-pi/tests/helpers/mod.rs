//! Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use leadstream_common::Prospect;
use leadstream_pi::services::{ProspectSource, SourceError, SourcePage};

/// Scripted stand-in for the directory.
///
/// Returns the pre-programmed page results in order; once the script runs
/// out it reports exhaustion (an empty page with no cursor).
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<SourcePage, SourceError>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Result<SourcePage, SourceError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Pages actually requested from the source
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProspectSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _query: &str,
        _cursor: Option<&str>,
        _limit: usize,
    ) -> Result<SourcePage, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .expect("page script poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(SourcePage::default()))
    }
}

pub fn prospect(id: &str) -> Prospect {
    Prospect {
        id: id.to_string(),
        name: format!("Prospect {id}"),
        title: "Head of Sales".to_string(),
        company: "Example Corp".to_string(),
        location: "Lisbon".to_string(),
        profile_url: format!("https://example.com/in/{id}"),
        profile_picture_url: None,
        connection_degree: Some(2),
    }
}

/// A successful page with `n` records and the given continuation cursor
pub fn page(prefix: &str, n: usize, cursor: Option<&str>) -> Result<SourcePage, SourceError> {
    Ok(SourcePage {
        prospects: (0..n).map(|i| prospect(&format!("{prefix}{i}"))).collect(),
        cursor: cursor.map(String::from),
    })
}

//! In-memory search and scrape providers for tests and dry runs

use crate::error::SourceError;
use async_trait::async_trait;
use hcp_domain::{ScrapeProvider, SearchHit, SearchProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SearchState {
    rules: Vec<(String, Result<Vec<SearchHit>, SourceError>)>,
    queries: Vec<String>,
}

/// Search provider answering from a fixed table.
///
/// The first rule whose fragment appears in the query wins; queries
/// matching nothing return no hits.
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    state: Arc<Mutex<SearchState>>,
}

impl StaticSearch {
    /// Create an empty search table
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `hits` for queries containing `fragment`
    pub fn with_hits(self, fragment: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.lock().rules.push((fragment.into(), Ok(hits)));
        self
    }

    /// Fail queries containing `fragment` with `error`
    pub fn with_error(self, fragment: impl Into<String>, error: SourceError) -> Self {
        self.lock().rules.push((fragment.into(), Err(error)));
        self
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    type Error = SourceError;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, Self::Error> {
        let mut state = self.lock();
        state.queries.push(query.to_string());
        let outcome = state
            .rules
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| Ok(Vec::new()));

        outcome.map(|mut hits| {
            hits.truncate(max_results);
            hits
        })
    }
}

#[derive(Debug, Default)]
struct ScrapeState {
    pages: HashMap<String, Result<String, SourceError>>,
    fetched: Vec<String>,
}

/// Scrape provider serving pages from memory.
///
/// Unknown URLs fail with HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct StaticScraper {
    state: Arc<Mutex<ScrapeState>>,
    delay: Option<Duration>,
}

impl StaticScraper {
    /// Create an empty page table
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `url`
    pub fn with_page(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.lock().pages.insert(url.into(), Ok(text.into()));
        self
    }

    /// Fail `url` with `error`
    pub fn with_error(self, url: impl Into<String>, error: SourceError) -> Self {
        self.lock().pages.insert(url.into(), Err(error));
        self
    }

    /// Sleep before every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs requested so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.lock().fetched.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScrapeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ScrapeProvider for StaticScraper {
    type Error = SourceError;

    async fn scrape(&self, url: &str) -> Result<String, Self::Error> {
        let outcome = {
            let mut state = self.lock();
            state.fetched.push(url.to_string());
            state.pages.get(url).cloned()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        outcome.unwrap_or_else(|| {
            Err(SourceError::Http {
                status: 404,
                url: url.to_string(),
            })
        })
    }
}

//! Serper (google.serper.dev) web search

use crate::error::SourceError;
use async_trait::async_trait;
use hcp_domain::{RetryPolicy, SearchHit, SearchProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default Serper endpoint
pub const DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Search region settings sent with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRegion {
    /// Serper `location`
    pub location: String,
    /// Serper `gl` country code
    pub country: String,
    /// Lowercase terms; a query containing none of them gets `suffix` appended
    pub keywords: Vec<String>,
    /// Appended to queries that do not mention the region
    pub suffix: String,
}

impl Default for SearchRegion {
    fn default() -> Self {
        Self {
            location: "United Arab Emirates".to_string(),
            country: "ae".to_string(),
            keywords: ["uae", "dubai", "abu dhabi", "sharjah"]
                .into_iter()
                .map(String::from)
                .collect(),
            suffix: "UAE hospital".to_string(),
        }
    }
}

impl SearchRegion {
    /// Query with the region suffix appended when needed
    pub fn localize(&self, query: &str) -> String {
        let lower = query.to_lowercase();
        if self.keywords.iter().any(|k| lower.contains(k.as_str())) {
            query.to_string()
        } else {
            format!("{} {}", query, self.suffix)
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
    location: &'a str,
    gl: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    organic: Option<Vec<OrganicResult>>,
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    people_also_ask: Vec<PeopleAlsoAsk>,
}

#[derive(Debug, Default, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct PeopleAlsoAsk {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

/// Convert a Serper response into ranked hits.
///
/// Organic results are used whenever the key is present. Otherwise the
/// knowledge graph and "people also ask" entries stand in; the latter have
/// no link and only contribute their snippet.
fn into_hits(response: SearchResponse, max_results: usize) -> Vec<SearchHit> {
    if let Some(organic) = response.organic {
        return organic
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit::new(r.title, r.link, r.snippet))
            .collect();
    }

    let mut hits = Vec::new();
    if let Some(kg) = response.knowledge_graph {
        hits.push(SearchHit::new(kg.title, kg.website, kg.description));
    }
    hits.extend(
        response
            .people_also_ask
            .into_iter()
            .map(|p| SearchHit::new(p.question, String::new(), p.answer)),
    );
    if !hits.is_empty() {
        info!(count = hits.len(), "No organic results, using alternative result types");
    }
    hits.truncate(max_results);
    hits
}

/// Serper search client
pub struct SerperSearch {
    endpoint: String,
    api_key: SecretString,
    region: SearchRegion,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SerperSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperSearch")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("region", &self.region)
            .finish()
    }
}

impl SerperSearch {
    /// Create a client with the default timeout
    ///
    /// # Errors
    ///
    /// `MissingApiKey` if the key is empty.
    pub fn new(api_key: SecretString) -> Result<Self, SourceError> {
        Self::with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(api_key: SecretString, timeout: Duration) -> Result<Self, SourceError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(SourceError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            region: SearchRegion::default(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Use a different endpoint (tests, proxies)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the region settings
    pub fn with_region(mut self, region: SearchRegion) -> Self {
        self.region = region;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SourceError> {
        let body = SearchRequest {
            q: query,
            num: max_results,
            location: &self.region.location,
            gl: &self.region.country,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(&self.endpoint, e))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SourceError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SourceError::from_status(&self.endpoint, status));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::from_reqwest(&self.endpoint, e))?;
        Ok(into_hits(parsed, max_results))
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    type Error = SourceError;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, Self::Error> {
        let query = self.region.localize(query);
        debug!(query = %query, max_results, "Searching with Serper");

        let hits = self
            .retry
            .retry("serper.search", || self.search_once(&query, max_results))
            .await?;

        if hits.is_empty() {
            warn!(query = %query, "No search results found in any category");
        } else {
            info!(query = %query, count = hits.len(), "Search results received");
        }
        Ok(hits)
    }
}

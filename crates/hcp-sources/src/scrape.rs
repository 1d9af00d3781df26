//! HTTP page scraper with HTML to text conversion
//!
//! Static HTML only: there is no JavaScript rendering and PDF documents are
//! reported as unsupported rather than extracted.

use crate::error::SourceError;
use async_trait::async_trait;
use hcp_domain::{ProviderFailure, RetryPolicy, ScrapeProvider};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetch attempts per page, one per browser user agent
pub const DEFAULT_MAX_ATTEMPTS: u32 = USER_AGENTS.len() as u32;

/// Raw response bytes read per page before the rest is dropped
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Main-content text shorter than this falls back to the whole page
const MIN_MAIN_CONTENT_CHARS: usize = 250;

/// Elements whose text never counts as page content
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "header", "footer", "nav", "iframe", "svg",
    "head", "template",
];

const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "#content",
    ".content",
    "article",
    ".article",
    ".post",
    "#main",
    ".main-content",
    ".post-content",
];

static MAIN_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    MAIN_CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Whether `url` points at a PDF document
pub fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".pdf") || path.contains("/pdf/")
}

/// Elements that start a new paragraph in the extracted text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "aside", "ul", "ol", "li", "h1", "h2", "h3", "h4",
    "h5", "h6", "table", "tr", "br", "blockquote", "pre", "address", "dl", "dt", "dd", "form",
];

/// Convert an HTML document to plain text.
///
/// Boilerplate elements are dropped and block elements become paragraphs
/// separated by a blank line. If one of the usual main-content containers
/// holds more than a trivial amount of text only that text is returned,
/// otherwise the text of the whole document.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in MAIN_CONTENT.iter() {
        let mut sink = TextSink::default();
        for element in document.select(selector) {
            sink.collect(element);
            sink.flush();
        }
        let content = sink.finish();
        if content.len() > MIN_MAIN_CONTENT_CHARS {
            return content;
        }
    }

    let mut sink = TextSink::default();
    sink.collect(document.root_element());
    sink.finish()
}

#[derive(Default)]
struct TextSink {
    paragraphs: Vec<String>,
    current: Vec<String>,
}

impl TextSink {
    fn collect(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !line.is_empty() {
                        self.current.push(line);
                    }
                }
                Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
                Node::Element(el) => {
                    let block = BLOCK_ELEMENTS.contains(&el.name());
                    if block {
                        self.flush();
                    }
                    if let Some(child) = ElementRef::wrap(child) {
                        self.collect(child);
                    }
                    if block {
                        self.flush();
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.paragraphs.push(self.current.join(" "));
            self.current.clear();
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.paragraphs.join("\n\n")
    }
}

/// Scraper fetching pages over HTTP
///
/// Each attempt uses the next browser user agent in rotation, since some
/// hospital sites reject unfamiliar clients. Transient failures back off
/// under the retry policy before the next attempt; a 403 switches agent
/// straight away.
pub struct HttpScraper {
    client: reqwest::Client,
    retry: RetryPolicy,
    max_bytes: Option<usize>,
    max_body_bytes: usize,
}

impl HttpScraper {
    /// Create a scraper with the default timeout
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a scraper with a custom per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS),
            max_bytes: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Replace the retry policy; attempts are capped at one per user agent
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Limit how many user agents are tried per page
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Stop reading a response after `max_body_bytes` raw bytes
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes.max(1);
        self
    }

    /// Attempts made per page under the current policy
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.clamp(1, DEFAULT_MAX_ATTEMPTS)
    }

    /// Truncate extracted text to at most `max_bytes` (on a char boundary)
    pub fn with_max_bytes(mut self, max_bytes: Option<usize>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn truncate(&self, mut text: String) -> String {
        if let Some(limit) = self.max_bytes {
            if text.len() > limit {
                let mut cut = limit;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
        }
        text
    }

    async fn fetch_once(&self, url: &str, agent: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(url, status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();

        if content_type.contains("application/pdf") {
            return Err(SourceError::UnsupportedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let body = self.read_body(url, response).await?;

        if content_type.contains("json") || content_type.starts_with("text/plain") {
            Ok(body.trim().to_string())
        } else {
            Ok(html_to_text(&body))
        }
    }

    async fn read_body(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<String, SourceError> {
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?
        {
            if append_capped(&mut body, &chunk, self.max_body_bytes) {
                debug!(url, limit = self.max_body_bytes, "Response body truncated");
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Call `fetch` with one user agent after another until a page comes
    /// back, the error is neither transient nor a 403, or the attempts run
    /// out.
    async fn rotate<F, Fut>(&self, url: &str, mut fetch: F) -> Result<String, SourceError>
    where
        F: FnMut(&'static str) -> Fut,
        Fut: Future<Output = Result<String, SourceError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let agent = USER_AGENTS[attempt as usize % USER_AGENTS.len()];
            let e = match fetch(agent).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            attempt += 1;
            let rejected = matches!(e, SourceError::Http { status: 403, .. });
            if !(e.is_transient() || rejected) || attempt >= max_attempts {
                return Err(e);
            }

            if rejected {
                debug!(url, attempt, error = %e, "Agent rejected, switching user agent");
            } else {
                let delay = self.retry.delay_for(attempt - 1, e.is_rate_limited());
                debug!(
                    url,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "Scrape attempt failed, backing off"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Append `chunk` without letting `body` grow past `cap`; true once full
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() >= cap
}

#[async_trait]
impl ScrapeProvider for HttpScraper {
    type Error = SourceError;

    async fn scrape(&self, url: &str) -> Result<String, Self::Error> {
        let parsed = Url::parse(url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        if is_pdf_url(url) {
            return Err(SourceError::UnsupportedContent {
                url: url.to_string(),
                content_type: "application/pdf".to_string(),
            });
        }

        let text = self
            .rotate(url, |agent| self.fetch_once(url, agent))
            .await?;
        if text.trim().is_empty() {
            return Err(SourceError::EmptyContent(url.to_string()));
        }

        debug!(url, chars = text.len(), "Page scraped");
        Ok(self.truncate(text))
    }
}

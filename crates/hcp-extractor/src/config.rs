//! Configuration for the research pipeline

use hcp_domain::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How an optional LLM-backed stage is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    /// Ask the LLM, falling back to the deterministic procedure on failure
    #[default]
    Llm,
    /// Never call the LLM for this stage
    Deterministic,
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageMode::Llm => f.write_str("llm"),
            StageMode::Deterministic => f.write_str("deterministic"),
        }
    }
}

/// Configuration for one research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Token ceiling per chunk (estimated)
    pub max_tokens: usize,

    /// Concurrent category tasks and concurrent LLM calls
    pub max_workers: usize,

    /// Search results requested per category
    pub results_per_category: usize,

    /// Concurrent page fetches inside one category
    pub scrape_concurrency: usize,

    /// Deadline for one search call, including the provider's own retries
    /// (seconds)
    pub search_timeout_secs: u64,

    /// Deadline for one page fetch, including user agent rotation (seconds)
    pub scrape_timeout_secs: u64,

    /// Deadline for one LLM call, including the provider's own retries
    /// (seconds)
    pub llm_timeout_secs: u64,

    /// Cross-chunk aggregation mode
    pub aggregation: StageMode,

    /// Final coordination mode
    pub coordination: StageMode,

    /// Categories researched for every entity
    pub categories: Vec<Category>,
}

impl PipelineConfig {
    /// Search deadline as a Duration
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Scrape deadline as a Duration
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// LLM deadline as a Duration
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }
        if self.results_per_category == 0 {
            return Err("results_per_category must be greater than 0".to_string());
        }
        if self.scrape_concurrency == 0 {
            return Err("scrape_concurrency must be greater than 0".to_string());
        }
        if self.search_timeout_secs == 0
            || self.scrape_timeout_secs == 0
            || self.llm_timeout_secs == 0
        {
            return Err("timeouts must be greater than 0".to_string());
        }
        if self.categories.is_empty() {
            return Err("at least one category is required".to_string());
        }
        for (i, category) in self.categories.iter().enumerate() {
            if self.categories[..i].contains(category) {
                return Err(format!("category '{}' is listed twice", category));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            max_workers: 10,
            results_per_category: 5,
            scrape_concurrency: 5,
            search_timeout_secs: 120,
            scrape_timeout_secs: 150,
            llm_timeout_secs: 400,
            aggregation: StageMode::Llm,
            coordination: StageMode::Llm,
            categories: Category::ALL.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Aggressive preset: fewer sources, shorter timeouts, no LLM aggregation
    pub fn aggressive() -> Self {
        Self {
            max_tokens: 50_000,
            max_workers: 16,
            results_per_category: 3,
            scrape_concurrency: 8,
            search_timeout_secs: 60,
            scrape_timeout_secs: 60,
            llm_timeout_secs: 240,
            aggregation: StageMode::Deterministic,
            coordination: StageMode::Llm,
            categories: Category::ALL.to_vec(),
        }
    }

    /// Lenient preset: more sources and longer timeouts for better coverage
    pub fn lenient() -> Self {
        Self {
            max_tokens: 100_000,
            max_workers: 6,
            results_per_category: 10,
            scrape_concurrency: 4,
            search_timeout_secs: 240,
            scrape_timeout_secs: 300,
            llm_timeout_secs: 900,
            aggregation: StageMode::Llm,
            coordination: StageMode::Llm,
            categories: Category::ALL.to_vec(),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

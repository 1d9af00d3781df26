//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use hcp_domain::RetryPolicy;
use hcp_extractor::PipelineConfig;
use hcp_sources::SearchRegion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Research pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchSettings,

    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Page fetch settings
    #[serde(default)]
    pub scrape: ScrapeSettings,

    /// Output settings
    #[serde(default)]
    pub settings: Settings,
}

/// Serper search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search API endpoint
    pub endpoint: String,

    /// Attempts per query, including the first
    pub max_retries: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Serper `location`
    pub location: String,

    /// Serper `gl` country code
    pub country: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let region = SearchRegion::default();
        Self {
            endpoint: hcp_sources::serper::DEFAULT_ENDPOINT.to_string(),
            max_retries: 3,
            timeout_secs: hcp_sources::serper::DEFAULT_TIMEOUT_SECS,
            location: region.location,
            country: region.country,
        }
    }
}

impl SearchSettings {
    /// Region sent with every query
    pub fn region(&self) -> SearchRegion {
        SearchRegion {
            location: self.location.clone(),
            country: self.country.clone(),
            ..SearchRegion::default()
        }
    }
}

/// Which LLM backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackendKind {
    /// OpenAI-compatible chat completions API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// LLM provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Backend kind
    pub provider: LlmBackendKind,

    /// Model identifier
    pub model: String,

    /// Server URL; the backend's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Attempts per completion, including the first
    pub max_retries: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmBackendKind::OpenAi,
            model: "gpt-4o".to_string(),
            endpoint: None,
            max_retries: 3,
            timeout_secs: 120,
        }
    }
}

/// Page fetch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Truncate extracted page text to this many bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<usize>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: None,
        }
    }
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl Config {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".hcp-research").join("config.toml"))
    }

    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Self::from_toml(&contents)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline settings and check that every stage deadline
    /// outlasts the worst case of its client's retries.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate().map_err(CliError::Config)?;

        let stages = [
            (
                "search",
                self.pipeline.search_timeout(),
                RetryPolicy::new(self.search.max_retries),
                self.search.timeout_secs,
            ),
            (
                "scrape",
                self.pipeline.scrape_timeout(),
                RetryPolicy::new(hcp_sources::scrape::DEFAULT_MAX_ATTEMPTS),
                self.scrape.timeout_secs,
            ),
            (
                "llm",
                self.pipeline.llm_timeout(),
                RetryPolicy::new(self.llm.max_retries),
                self.llm.timeout_secs,
            ),
        ];

        for (stage, deadline, retry, request_secs) in stages {
            let budget = retry.budget(Duration::from_secs(request_secs));
            if deadline < budget {
                return Err(CliError::Config(format!(
                    "pipeline.{stage}_timeout_secs is {}s, but {} {stage} attempts of {}s \
                     with backoff can take {}s",
                    deadline.as_secs(),
                    retry.max_attempts.max(1),
                    request_secs,
                    budget.as_secs()
                )));
            }
        }
        Ok(())
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize to a TOML document.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

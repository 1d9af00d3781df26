//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential was not supplied
    #[error("Missing API key: {0}")]
    MissingKey(&'static str),

    /// Provider construction failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Research run error
    #[error("Research error: {0}")]
    Pipeline(#[from] hcp_extractor::PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<hcp_llm::LlmError> for CliError {
    fn from(e: hcp_llm::LlmError) -> Self {
        CliError::Provider(e.to_string())
    }
}

impl From<hcp_sources::SourceError> for CliError {
    fn from(e: hcp_sources::SourceError) -> Self {
        CliError::Provider(e.to_string())
    }
}

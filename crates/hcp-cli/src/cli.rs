//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;

/// HCP research - build structured profiles of UAE hospitals and clinics.
#[derive(Debug, Parser)]
#[command(name = "hcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Research a single hospital or clinic
    Research(ResearchArgs),

    /// Research every entity listed in a CSV file
    Batch(BatchArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Credentials shared by the research commands.
#[derive(clap::Args)]
pub struct KeyArgs {
    /// Serper API key
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    serper_key: Option<String>,

    /// OpenAI API key (not needed with the ollama provider)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,
}

impl KeyArgs {
    /// Keys supplied directly, bypassing flags and environment
    pub fn new(serper_key: Option<String>, openai_key: Option<String>) -> Self {
        Self {
            serper_key,
            openai_key,
        }
    }

    /// Serper key, if one was supplied
    pub fn serper_key(&self) -> Option<SecretString> {
        present(&self.serper_key)
    }

    /// OpenAI key, if one was supplied
    pub fn openai_key(&self) -> Option<SecretString> {
        present(&self.openai_key)
    }
}

fn present(key: &Option<String>) -> Option<SecretString> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| SecretString::from(k.to_string()))
}

impl fmt::Debug for KeyArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("KeyArgs")
            .field("serper_key", &redact(&self.serper_key))
            .field("openai_key", &redact(&self.openai_key))
            .finish()
    }
}

/// Arguments for the research command.
#[derive(Debug, clap::Args)]
pub struct ResearchArgs {
    /// Entity name, e.g. "Rashid Hospital"
    pub name: String,

    /// Write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub keys: KeyArgs,
}

/// Arguments for the batch command.
#[derive(Debug, clap::Args)]
pub struct BatchArgs {
    /// CSV file with an "HCP NAME" column
    #[arg(long)]
    pub file: PathBuf,

    /// Write the JSON reports to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub keys: KeyArgs,
}

/// Arguments for the config command.
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

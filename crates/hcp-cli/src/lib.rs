//! HCP research CLI library
//!
//! Command-line front end for the research pipeline: one entity or a CSV
//! batch, TOML configuration, JSON or table output.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod providers;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;

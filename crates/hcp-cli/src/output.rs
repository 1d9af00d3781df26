//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use hcp_domain::{Confidence, EntityRecord};
use hcp_extractor::{BatchOutcome, CategoryStatus, Coordination, ResearchReport};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format one research report.
    pub fn format_report(&self, report: &ResearchReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Table => Ok(self.format_report_table(report)),
        }
    }

    /// Format the outcomes of a batch run.
    pub fn format_batch(&self, outcomes: &[BatchOutcome]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcomes)?),
            OutputFormat::Table => Ok(self.format_batch_table(outcomes)),
        }
    }

    fn format_report_table(&self, report: &ResearchReport) -> String {
        let mut sections = vec![self.colorize(
            &format!(
                "{} ({}, {} ms, model {})",
                report.entity, report.state, report.elapsed_ms, report.model
            ),
            "cyan",
        )];

        match &report.coordination {
            Coordination::Integrated(record) => sections.push(self.record_table(record)),
            Coordination::Unparsed {
                raw_results, error, ..
            } => {
                sections.push(self.warning(error));
                let mut builder = Builder::default();
                builder.push_record(["Field", "Most common", "Count", "Sources"]);
                for (field, result) in raw_results {
                    builder.push_record([
                        field.clone(),
                        result.most_common.value.clone(),
                        result.most_common.count.to_string(),
                        result.most_common.source_urls.join("\n"),
                    ]);
                }
                sections.push(styled(builder));
            }
        }

        for (category, category_report) in report.failed_categories() {
            if let CategoryStatus::Failed { stage, reason } = &category_report.status {
                sections.push(self.warning(&format!(
                    "{} failed while {}: {}",
                    category.field_name(),
                    stage,
                    reason
                )));
            }
        }

        sections.join("\n")
    }

    fn record_table(&self, record: &EntityRecord) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value", "Confidence", "Sources", "Alternatives"]);

        for (field, value) in record.iter() {
            let alternatives: Vec<&str> = value
                .alternatives
                .iter()
                .map(|a| a.value.as_str())
                .collect();
            builder.push_record([
                field.to_string(),
                value.value.clone(),
                self.confidence(value.confidence),
                value.source_urls.join("\n"),
                alternatives.join("; "),
            ]);
        }

        styled(builder)
    }

    fn format_batch_table(&self, outcomes: &[BatchOutcome]) -> String {
        if outcomes.is_empty() {
            return self.colorize("No entities researched.", "yellow");
        }

        let mut sections = Vec::new();
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Researched(report) => {
                    sections.push(self.format_report_table(report));
                }
                BatchOutcome::Failed(failure) => {
                    sections.push(self.error(&format!("{}: {}", failure.name, failure.error)));
                }
            }
        }

        let researched = outcomes.iter().filter(|o| o.is_researched()).count();
        sections.push(self.info(&format!(
            "{} of {} entities researched",
            researched,
            outcomes.len()
        )));
        sections.join("\n\n")
    }

    fn confidence(&self, confidence: Confidence) -> String {
        let color = match confidence {
            Confidence::High => "green",
            Confidence::Medium => "yellow",
            Confidence::Low => "red",
        };
        self.colorize(confidence.as_str(), color)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn styled(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

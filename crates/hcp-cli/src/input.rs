//! Batch input: entity names from a CSV file.

use crate::error::{CliError, Result};
use std::io::Read;
use std::path::Path;

/// Header of the name column, matched case-insensitively
pub const NAME_COLUMN: &str = "HCP NAME";

/// Read entity names from the `HCP NAME` column of a CSV file.
pub fn read_names(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    parse_names(file)
}

/// Read entity names from CSV data. Blank cells are skipped; surrounding
/// whitespace is trimmed.
pub fn parse_names<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(NAME_COLUMN))
        .ok_or_else(|| {
            CliError::InvalidInput(format!("CSV file has no '{}' column", NAME_COLUMN))
        })?;

    let mut names = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(name) = row.get(column).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

//! Parse LLM output into candidates, aggregated results and records
//!
//! Collaborator output is not guaranteed to be bare JSON. Every stage goes
//! through [`lenient_json`], which is the only place that tolerates prose or
//! code fences around the payload. The shape of the payload is then
//! checked strictly by the stage-specific parser.

use hcp_domain::{AggregatedResult, Candidate};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::warn;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is valid")
});

/// Why a collaborator response could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// No JSON value could be recovered
    NotJson,
    /// A JSON value where an object was required
    NotAnObject(&'static str),
    /// JSON object of the wrong shape
    WrongShape(String),
    /// Well-formed but failed validation
    Invalid(String),
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::NotJson => f.write_str("response contains no parseable JSON"),
            ResponseError::NotAnObject(kind) => write!(f, "expected a JSON object, got {}", kind),
            ResponseError::WrongShape(msg) => write!(f, "unexpected JSON shape: {}", msg),
            ResponseError::Invalid(msg) => write!(f, "invalid result: {}", msg),
        }
    }
}

/// Recover a JSON value from a collaborator response.
///
/// Tried in order: the whole response; the contents of each fenced code
/// block; the span from the first `{` to the last `}`.
pub fn lenient_json(response: &str) -> Result<Value, ResponseError> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    for captures in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str(body.as_str().trim()) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(ResponseError::NotJson)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a chunk extraction response into candidates.
///
/// Expects `{"chunk_results": [{"value", "source_url"}, ...]}`. Items
/// without a usable value are skipped individually; numeric values are
/// accepted and rendered as text.
pub fn parse_chunk_response(response: &str) -> Result<Vec<Candidate>, ResponseError> {
    let json = lenient_json(response)?;
    let results = json
        .get("chunk_results")
        .ok_or_else(|| ResponseError::WrongShape("missing 'chunk_results'".to_string()))?
        .as_array()
        .ok_or_else(|| ResponseError::WrongShape("'chunk_results' is not an array".to_string()))?;

    let mut candidates = Vec::with_capacity(results.len());
    for (idx, item) in results.iter().enumerate() {
        let Some(value) = item.get("value").and_then(scalar_text) else {
            warn!(item = idx, "Skipping chunk result without a value");
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }
        let source_url = item
            .get("source_url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        candidates.push(Candidate::new(value, source_url));
    }
    Ok(candidates)
}

/// Parse and validate an aggregation response.
///
/// `candidate_total` is the number of candidates the collaborator was
/// given; results claiming a larger count are rejected.
pub fn parse_aggregation_response(
    response: &str,
    candidate_total: usize,
) -> Result<AggregatedResult, ResponseError> {
    let json = lenient_json(response)?;
    if !json.is_object() {
        return Err(ResponseError::NotAnObject(json_type(&json)));
    }
    let result: AggregatedResult =
        serde_json::from_value(json).map_err(|e| ResponseError::WrongShape(e.to_string()))?;
    result
        .validate(candidate_total)
        .map_err(ResponseError::Invalid)?;
    Ok(result)
}

/// Parse a coordination response into its top-level field map
pub fn parse_coordination_response(response: &str) -> Result<Map<String, Value>, ResponseError> {
    match lenient_json(response)? {
        Value::Object(map) => Ok(map),
        other => Err(ResponseError::NotAnObject(json_type(&other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

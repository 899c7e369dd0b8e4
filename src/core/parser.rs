//! Response repair and parsing
//!
//! Model output is expected to be a JSON array with one object per record,
//! but often arrives wrapped in prose or code fences. Parsing is tried on the
//! raw text first, then once on the outermost delimited span.

use crate::core::types::EnrichmentResult;
use serde_json::Value;

/// Result of interpreting one response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The raw text parsed as-is
    Parsed(Vec<EnrichmentResult>),
    /// Parsed after trimming to the outermost `[...]` or `{...}`
    Repaired(Vec<EnrichmentResult>),
    /// Neither attempt produced records
    Failed(String),
}

/// Parses provider text into records shaped by a fixed field list
#[derive(Debug, Clone)]
pub struct ResponseParser {
    fields: Vec<String>,
}

impl ResponseParser {
    /// Create a parser projecting onto `fields`
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Parse `raw`, repairing once if needed
    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let strict_err = match self.parse_strict(raw.trim()) {
            Ok(results) => return ParseOutcome::Parsed(results),
            Err(e) => e,
        };

        let Some(span) = outermost_span(raw) else {
            return ParseOutcome::Failed(format!("no JSON array or object found: {}", strict_err));
        };

        match self.parse_strict(span) {
            Ok(results) => ParseOutcome::Repaired(results),
            Err(e) => ParseOutcome::Failed(format!("repair failed: {}", e)),
        }
    }

    fn parse_strict(&self, text: &str) -> Result<Vec<EnrichmentResult>, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let names = || self.fields.iter().map(String::as_str);

        match value {
            Value::Array(items) => Ok(items
                .iter()
                .map(|item| match item {
                    Value::Object(object) => EnrichmentResult::project(object, names()),
                    _ => EnrichmentResult::absent(names()),
                })
                .collect()),
            Value::Object(object) => Ok(vec![EnrichmentResult::project(&object, names())]),
            other => Err(format!("expected array or object, got {}", kind(&other))),
        }
    }
}

/// Span from the first `[` or `{` to the last matching closer
fn outermost_span(raw: &str) -> Option<&str> {
    let open = raw.find(['[', '{'])?;
    let close_char = if raw[open..].starts_with('[') { ']' } else { '}' };
    let close = raw.rfind(close_char)?;
    (close > open).then(|| &raw[open..=close])
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

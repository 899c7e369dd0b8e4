//! Data model shared by every pipeline stage

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

static NULL: Value = Value::Null;

/// One input row: ordered column → scalar value, plus its original position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Zero-based row position in the source table
    pub index: usize,
    /// Column values in source column order
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record from `(column, value)` pairs
    pub fn new(index: usize, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            index,
            fields: fields.into_iter().collect(),
        }
    }

    /// Value of `column`, `Null` when absent
    pub fn get(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&NULL)
    }
}

/// Contiguous slice of records sent to the provider as one request
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based position in dispatch order
    pub index: usize,
    /// First covered row position (inclusive)
    pub start: usize,
    /// One past the last covered row position
    pub end: usize,
    /// Records in row order
    pub records: Vec<Record>,
}

impl Batch {
    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Absolute row range for reporting: first and one-past-last record index
    pub fn row_range(&self) -> (usize, usize) {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => (first.index, last.index + 1),
            _ => (self.start, self.end),
        }
    }
}

/// Structured fields derived for one record
///
/// A field mapped to `Null` is an explicit absence marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Output field → value
    pub fields: Map<String, Value>,
}

impl EnrichmentResult {
    /// Result with every named field marked absent
    pub fn absent<'a>(field_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: field_names
                .into_iter()
                .map(|name| (name.to_string(), Value::Null))
                .collect(),
        }
    }

    /// Keep only `field_names`, in that order, filling missing ones with `Null`
    pub fn project<'a>(
        object: &Map<String, Value>,
        field_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            fields: field_names
                .into_iter()
                .map(|name| {
                    let value = object.get(name).cloned().unwrap_or(Value::Null);
                    (name.to_string(), value)
                })
                .collect(),
        }
    }

    /// Value of `field`, `Null` when absent
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }
}

/// Token and timing telemetry for one batch's provider call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Prompt tokens, as reported by the provider
    pub input_tokens: Option<u64>,
    /// Completion tokens, as reported by the provider
    pub output_tokens: Option<u64>,
    /// Total tokens, as reported by the provider
    pub total_tokens: Option<u64>,
    /// Wall-clock seconds spent on the call
    pub duration_secs: f64,
    /// Failure description, set only for failed batches
    pub error: Option<String>,
}

impl UsageInfo {
    /// Usage for a failed batch: no token counts, only timing and cause
    pub fn failed(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            duration_secs: duration.as_secs_f64(),
            error: Some(error.into()),
        }
    }

    /// Whether the batch failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One output line: the source record plus its enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// Source record
    pub record: Record,
    /// Aligned enrichment; `None` renders every enrichment field as null
    pub enrichment: Option<EnrichmentResult>,
}

impl OutputRow {
    /// Cell values for `columns` followed by `fields`
    pub fn values<'a>(
        &'a self,
        columns: &'a [String],
        fields: &'a [String],
    ) -> impl Iterator<Item = &'a Value> + 'a {
        let enrichment = self.enrichment.as_ref();
        columns.iter().map(|c| self.record.get(c)).chain(
            fields
                .iter()
                .map(move |f| enrichment.map(|e| e.get(f)).unwrap_or(&NULL)),
        )
    }
}

/// What a scheduler task hands to the accumulator
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Which batch completed
    pub batch_index: usize,
    /// Parsed results, empty on failure
    pub results: Vec<EnrichmentResult>,
    /// Always present, even on failure
    pub usage: UsageInfo,
    /// Number of attempts made against the provider
    pub attempts: u32,
}

impl BatchOutcome {
    /// Outcome of a failed batch
    pub fn failed(
        batch_index: usize,
        duration: Duration,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            batch_index,
            results: Vec::new(),
            usage: UsageInfo::failed(duration, error),
            attempts,
        }
    }
}

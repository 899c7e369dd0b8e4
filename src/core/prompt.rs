//! Prompt rendering for candidate batches

use crate::core::types::Batch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default system message sent alongside every prompt
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a precise JSON generator for candidate summaries.";

const PROFILE_SEPARATOR: &str = "\n\n---\n\n";

/// One field the model must return per candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    /// JSON key in the response object and column name in the output
    pub name: String,
    /// Semantic constraint shown to the model
    pub description: String,
}

impl OutputField {
    /// Field `name`, described to the model by `description`
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// `Summary` and `Career_Goals`
pub fn default_output_fields() -> Vec<OutputField> {
    vec![
        OutputField::new(
            "Summary",
            "A concise, factual, one-sentence summary (max ~100 words) describing their \
             professional and educational background only.",
        ),
        OutputField::new(
            "Career_Goals",
            "A short (<=100 words) summary of their intended next career steps based on the \
             \"Path to impact\" field.",
        ),
    ]
}

/// Renders a batch into one request payload
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    fields: Vec<OutputField>,
    system_message: String,
}

impl PromptBuilder {
    /// Create a builder for the given output schema
    pub fn new(fields: Vec<OutputField>, system_message: impl Into<String>) -> Self {
        Self {
            fields,
            system_message: system_message.into(),
        }
    }

    /// Output schema, in column order
    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    /// Output field names, in column order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// System message for the provider
    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    /// Render the user prompt for `batch`
    ///
    /// Records appear in batch order; each lists its columns in source order.
    pub fn build(&self, batch: &Batch) -> String {
        let profiles = batch
            .records
            .iter()
            .map(|record| {
                record
                    .fields
                    .iter()
                    .map(|(column, value)| format!("**{}**: {}", column, render_value(value)))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join(PROFILE_SEPARATOR);

        let schema = self
            .fields
            .iter()
            .map(|f| format!("- \"{}\": {}", f.name, f.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a data summarization model. For each candidate below, return a JSON list \
where each element corresponds to one candidate.

Each element should be an object with the following keys:
{schema}

DO NOT infer or mention race, religion, color, national origin, gender, sexual orientation, \
or any other legally protected status.
Do not guess or add information that isn't present. Be neutral and factual.
There are {count} candidates. Return only valid JSON: a list of exactly {count} objects, \
one per candidate, in the order given.

Candidate Profiles:
{profiles}
",
            schema = schema,
            count = batch.len(),
            profiles = profiles,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(default_output_fields(), DEFAULT_SYSTEM_MESSAGE)
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "nan".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

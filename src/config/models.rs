//! Configuration data structures

use crate::core::prompt::{DEFAULT_SYSTEM_MESSAGE, OutputField, default_output_fields};
use crate::utils::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which provider API the adapter speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Chat Completions
    #[default]
    OpenAI,
    /// Anthropic Messages
    Anthropic,
}

impl ProviderKind {
    /// Production base URL
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Provider connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's production URL
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAI,
            api_key: String::new(),
            model: "gpt-5".to_string(),
            base_url: None,
            max_tokens: Some(2000),
            temperature: None,
        }
    }
}

// api_key stays out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Input table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: Option<PathBuf>,
    /// Dropped at load; never prompted, never written
    pub excluded_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: None,
            excluded_columns: vec![
                "Name".to_string(),
                "Email".to_string(),
                "Data sharing consent".to_string(),
            ],
        }
    }
}

/// Output artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Snapshot rewritten after every batch
    pub path: PathBuf,
    /// Append-only usage log
    pub usage_log: PathBuf,
    /// Seed the run with rows from an existing snapshot
    pub resume: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("llm_results.csv"),
            usage_log: PathBuf::from("token_log.csv"),
            resume: true,
        }
    }
}

/// Prompt settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system_message: String,
    /// Output schema, in column order
    pub fields: Vec<OutputField>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            fields: default_output_fields(),
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub row_start: Option<usize>,
    pub row_end: Option<usize>,
    /// Per-attempt deadline on the provider call
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub provider: ProviderConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub prompt: PromptConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl EnrichConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 3,
            row_start: None,
            row_end: None,
            request_timeout_secs: 120,
            max_retries: 2,
            retry_delay_ms: 1000,
            provider: ProviderConfig::default(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            prompt: PromptConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

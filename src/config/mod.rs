//! Configuration management for the pipeline
//!
//! Precedence: defaults, then the YAML file, then environment variables,
//! then command line flags (applied by the binary).

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{EnrichError, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

impl EnrichConfig {
    /// Load configuration from a YAML file, without validating
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            EnrichError::InvalidConfiguration(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, without validating
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            EnrichError::InvalidConfiguration(format!("Failed to parse config: {}", e))
        })
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| env::var(key).ok())
    }

    /// Overlay values from `lookup`
    ///
    /// Recognized keys are `ENRICH_*`; provider keys also fall back to the
    /// conventional `OPENAI_API_KEY`/`OPEN_API_KEY` and
    /// `ANTHROPIC_API_KEY`/`CLAUDE_API_KEY` variables.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!("Applying environment overrides");

        if let Some(v) = lookup("ENRICH_BATCH_SIZE") {
            self.batch_size = parse_var("ENRICH_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("ENRICH_CONCURRENCY") {
            self.concurrency = parse_var("ENRICH_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("ENRICH_ROW_START") {
            self.row_start = Some(parse_var("ENRICH_ROW_START", &v)?);
        }
        if let Some(v) = lookup("ENRICH_ROW_END") {
            self.row_end = Some(parse_var("ENRICH_ROW_END", &v)?);
        }
        if let Some(v) = lookup("ENRICH_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("ENRICH_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ENRICH_MAX_RETRIES") {
            self.max_retries = parse_var("ENRICH_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("ENRICH_PROVIDER") {
            self.provider.kind = ProviderKind::from_str(&v).map_err(EnrichError::InvalidConfiguration)?;
        }
        if let Some(v) = lookup("ENRICH_MODEL") {
            self.provider.model = v;
        }
        if let Some(v) = lookup("ENRICH_BASE_URL") {
            self.provider.base_url = Some(v);
        }
        if let Some(v) = lookup("ENRICH_OUTPUT") {
            self.output.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ENRICH_USAGE_LOG") {
            self.output.usage_log = PathBuf::from(v);
        }
        if let Some(v) = lookup("ENRICH_LOG_LEVEL") {
            self.log_level = v;
        }

        let key_vars: &[&str] = match self.provider.kind {
            ProviderKind::OpenAI => &["ENRICH_API_KEY", "OPENAI_API_KEY", "OPEN_API_KEY"],
            ProviderKind::Anthropic => &["ENRICH_API_KEY", "ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        };
        if self.provider.api_key.is_empty() {
            if let Some(key) = key_vars.iter().find_map(|var| lookup(var)) {
                self.provider.api_key = key;
            }
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        EnrichError::InvalidConfiguration(format!("Invalid {}: {}", name, e))
    })
}

//! Configuration validation
//!
//! Every violation is reported as `InvalidConfiguration` before anything is dispatched.

use super::models::*;
use crate::utils::error::{EnrichError, Result};
use std::collections::HashSet;
use tracing::debug;

/// Trait for validating configuration
pub trait Validate {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;
}

impl Validate for EnrichConfig {
    fn validate(&self) -> Result<()> {
        debug!("Validating enrichment configuration");

        if self.batch_size == 0 {
            return Err(invalid("batch_size must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be greater than 0"));
        }
        if let (Some(start), Some(end)) = (self.row_start, self.row_end) {
            if start > end {
                return Err(invalid(format!(
                    "row_start ({}) must not exceed row_end ({})",
                    start, end
                )));
            }
        }

        self.provider.validate()?;
        self.prompt.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(invalid(format!("missing {:?} API key", self.kind)));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("provider model name cannot be empty"));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!(
                    "provider base_url must use http:// or https://, got: {}",
                    url
                )));
            }
        }
        if self.kind == ProviderKind::Anthropic && self.max_tokens.is_none() {
            return Err(invalid("anthropic requires provider.max_tokens"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid(format!("temperature {} outside 0.0..=2.0", t)));
            }
        }
        Ok(())
    }
}

impl Validate for PromptConfig {
    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(invalid("prompt.fields must name at least one output field"));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("output field names cannot be empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate output field: {}", field.name)));
            }
        }
        Ok(())
    }
}

impl Validate for OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() || self.usage_log.as_os_str().is_empty() {
            return Err(invalid("output paths cannot be empty"));
        }
        if self.path == self.usage_log {
            return Err(invalid("output.path and output.usage_log must differ"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> EnrichError {
    EnrichError::InvalidConfiguration(message.into())
}

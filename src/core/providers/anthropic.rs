//! Anthropic Messages adapter

use super::{Completion, LlmClient, http_client, post_json};
use crate::config::ProviderConfig;
use crate::core::types::UsageInfo;
use crate::utils::error::{EnrichError, Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Client for `/v1/messages`
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_message: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicClient {
    /// Build a client with `system_message` as the top-level system prompt
    ///
    /// `max_tokens` falls back to 2000, since the Messages API requires it.
    pub fn new(config: &ProviderConfig, system_message: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(config.api_key.trim()).map_err(|_| {
                EnrichError::InvalidConfiguration("invalid Anthropic API key".to_string())
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: http_client(headers, timeout)?,
            endpoint: format!("{}/v1/messages", config.base_url()),
            model: config.model.clone(),
            system_message: system_message.to_string(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn submit(&self, prompt: &str) -> std::result::Result<Completion, TransportError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &self.system_message,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!("Calling Anthropic API: {}", self.endpoint);
        let (parsed, duration): (MessagesResponse, _) =
            post_json(&self.client, &self.endpoint, &request, "Anthropic").await?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        let usage = parsed.usage.unwrap_or_default();
        // Anthropic reports no total; derive it only from reported parts
        let total_tokens = match (usage.input_tokens, usage.output_tokens) {
            (Some(i), Some(o)) => Some(i + o),
            _ => None,
        };

        Ok(Completion {
            text,
            usage: UsageInfo {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens,
                duration_secs: duration.as_secs_f64(),
                error: None,
            },
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

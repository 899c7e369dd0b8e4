//! OpenAI Chat Completions adapter

use super::{Completion, LlmClient, http_client, post_json};
use crate::config::ProviderConfig;
use crate::core::types::UsageInfo;
use crate::utils::error::{EnrichError, Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for `/v1/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_message: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAIClient {
    /// Build a client sending `system_message` ahead of every prompt
    ///
    /// `timeout` is the scheduler's per-attempt deadline; the HTTP client is
    /// given a slightly longer one. Fails if the API key is not a valid header.
    pub fn new(config: &ProviderConfig, system_message: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| {
                EnrichError::InvalidConfiguration("invalid OpenAI API key".to_string())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: http_client(headers, timeout)?,
            endpoint: format!("{}/v1/chat/completions", config.base_url()),
            model: config.model.clone(),
            system_message: system_message.to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn submit(&self, prompt: &str) -> std::result::Result<Completion, TransportError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_message,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_completion_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Calling OpenAI API: {}", self.endpoint);
        let (parsed, duration): (ChatResponse, _) =
            post_json(&self.client, &self.endpoint, &request, "OpenAI").await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();
        let usage = parsed.usage.unwrap_or_default();

        Ok(Completion {
            text,
            usage: UsageInfo {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                duration_secs: duration.as_secs_f64(),
                error: None,
            },
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

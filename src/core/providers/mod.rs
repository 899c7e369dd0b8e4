//! LLM client adapters
//!
//! Each adapter wraps exactly one provider call. Adapters never retry and
//! never enforce deadlines; the scheduler owns both.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAIClient;

use crate::config::{ProviderConfig, ProviderKind};
use crate::core::types::UsageInfo;
use crate::utils::error::{EnrichError, Result, TransportError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Raw provider reply for one prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Unstructured response text
    pub text: String,
    /// Provider-reported token counts plus measured duration
    pub usage: UsageInfo,
}

/// Capability interface over a text-generation provider
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Provider identifier for logs
    fn name(&self) -> &str;

    /// Send one prompt and return the raw reply
    ///
    /// Token counts are `None` whenever the provider did not report them.
    async fn submit(&self, prompt: &str) -> std::result::Result<Completion, TransportError>;
}

/// Build the adapter selected by `config.kind`
pub fn build_client(
    config: &ProviderConfig,
    system_message: &str,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.kind {
        ProviderKind::OpenAI => Arc::new(OpenAIClient::new(config, system_message, timeout)?),
        ProviderKind::Anthropic => {
            Arc::new(AnthropicClient::new(config, system_message, timeout)?)
        }
    };
    Ok(client)
}

/// Shared reqwest client construction
///
/// The client-level timeout sits just above the scheduler deadline so a
/// stuck socket is eventually released even if the caller stops polling.
pub(crate) fn http_client(
    headers: reqwest::header::HeaderMap,
    timeout: Duration,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout + Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| {
            EnrichError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
        })
}

/// Turn a non-success response into a `TransportError`
async fn error_for_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(TransportError::http(status.as_u16(), body))
}

/// POST `body` as JSON and decode the reply
///
/// Returns the decoded body with the time the call took. Every error carries
/// that time too.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    endpoint: &str,
    body: &B,
    provider: &str,
) -> std::result::Result<(R, Duration), TransportError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let started = Instant::now();
    let attempt = async {
        let response = client.post(endpoint).json(body).send().await?;
        let response = error_for_status(response).await?;
        response.json::<R>().await.map_err(|e| {
            TransportError::new(format!("failed to decode {} response: {}", provider, e), false)
        })
    };

    match attempt.await {
        Ok(parsed) => Ok((parsed, started.elapsed())),
        Err(e) => Err(e.with_duration(started.elapsed())),
    }
}

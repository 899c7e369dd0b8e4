//! Error handling for the enrichment pipeline
//!
//! Batch-local failures (transport, parse, alignment) are converted to data at
//! the task boundary. Only configuration, input and persistence errors abort a run.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum EnrichError {
    /// Rejected before any dispatch
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Provider call failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response text could not be turned into records
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// Snapshot or usage log could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Input table could not be read
    #[error("Input error: {0}")]
    Input(String),
}

/// Failure talking to the LLM provider
///
/// `retryable` is advisory; the scheduler decides whether to try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Human readable cause
    pub message: String,
    /// HTTP status, when the provider answered
    pub status: Option<u16>,
    /// Whether another attempt might succeed
    pub retryable: bool,
    /// Time spent on the failed call, when the adapter measured it
    pub duration: Option<Duration>,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status: None,
            retryable,
            duration: None,
        }
    }

    /// Non-success HTTP status. 429 and 5xx are retryable.
    pub fn http(status: u16, body: impl AsRef<str>) -> Self {
        let retryable = status == 429 || (500..600).contains(&status);
        Self {
            message: format!("HTTP {}: {}", status, body.as_ref()),
            status: Some(status),
            retryable,
            duration: None,
        }
    }

    /// The call did not finish within the per-request deadline
    pub fn timeout(after: Duration) -> Self {
        Self::new(format!("request timed out after {:?}", after), true).with_duration(after)
    }

    /// Attach the measured call duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            retryable,
            duration: None,
        }
    }
}

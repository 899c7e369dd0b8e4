//! Bounded-concurrency batch scheduling
//!
//! One task per batch, admitted in ascending batch index, at most
//! `concurrency` in flight. Completions are yielded in the order they finish.

use crate::core::parser::{ParseOutcome, ResponseParser};
use crate::core::prompt::PromptBuilder;
use crate::core::providers::{Completion, LlmClient};
use crate::core::types::{Batch, BatchOutcome, UsageInfo};
use crate::utils::error::{EnrichError, TransportError};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, warn};

/// Scheduling knobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum batches in flight (default: 3)
    pub concurrency: usize,
    /// Deadline per provider attempt (default: 120s)
    pub timeout: Duration,
    /// Extra attempts for retryable transport errors (default: 2)
    pub max_retries: u32,
    /// Base delay between attempts, doubled each time (default: 1s)
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            timeout: Duration::from_secs(120),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set timeout per attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base retry delay
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let capped = attempt.saturating_sub(1).min(5);
        self.retry_delay * (1u32 << capped)
    }
}

/// Runs prompt → submit → parse for every batch
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    config: SchedulerConfig,
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptBuilder>,
    parser: Arc<ResponseParser>,
}

impl BatchScheduler {
    /// Create a scheduler over `client`
    pub fn new(config: SchedulerConfig, client: Arc<dyn LlmClient>, prompts: PromptBuilder) -> Self {
        let parser = ResponseParser::new(prompts.field_names());
        Self {
            config,
            client,
            prompts: Arc::new(prompts),
            parser: Arc::new(parser),
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Dispatch `batches` and yield each outcome as it completes
    ///
    /// Once `cancel` fires no further batch is admitted; batches already in
    /// flight run to completion and are still yielded. Every task runs on its
    /// own tokio task, so in-flight calls keep progressing while the consumer
    /// is busy persisting, and a panicking task becomes a failed outcome.
    /// Dropping the stream aborts every task still in flight.
    pub fn run(
        &self,
        batches: Vec<Arc<Batch>>,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchOutcome> {
        let scheduler = self.clone();
        let concurrency = self.config.concurrency.max(1);

        stream::iter(batches)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |batch| {
                let worker = scheduler.clone();
                let index = batch.index;
                let admitted = Instant::now();
                debug!(batch = index, "admitting batch");
                let handle = AbortOnDropHandle::new(tokio::spawn(async move {
                    worker.execute_batch(&batch).await
                }));

                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!("❌ Batch {} task aborted: {}", index, e);
                            BatchOutcome::failed(
                                index,
                                admitted.elapsed(),
                                0,
                                format!("task aborted: {}", e),
                            )
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .boxed()
    }

    /// Process one batch; never fails, errors become a failed outcome
    pub async fn execute_batch(&self, batch: &Batch) -> BatchOutcome {
        let started = Instant::now();
        let prompt = self.prompts.build(batch);

        let (completion, attempts) = match self.submit_with_retry(batch.index, &prompt).await {
            Ok(done) => done,
            Err((e, attempts)) => {
                error!(call_duration = ?e.duration, "❌ Error in batch {}: {}", batch.index, e);
                return BatchOutcome::failed(
                    batch.index,
                    started.elapsed(),
                    attempts,
                    EnrichError::from(e).to_string(),
                );
            }
        };

        let Completion { text, usage } = completion;
        let results = match self.parser.parse(&text) {
            ParseOutcome::Parsed(results) => results,
            ParseOutcome::Repaired(results) => {
                warn!("⚠️ JSON parse failed for batch {}, recovered by cleanup", batch.index);
                results
            }
            ParseOutcome::Failed(reason) => {
                error!("❌ Unparseable response for batch {}: {}", batch.index, reason);
                return BatchOutcome {
                    batch_index: batch.index,
                    results: Vec::new(),
                    usage: UsageInfo {
                        error: Some(EnrichError::ParseFailure(reason).to_string()),
                        ..usage
                    },
                    attempts,
                };
            }
        };

        BatchOutcome {
            batch_index: batch.index,
            results,
            usage,
            attempts,
        }
    }

    async fn submit_with_retry(
        &self,
        batch_index: usize,
        prompt: &str,
    ) -> Result<(Completion, u32), (TransportError, u32)> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.config.timeout, self.client.submit(prompt))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::timeout(self.config.timeout)),
            };

            match result {
                Ok(completion) => return Ok((completion, attempt)),
                Err(e) if e.retryable && attempt <= self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        call_duration = ?e.duration,
                        "⚠️ Batch {} attempt {} failed ({}), retrying in {:?}",
                        batch_index, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

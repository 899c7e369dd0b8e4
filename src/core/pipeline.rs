//! End-to-end enrichment run
//!
//! Wires partitioning, prompting, scheduling and accumulation together.

use crate::config::{EnrichConfig, Validate};
use crate::core::accumulator::ResultAccumulator;
use crate::core::batch::{BatchScheduler, SchedulerConfig, partition, select_rows};
use crate::core::prompt::PromptBuilder;
use crate::core::providers::{LlmClient, build_client};
use crate::storage::{Table, read_csv};
use crate::utils::error::{EnrichError, Result};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Batches the selection was partitioned into
    pub total_batches: usize,
    /// Batches recorded without error
    pub succeeded: usize,
    /// Batches recorded with an error
    pub failed: usize,
    /// Batches never dispatched because the run was cancelled
    pub skipped: usize,
    /// Rows in the final snapshot, resumed rows included
    pub rows_written: usize,
    /// Reported input tokens, failed batches included
    pub input_tokens: u64,
    /// Reported output tokens
    pub output_tokens: u64,
    /// Reported total tokens; batches without a total add nothing
    pub total_tokens: u64,
    /// Wall-clock time of the whole run
    pub elapsed: Duration,
    /// Snapshot location
    pub output_path: PathBuf,
    /// Usage log location
    pub usage_log: PathBuf,
}

impl RunSummary {
    /// Whether any batch was left out of the snapshot by cancellation
    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }
}

/// Configured pipeline, ready to run
#[derive(Debug)]
pub struct EnrichmentPipeline {
    config: EnrichConfig,
    client: Arc<dyn LlmClient>,
}

impl EnrichmentPipeline {
    /// Validate `config` and build its provider adapter
    pub fn new(config: EnrichConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(
            &config.provider,
            &config.prompt.system_message,
            config.request_timeout(),
        )?;
        Ok(Self { config, client })
    }

    /// Validate `config` and use `client` instead of a built-in adapter
    pub fn with_client(config: EnrichConfig, client: Arc<dyn LlmClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Get current configuration
    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Read `path` and run over it
    pub async fn run_file(
        &self,
        path: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let table = read_csv(path, &self.config.input.excluded_columns)?;
        self.run(table, cancel).await
    }

    /// Enrich `table`
    ///
    /// Batch-local failures end up in the artifacts and the summary. The
    /// returned error is reserved for configuration and persistence failures;
    /// on a persistence failure `cancel` is triggered so nothing else is
    /// admitted, and calls still in flight are aborted.
    pub async fn run(&self, table: Table, cancel: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let config = &self.config;

        let Table { columns, records } = table.without_columns(&config.input.excluded_columns);
        let selected = select_rows(records, config.row_start, config.row_end);
        let batches = partition(&selected, config.batch_size)?;
        drop(selected);

        let prompts = PromptBuilder::new(
            config.prompt.fields.clone(),
            config.prompt.system_message.clone(),
        );
        let fields = prompts.field_names();

        let (output_path, usage_log, resume) = (
            config.output.path.clone(),
            config.output.usage_log.clone(),
            config.output.resume,
        );
        let mut accumulator = blocking(move || -> Result<ResultAccumulator> {
            let accumulator =
                ResultAccumulator::open(columns, fields, output_path, usage_log, resume)?;
            // fail on an unwritable output before anything is dispatched
            accumulator.flush()?;
            Ok(accumulator)
        })
        .await??;

        let total_batches = batches.len();
        info!(
            "🚀 Starting {} batches with {} via {} (size {}, concurrency {})",
            total_batches,
            config.provider.model,
            self.client.name(),
            config.batch_size,
            config.concurrency
        );

        let scheduler = BatchScheduler::new(
            SchedulerConfig::new()
                .with_concurrency(config.concurrency)
                .with_timeout(config.request_timeout())
                .with_max_retries(config.max_retries)
                .with_retry_delay(config.retry_delay()),
            self.client.clone(),
            prompts,
        );

        let batches: Vec<_> = batches.into_iter().map(Arc::new).collect();
        let by_index: HashMap<usize, _> = batches.iter().map(|b| (b.index, b.clone())).collect();

        let mut summary = RunSummary {
            total_batches,
            output_path: config.output.path.clone(),
            usage_log: config.output.usage_log.clone(),
            ..RunSummary::default()
        };

        let mut outcomes = scheduler.run(batches, cancel.clone());
        while let Some(outcome) = outcomes.next().await {
            let Some(batch) = by_index.get(&outcome.batch_index) else {
                warn!("Outcome for unknown batch {} ignored", outcome.batch_index);
                continue;
            };
            let (row_start, row_end) = batch.row_range();

            match &outcome.usage.error {
                None => {
                    summary.succeeded += 1;
                    info!(
                        "✅ Completed batch {} (rows {}-{}) in {:.2}s, {} tokens",
                        outcome.batch_index,
                        row_start,
                        row_end,
                        outcome.usage.duration_secs,
                        outcome
                            .usage
                            .total_tokens
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "?".to_string())
                    );
                }
                Some(reason) => {
                    summary.failed += 1;
                    error!(
                        "❌ Batch {} (rows {}-{}) failed after {} attempt(s): {}",
                        outcome.batch_index, row_start, row_end, outcome.attempts, reason
                    );
                }
            }
            summary.input_tokens += outcome.usage.input_tokens.unwrap_or(0);
            summary.output_tokens += outcome.usage.output_tokens.unwrap_or(0);
            summary.total_tokens += outcome.usage.total_tokens.unwrap_or(0);

            let batch = Arc::clone(batch);
            let stored = blocking(move || {
                let recorded = accumulator.record(&batch, outcome);
                (accumulator, recorded)
            })
            .await
            .and_then(|(accumulator, recorded)| recorded.map(|_| accumulator));

            accumulator = match stored {
                Ok(accumulator) => accumulator,
                Err(e) => {
                    error!("❌ Could not persist batch results, stopping: {}", e);
                    cancel.cancel();
                    return Err(match e {
                        EnrichError::Persistence(_) => e,
                        other => EnrichError::Persistence(other.to_string()),
                    });
                }
            };
        }

        summary.skipped = total_batches - summary.succeeded - summary.failed;
        summary.rows_written = accumulator.row_count();
        summary.elapsed = started.elapsed();

        if summary.was_cancelled() {
            warn!(
                "🛑 Run cancelled, {} of {} batches never dispatched",
                summary.skipped, total_batches
            );
        }
        info!(
            "🏁 Finished: {} ok, {} failed, {} rows in {:?} ({:.1}s)",
            summary.succeeded,
            summary.failed,
            summary.rows_written,
            summary.output_path,
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }
}

/// Run snapshot and usage log I/O on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EnrichError::Persistence(format!("storage task failed: {}", e)))
}

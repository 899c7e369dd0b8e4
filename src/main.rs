//! batch-enrich - LLM enrichment of tabular records
//!
//! Reads a CSV table, enriches every row through the configured provider and
//! writes the output snapshot plus a per-batch usage log.

#![allow(missing_docs)]

use batch_enrich::config::{EnrichConfig, ProviderKind};
use batch_enrich::utils::logging::{LogFormat, init_logging};
use batch_enrich::{EnrichError, EnrichmentPipeline, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config/enrich.yaml";

/// Enrich table rows with LLM-generated fields
#[derive(Debug, Parser)]
#[command(name = "enrich", version, about)]
struct Cli {
    /// YAML configuration file (defaults to config/enrich.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV table
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output snapshot path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Usage log path
    #[arg(long)]
    usage_log: Option<PathBuf>,

    /// Records per provider request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Maximum provider requests in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// First row to process (inclusive)
    #[arg(long)]
    row_start: Option<usize>,

    /// Row to stop at (exclusive)
    #[arg(long)]
    row_end: Option<usize>,

    /// Provider: openai or anthropic
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Provider API key
    #[arg(long, env = "ENRICH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Ignore any existing output snapshot
    #[arg(long)]
    no_resume: bool,

    /// Log level or tracing filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    async fn load_config(&self) -> Result<EnrichConfig> {
        let mut config = match &self.config {
            Some(path) => EnrichConfig::from_file(path).await?,
            None if PathBuf::from(DEFAULT_CONFIG).exists() => {
                EnrichConfig::from_file(DEFAULT_CONFIG).await?
            }
            None => EnrichConfig::default(),
        };
        config.apply_env()?;

        if let Some(path) = &self.input {
            config.input.path = Some(path.clone());
        }
        if let Some(path) = &self.output {
            config.output.path = path.clone();
        }
        if let Some(path) = &self.usage_log {
            config.output.usage_log = path.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.row_start.is_some() {
            config.row_start = self.row_start;
        }
        if self.row_end.is_some() {
            config.row_end = self.row_end;
        }
        if let Some(kind) = self.provider {
            config.provider.kind = kind;
        }
        if let Some(model) = &self.model {
            config.provider.model = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.provider.api_key = key.clone();
        }
        if self.no_resume {
            config.output.resume = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => warn!("Received Ctrl+C, finishing in-flight batches"),
                Err(e) => {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                    warn!("Received terminate signal, finishing in-flight batches");
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        token.cancel();
    });
}

async fn run(cli: Cli) -> Result<bool> {
    let config = cli.load_config().await?;
    init_logging(&config.log_level, config.log_format)?;

    let input = config.input.path.clone().ok_or_else(|| {
        EnrichError::InvalidConfiguration(
            "no input table given (use --input or input.path)".to_string(),
        )
    })?;

    let pipeline = EnrichmentPipeline::new(config)?;
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let summary = pipeline.run_file(&input, cancel).await?;

    info!(
        "📊 Tokens: {} in, {} out, {} total",
        summary.input_tokens, summary.output_tokens, summary.total_tokens
    );
    println!("Results saved to {}", summary.output_path.display());
    println!("Usage log saved to {}", summary.usage_log.display());
    println!(
        "{} of {} batches succeeded, {} failed, {} not dispatched",
        summary.succeeded, summary.total_batches, summary.failed, summary.skipped
    );

    Ok(!summary.was_cancelled())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        // interrupted runs leave a valid but partial snapshot
        Ok(false) => ExitCode::from(130),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

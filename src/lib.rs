//! # batch-enrich
//!
//! Enrich the rows of a table with structured fields generated by an LLM.
//!
//! ## Features
//!
//! - **Bounded concurrency**: at most `concurrency` provider calls in flight
//! - **Failure containment**: a failed batch yields null fields and a usage log entry, never an aborted run
//! - **Crash-safe output**: the snapshot is rewritten after every batch and always parses
//! - **Response repair**: prose around a JSON array is stripped before giving up
//! - **OpenAI and Anthropic**: one adapter per provider behind a single trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_enrich::{EnrichConfig, EnrichmentPipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = EnrichConfig::from_file("config/enrich.yaml").await?;
//!     config.apply_env()?;
//!
//!     let pipeline = EnrichmentPipeline::new(config)?;
//!     let summary = pipeline
//!         .run_file("candidates.csv", CancellationToken::new())
//!         .await?;
//!
//!     println!("{} rows written to {:?}", summary.rows_written, summary.output_path);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::{EnrichConfig, Validate};
pub use utils::error::{EnrichError, Result, TransportError};

pub use core::batch::{BatchScheduler, SchedulerConfig, partition, select_rows};
pub use core::parser::{ParseOutcome, ResponseParser};
pub use core::pipeline::{EnrichmentPipeline, RunSummary};
pub use core::prompt::{OutputField, PromptBuilder};
pub use core::providers::{Completion, LlmClient, build_client};
pub use core::types::{Batch, BatchOutcome, EnrichmentResult, OutputRow, Record, UsageInfo};
pub use storage::{Table, read_csv};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

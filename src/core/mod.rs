//! Core functionality for the pipeline
//!
//! Data model, prompt rendering, provider adapters, response repair,
//! batch scheduling and result accumulation.

pub mod accumulator;
pub mod batch;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod types;

pub use accumulator::ResultAccumulator;
pub use pipeline::{EnrichmentPipeline, RunSummary};

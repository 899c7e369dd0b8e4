//! Common test utilities for batch-enrich
//!
//! - Scripted provider with concurrency instrumentation
//! - Table and configuration fixtures
//! - Readers for the output snapshot and usage log

pub mod fixtures;

// Re-export commonly used items
pub use assertions::{Artifacts, UsageRow};
pub use fixtures::{TableFactory, TestWorkspace};
pub use providers::MockClient;

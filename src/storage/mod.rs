//! Storage layer for the pipeline
//!
//! CSV input, the rewritten output snapshot and the append-only usage log.

/// Output snapshot and usage log
pub mod snapshot;
/// Input table reader
pub mod table;

pub use snapshot::{Snapshot, USAGE_LOG_HEADER, UsageLog, UsageLogEntry, cell, read_snapshot, write_snapshot};
pub use table::{Table, read_csv};

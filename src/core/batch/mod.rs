//! Batch partitioning and concurrent dispatch
//!
//! This module splits the record set into batches and runs one provider
//! request per batch under a concurrency ceiling.

mod partition;
mod scheduler;


// Re-export all public types
pub use partition::{partition, select_rows};
pub use scheduler::{BatchScheduler, SchedulerConfig};

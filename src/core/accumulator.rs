//! Result accumulation and persistence
//!
//! Completed batches are merged with their source rows and the whole
//! snapshot is rewritten after each one. Rows are ordered by batch index
//! regardless of completion order; resumed rows always come first.
//!
//! `record` takes `&mut self`, so there is exactly one writer of the
//! snapshot and usage log for the lifetime of a run.

use crate::core::types::{Batch, BatchOutcome, EnrichmentResult, OutputRow};
use crate::storage::{UsageLog, UsageLogEntry, cell, read_snapshot, write_snapshot};
use crate::utils::error::{EnrichError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Pad or truncate `results` to the batch size
///
/// Returns the aligned rows and, when counts differed, the number of
/// results actually received.
pub fn align(batch: &Batch, results: Vec<EnrichmentResult>) -> (Vec<OutputRow>, Option<usize>) {
    let received = results.len();
    let mismatch = (received != batch.len()).then_some(received);

    let mut results = results.into_iter();
    let rows = batch
        .records
        .iter()
        .map(|record| OutputRow {
            record: record.clone(),
            enrichment: results.next(),
        })
        .collect();
    (rows, mismatch)
}

/// What happened when a batch was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    /// Rows now in the snapshot
    pub snapshot_rows: usize,
    /// Results received, when it differed from the batch size
    pub mismatch: Option<usize>,
}

/// Owns the output snapshot and usage log for one run
#[derive(Debug)]
pub struct ResultAccumulator {
    columns: Vec<String>,
    fields: Vec<String>,
    resumed: Vec<Vec<String>>,
    completed: BTreeMap<usize, Vec<OutputRow>>,
    output_path: PathBuf,
    usage_log: UsageLog,
}

impl ResultAccumulator {
    /// Open the artifacts
    ///
    /// With `resume`, rows of an existing snapshot seed the accumulator; its
    /// header must equal `columns` followed by `fields`.
    pub fn open(
        columns: Vec<String>,
        fields: Vec<String>,
        output_path: impl Into<PathBuf>,
        usage_log_path: impl Into<PathBuf>,
        resume: bool,
    ) -> Result<Self> {
        if let Some(clash) = fields.iter().find(|f| columns.contains(f)) {
            return Err(EnrichError::InvalidConfiguration(format!(
                "output field '{}' collides with an input column",
                clash
            )));
        }

        let output_path = output_path.into();
        let header: Vec<String> = columns.iter().chain(fields.iter()).cloned().collect();

        // without resume the old file is overwritten unread
        let resumed = if resume {
            match read_snapshot(&output_path)? {
                Some(snapshot) if !snapshot.header.is_empty() => {
                    if snapshot.header != header {
                        return Err(EnrichError::InvalidConfiguration(format!(
                            "existing output {:?} has columns {:?}, expected {:?}",
                            output_path, snapshot.header, header
                        )));
                    }
                    info!(
                        "♻️ Resuming with {} rows from {:?}",
                        snapshot.rows.len(),
                        output_path
                    );
                    snapshot.rows
                }
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            columns,
            fields,
            resumed,
            completed: BTreeMap::new(),
            output_path,
            usage_log: UsageLog::open(usage_log_path)?,
        })
    }

    /// Output header: input columns then enrichment fields
    pub fn header(&self) -> Vec<String> {
        self.columns.iter().chain(self.fields.iter()).cloned().collect()
    }

    /// Rows currently held, resumed ones included
    pub fn row_count(&self) -> usize {
        self.resumed.len() + self.completed.values().map(Vec::len).sum::<usize>()
    }

    /// Rows carried over from a previous run
    pub fn resumed_rows(&self) -> usize {
        self.resumed.len()
    }

    /// Snapshot location
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Usage log location
    pub fn usage_log_path(&self) -> &Path {
        self.usage_log.path()
    }

    /// Merge one completed batch, rewrite the snapshot, append a usage line
    ///
    /// A persistence error means the batch is not durable; the caller must
    /// stop the run.
    pub fn record(&mut self, batch: &Batch, outcome: BatchOutcome) -> Result<Recorded> {
        let failed = outcome.usage.is_error();
        let (rows, mismatch) = align(batch, outcome.results);

        let mismatch = if failed { None } else { mismatch };
        if let Some(received) = mismatch {
            warn!(
                "⚠️ Batch {} returned {} results for {} rows, aligned to the first {}",
                batch.index,
                received,
                batch.len(),
                received.min(batch.len())
            );
        }

        if self.completed.insert(batch.index, rows).is_some() {
            warn!("Batch {} recorded twice, keeping the latest", batch.index);
        }

        self.flush()?;

        let (batch_start, batch_end) = batch.row_range();
        self.usage_log.append(&UsageLogEntry {
            timestamp: Utc::now(),
            batch_start,
            batch_end,
            usage: outcome.usage,
        })?;

        Ok(Recorded {
            snapshot_rows: self.row_count(),
            mismatch,
        })
    }

    /// Rewrite the snapshot with everything held so far
    pub fn flush(&self) -> Result<()> {
        let header = self.header();
        let completed = self.completed.values().flatten().map(|row| {
            row.values(&self.columns, &self.fields)
                .map(cell)
                .collect::<Vec<_>>()
        });
        let rows = self.resumed.iter().cloned().chain(completed);
        write_snapshot(&self.output_path, &header, rows)
    }
}

//! Batch partitioning

use crate::core::types::{Batch, Record};
use crate::utils::error::{EnrichError, Result};

/// Split `records` into contiguous batches of at most `batch_size`
///
/// Batches cover `[0, B), [B, 2B), ...` over the given sequence; the last one
/// holds the remainder. An empty input yields no batches.
pub fn partition(records: &[Record], batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(EnrichError::InvalidConfiguration(
            "batch size must be greater than 0".to_string(),
        ));
    }

    Ok(records
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| {
            let start = index * batch_size;
            Batch {
                index,
                start,
                end: start + chunk.len(),
                records: chunk.to_vec(),
            }
        })
        .collect())
}

/// Restrict `records` to the half-open position range `[row_start, row_end)`
///
/// Bounds past the end are clamped.
pub fn select_rows(
    records: Vec<Record>,
    row_start: Option<usize>,
    row_end: Option<usize>,
) -> Vec<Record> {
    let len = records.len();
    let start = row_start.unwrap_or(0).min(len);
    let end = row_end.unwrap_or(len).clamp(start, len);
    records
        .into_iter()
        .skip(start)
        .take(end - start)
        .collect()
}

//! CSV input reader
//!
//! The pipeline trusts the header order read here for prompt alignment.

use crate::core::types::Record;
use crate::utils::error::{EnrichError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows plus their declared column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names in source order
    pub columns: Vec<String>,
    /// One record per data row
    pub records: Vec<Record>,
}

impl Table {
    /// Build a table from in-memory rows, keeping `columns` order
    ///
    /// Repeated column names are renamed as in [`read_csv`].
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = disambiguate(columns);
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(index, values)| Record::new(index, columns.iter().cloned().zip(values)))
            .collect();
        Self { columns, records }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop `excluded` columns from the header and every record
    pub fn without_columns(mut self, excluded: &[String]) -> Self {
        self.columns.retain(|c| !excluded.contains(c));
        for record in &mut self.records {
            record.fields.retain(|c, _| !excluded.contains(c));
        }
        self
    }
}

/// Read a CSV file with a header row
///
/// Empty cells become `Null`; everything else is kept as text. A repeated
/// header name gets a numeric suffix (`Notes`, `Notes.1`, `Notes.2`) so no
/// column is lost.
pub fn read_csv<P: AsRef<Path>>(path: P, excluded: &[String]) -> Result<Table> {
    let path = path.as_ref();
    info!("📄 Reading input table: {:?}", path);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| EnrichError::Input(format!("cannot open {:?}: {}", path, e)))?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| EnrichError::Input(format!("cannot read header of {:?}: {}", path, e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let columns = disambiguate(columns);

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| EnrichError::Input(format!("row {}: {}", index, e)))?;
        let fields = columns.iter().enumerate().map(|(i, column)| {
            let value = match row.get(i) {
                Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                _ => Value::Null,
            };
            (column.clone(), value)
        });
        records.push(Record::new(index, fields));
    }

    debug!("Read {} rows with {} columns", records.len(), columns.len());
    Ok(Table { columns, records }.without_columns(excluded))
}

/// Rename repeats of an earlier column name to `name.N`, skipping taken names
fn disambiguate(columns: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut repeats: HashMap<String, usize> = HashMap::new();

    columns
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let n = repeats.entry(name.clone()).or_insert(0);
            let renamed = loop {
                *n += 1;
                let candidate = format!("{}.{}", name, n);
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            warn!("⚠️ Duplicate column {:?} renamed to {:?}", name, renamed);
            taken.insert(renamed.clone());
            renamed
        })
        .collect()
}

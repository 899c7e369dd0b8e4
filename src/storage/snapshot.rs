//! Durable artifacts: the output snapshot and the usage log

use crate::core::types::UsageInfo;
use crate::utils::error::{EnrichError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Usage log header, in column order
pub const USAGE_LOG_HEADER: [&str; 8] = [
    "timestamp",
    "batch_start",
    "batch_end",
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "duration_sec",
    "error",
];

/// Render one cell; `Null` is the empty string, nested values are compact JSON
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Previously written snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Load the snapshot at `path`, `None` if it does not exist
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| persistence(path, e))?;
    let header = reader
        .headers()
        .map_err(|e| persistence(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|row| row.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<std::result::Result<Vec<Vec<String>>, _>>()
        .map_err(|e| persistence(path, e))?;

    Ok(Some(Snapshot { header, rows }))
}

/// Replace the snapshot at `path` with `header` + `rows`
///
/// Writes a temporary sibling and renames it over the target, so a reader
/// sees either the previous snapshot or the new one, never a partial file.
pub fn write_snapshot<I>(path: &Path, header: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| persistence(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| persistence(path, e))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(header).map_err(|e| persistence(path, e))?;
        for row in rows {
            writer.write_record(&row).map_err(|e| persistence(path, e))?;
        }
        writer.flush().map_err(|e| persistence(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| persistence(path, e))?;
    tmp.persist(path).map_err(|e| persistence(path, e.error))?;

    debug!("Snapshot rewritten: {:?}", path);
    Ok(())
}

/// One usage log line
#[derive(Debug, Clone, PartialEq)]
pub struct UsageLogEntry {
    pub timestamp: DateTime<Utc>,
    pub batch_start: usize,
    pub batch_end: usize,
    pub usage: UsageInfo,
}

impl UsageLogEntry {
    fn to_record(&self) -> [String; 8] {
        let opt = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        [
            self.timestamp.to_rfc3339(),
            self.batch_start.to_string(),
            self.batch_end.to_string(),
            opt(self.usage.input_tokens),
            opt(self.usage.output_tokens),
            opt(self.usage.total_tokens),
            format!("{:.2}", self.usage.duration_secs),
            self.usage.error.clone().unwrap_or_default(),
        ]
    }
}

/// Append-only CSV usage log
#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    /// Open the log, writing the header if the file is new or empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| persistence(&path, e))?;
        }

        let is_empty = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if is_empty {
            info!("📝 Creating usage log: {:?}", path);
            let log = Self { path };
            log.append_record(&USAGE_LOG_HEADER.map(str::to_string))?;
            return Ok(log);
        }
        Ok(Self { path })
    }

    /// Location of the log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and sync it to disk
    pub fn append(&self, entry: &UsageLogEntry) -> Result<()> {
        self.append_record(&entry.to_record())
    }

    fn append_record(&self, record: &[String]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(record)
            .map_err(|e| persistence(&self.path, e))?;
        let mut file = writer
            .into_inner()
            .map_err(|e| persistence(&self.path, e.error()))?;
        file.flush().map_err(|e| persistence(&self.path, e))?;
        file.sync_data().map_err(|e| persistence(&self.path, e))?;
        Ok(())
    }
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> EnrichError {
    EnrichError::Persistence(format!("{:?}: {}", path, err))
}

//! Append-only generation history (spec §3 `HistoryRecord`, §6.3).
//!
//! Writes are mutex-serialized appends; readers tolerate a concurrently
//! written tail by parsing line by line and stopping at the last
//! complete record, matching the teacher's "L2 file cache" tolerance
//! policy (spec §5 Shared-resource policy) applied to JSON-lines instead
//! of CSV.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp_utc: DateTime<Utc>,
    pub location_id: String,
    pub llm_provider: String,
    pub success: bool,
    pub weather_text: Option<String>,
    pub advice_text: Option<String>,
    pub error: Option<String>,
}

/// A single append-only JSON-lines history file with a serializing
/// writer lock, mirroring spec §5's "History file: mutex-serialized
/// append; readers tolerate concurrent writers by line-buffered parse."
#[derive(Clone)]
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, record: &HistoryRecord) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(record).unwrap_or_default();
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }

    /// Last `limit` records, oldest first dropped, newest last.
    pub async fn read_recent(&self, limit: usize) -> std::io::Result<Vec<HistoryRecord>> {
        read_recent(&self.path, limit).await
    }
}

pub async fn read_recent(path: &Path, limit: usize) -> std::io::Result<Vec<HistoryRecord>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // Tolerate a partially written tail: stop at the first line that
        // fails to parse rather than erroring the whole read.
        match serde_json::from_str::<HistoryRecord>(&line) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
    }
    if records.len() > limit {
        let start = records.len() - limit;
        records.drain(..start);
    }
    Ok(records)
}

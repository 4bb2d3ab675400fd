//! Key-value store backends for session records
//!
//! The registry only needs `get`, `set` with a time-to-live and `delete`.
//! Expired entries behave exactly like absent ones and are removed by
//! [`KvStore::purge_expired`], which [`spawn_expiry_sweep`] runs on an
//! interval. The memory backend also sweeps on every write.
//!
//! # Backends
//!
//! - [`MemoryKvStore`]: process-local map, lost on restart
//! - [`FileKvStore`]: one JSON file per key, written atomically
//!   (temp file + rename), survives restarts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{KakomcpError, Result};

/// Persisted key-value collaborator
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Upsert `value`; the entry expires `ttl` after this write
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Remove `key`; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop every expired entry and return how many were removed
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Run [`KvStore::purge_expired`] every `every` until the store is dropped
pub fn spawn_expiry_sweep(store: &Arc<dyn KvStore>, every: Duration) -> JoinHandle<()> {
    let store = Arc::downgrade(store);
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(live) = store.upgrade() else {
                debug!("session store dropped, stopping expiry sweep");
                break;
            };
            match live.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired session records"),
                Err(e) => warn!(error = %e, "session store sweep failed"),
            }
        }
    })
}

/// In-memory store with per-entry expiry
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries held, expired ones included
    pub fn retained(&self) -> usize {
        self.entries.lock().len()
    }

    fn sweep(entries: &mut HashMap<String, (Value, Instant)>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries, now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(Self::sweep(&mut self.entries.lock(), Instant::now()))
    }
}

/// On-disk entry layout
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Directory-backed store: `<dir>/<encoded key>.json`
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open (and create if needed) the store directory, dropping entries
    /// that expired while nothing was running
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let store = Self { dir };
        let removed = store.purge_expired().await?;
        if removed > 0 {
            info!(removed, dir = %store.dir.display(), "purged expired session records");
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    async fn write_atomic(path: &Path, entry: &FileEntry) -> Result<()> {
        // Unique temp name so concurrent writers of one key never share it
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let content = serde_json::to_vec(entry)?;
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Whether the entry file at `path` is expired or unreadable
    async fn is_stale(path: &Path, now: DateTime<Utc>) -> Result<bool> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            // Removed concurrently
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(match serde_json::from_slice::<FileEntry>(&content) {
            Ok(entry) => entry.expires_at <= now,
            Err(_) => true,
        })
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable session store entry");
                self.delete(key).await?;
                return Ok(None);
            }
        };

        if entry.expires_at <= Utc::now() {
            debug!(key, "session store entry expired");
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| KakomcpError::Store {
            message: format!("ttl out of range: {}", e),
        })?;
        let entry = FileEntry {
            value,
            expires_at: Utc::now() + ttl,
        };
        Self::write_atomic(&self.entry_path(key), &entry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        remove_if_present(&self.entry_path(key)).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if Self::is_stale(&path, now).await? {
                remove_if_present(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Percent-encoded key; the result has no path separators
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

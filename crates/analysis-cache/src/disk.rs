//! On-Disk Cache Tier
//!
//! A JSON index document plus one blob file per key, named by a hash of
//! the key so unsafe characters never reach the filesystem. Every read
//! and write is best-effort: failures degrade to misses, never surface.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::key::blob_file_name;
use crate::models::TierStats;

pub const INDEX_FILE: &str = "index.json";

/// A disk hit carries the expiry forward so promotion into the memory
/// tier keeps the original lifetime.
#[derive(Debug, Clone)]
pub struct DiskHit {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    file: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskIndex {
    entries: HashMap<String, IndexRecord>,
}

impl DiskIndex {
    fn total_bytes(&self) -> u64 {
        self.entries.values().map(|record| record.size_bytes).sum()
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, record)| record.created_at)
            .map(|(key, _)| key.clone())
    }
}

struct DiskInner {
    index: DiskIndex,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

pub struct DiskCache {
    dir: PathBuf,
    max_bytes: u64,
    inner: Mutex<DiskInner>,
}

impl DiskCache {
    /// Open (or create) the cache directory and load its index. A
    /// corrupt index is discarded and rebuilt empty rather than failing.
    pub fn open(dir: impl Into<PathBuf>, max_bytes: u64) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            match load_index(&index_path) {
                Ok(index) => index,
                Err(err) => {
                    warn!(error = %err, "cache index unreadable, starting empty");
                    DiskIndex::default()
                }
            }
        } else {
            DiskIndex::default()
        };

        Ok(Self {
            dir,
            max_bytes,
            inner: Mutex::new(DiskInner {
                index,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up a value. Expired or blob-missing entries are misses that
    /// also clean up their index record.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<DiskHit> {
        let mut inner = self.lock();
        let Some(record) = inner.index.entries.get(key).cloned() else {
            inner.misses += 1;
            return None;
        };

        if record.expires_at.is_some_and(|expires_at| now >= expires_at) {
            inner.index.entries.remove(key);
            self.remove_blob(&record.file);
            inner.expirations += 1;
            inner.misses += 1;
            self.persist_index(&inner.index);
            return None;
        }

        match fs::read_to_string(self.dir.join(&record.file)) {
            Ok(value) => {
                inner.hits += 1;
                Some(DiskHit {
                    value,
                    expires_at: record.expires_at,
                })
            }
            Err(err) => {
                warn!(error = %err, key, "cache blob unreadable, dropping index record");
                inner.index.entries.remove(key);
                inner.misses += 1;
                self.persist_index(&inner.index);
                None
            }
        }
    }

    /// Write a value, evicting the globally oldest entries (by
    /// `created_at`) until the new one fits in the byte budget.
    pub fn set_at(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        let size_bytes = value.len() as u64;
        if size_bytes > self.max_bytes {
            warn!(key, size_bytes, "value exceeds the disk cache budget, not cached");
            return;
        }

        let mut inner = self.lock();
        if let Some(old) = inner.index.entries.remove(key) {
            self.remove_blob(&old.file);
        }
        while inner.index.total_bytes() + size_bytes > self.max_bytes {
            let Some(oldest) = inner.index.oldest_key() else {
                break;
            };
            if let Some(record) = inner.index.entries.remove(&oldest) {
                self.remove_blob(&record.file);
            }
            inner.evictions += 1;
            debug!(key = %oldest, "disk cache evicted oldest entry");
        }

        let file = blob_file_name(key);
        if let Err(err) = fs::write(self.dir.join(&file), value) {
            warn!(error = %err, key, "disk cache write failed");
            self.persist_index(&inner.index);
            return;
        }
        inner.index.entries.insert(
            key.to_string(),
            IndexRecord {
                file,
                size_bytes,
                created_at: now,
                expires_at,
            },
        );
        self.persist_index(&inner.index);
    }

    /// Remove one key, deleting its blob. Returns whether a record existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock();
        match inner.index.entries.remove(key) {
            Some(record) => {
                self.remove_blob(&record.file);
                self.persist_index(&inner.index);
                true
            }
            None => false,
        }
    }

    /// Remove every key starting with `prefix`, returning the count removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let matching: Vec<String> = inner
            .index
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &matching {
            if let Some(record) = inner.index.entries.remove(key) {
                self.remove_blob(&record.file);
            }
        }
        if !matching.is_empty() {
            self.persist_index(&inner.index);
        }
        matching.len()
    }

    pub fn stats(&self) -> TierStats {
        let inner = self.lock();
        TierStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            entries: inner.index.entries.len() as u64,
            total_bytes: inner.index.total_bytes(),
        }
    }

    fn persist_index(&self, index: &DiskIndex) {
        let result = serde_json::to_string_pretty(index)
            .map_err(CacheError::from)
            .and_then(|text| {
                fs::write(self.dir.join(INDEX_FILE), text).map_err(CacheError::from)
            });
        if let Err(err) = result {
            warn!(error = %err, "failed to persist cache index");
        }
    }

    fn remove_blob(&self, file: &str) {
        if let Err(err) = fs::remove_file(self.dir.join(file)) {
            if err.kind() != ErrorKind::NotFound {
                warn!(error = %err, file, "failed to remove cache blob");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, DiskInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_index(path: &Path) -> CacheResult<DiskIndex> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

//! Tiered Cache
//!
//! Memory in front of disk. Reads check memory first and promote disk
//! hits; writes land in both tiers best-effort. Either tier can be
//! disabled and the cache degrades gracefully.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::disk::DiskCache;
use crate::error::CacheResult;
use crate::memory::MemoryCache;
use crate::models::{CacheLimits, TierStats};

/// Counter snapshots for both tiers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory: TierStats,
    pub disk: TierStats,
}

/// The process-wide analysis cache. Constructed explicitly by the
/// application bootstrap and handed to whoever needs it; there is no
/// global instance.
pub struct TieredAnalysisCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TieredAnalysisCache {
    /// Open the cache under `dir` with the configured bounds. The
    /// directory is only touched when the disk tier is enabled.
    pub fn open(dir: &Path, limits: CacheLimits) -> CacheResult<Self> {
        let memory = limits
            .memory_enabled
            .then(|| MemoryCache::new(limits.memory_max_entries, limits.memory_max_bytes));
        let disk = if limits.disk_enabled {
            Some(DiskCache::open(dir, limits.disk_max_bytes)?)
        } else {
            None
        };
        Ok(Self { memory, disk })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    /// Clock-injected lookup. A disk hit is promoted into the memory
    /// tier with its original expiry before being returned.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        if let Some(memory) = &self.memory {
            if let Some(value) = memory.get_at(key, now) {
                return Some(value);
            }
        }
        if let Some(disk) = &self.disk {
            if let Some(hit) = disk.get_at(key, now) {
                if let Some(memory) = &self.memory {
                    memory.set_at(key, hit.value.clone(), hit.expires_at, now);
                }
                return Some(hit.value);
            }
        }
        None
    }

    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Utc::now());
    }

    /// Clock-injected write to both enabled tiers.
    pub fn set_at(&self, key: &str, value: &str, ttl: Option<Duration>, now: DateTime<Utc>) {
        let expires_at = ttl.map(|ttl| now + ttl);
        if let Some(memory) = &self.memory {
            memory.set_at(key, value.to_string(), expires_at, now);
        }
        if let Some(disk) = &self.disk {
            disk.set_at(key, value, expires_at, now);
        }
    }

    /// Remove one key from both tiers. True if either tier held it.
    pub fn invalidate(&self, key: &str) -> bool {
        let memory_hit = self.memory.as_ref().is_some_and(|m| m.invalidate(key));
        let disk_hit = self.disk.as_ref().is_some_and(|d| d.invalidate(key));
        memory_hit || disk_hit
    }

    /// Remove every key starting with `prefix` from both tiers. Returns
    /// the removal count of the fuller tier (tiers usually mirror each
    /// other, so summing would double-count).
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let memory_count = self
            .memory
            .as_ref()
            .map_or(0, |m| m.invalidate_prefix(prefix));
        let disk_count = self.disk.as_ref().map_or(0, |d| d.invalidate_prefix(prefix));
        memory_count.max(disk_count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory: self.memory.as_ref().map(|m| m.stats()).unwrap_or_default(),
            disk: self.disk.as_ref().map(|d| d.stats()).unwrap_or_default(),
        }
    }
}

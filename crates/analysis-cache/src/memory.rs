//! In-Memory Cache Tier
//!
//! Strict LRU bounded by both entry count and total bytes. All reads
//! mutate recency metadata, so every operation goes through one mutex.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{CacheEntry, TierStats};

pub struct MemoryCache {
    max_entries: usize,
    max_bytes: usize,
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, CacheEntry>,
    /// Recency queue: front = least recently used, back = most recent
    order: VecDeque<String>,
    total_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl MemoryInner {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(position) = self.order.iter().position(|k| k == key) {
            self.order.remove(position);
        }
        self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn mark_recent(&mut self, key: &str) {
        if let Some(position) = self.order.iter().position(|k| k == key) {
            self.order.remove(position);
        }
        self.order.push_back(key.to_string());
    }
}

impl MemoryCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    /// Look up a value, treating expired entries as misses and removing
    /// them. A hit bumps access metadata and moves the entry to the
    /// most-recently-used end.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut inner = self.lock();
        let expired = inner.entries.get(key).map(|entry| entry.is_expired(now));
        match expired {
            None => {
                inner.misses += 1;
                None
            }
            Some(true) => {
                inner.remove_entry(key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            }
            Some(false) => {
                inner.mark_recent(key);
                inner.hits += 1;
                let entry = inner.entries.get_mut(key)?;
                entry.touch(now);
                Some(entry.value.clone())
            }
        }
    }

    /// Insert or replace a value, then evict from the least-recently-used
    /// end until both the entry and byte bounds hold.
    pub fn set_at(
        &self,
        key: &str,
        value: String,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry::new(key, value, now, expires_at);
        let mut inner = self.lock();
        inner.remove_entry(key);
        inner.total_bytes += entry.size_bytes;
        inner.entries.insert(key.to_string(), entry);
        inner.order.push_back(key.to_string());

        while inner.order.len() > self.max_entries || inner.total_bytes > self.max_bytes {
            let Some(oldest) = inner.order.front().cloned() else {
                break;
            };
            inner.remove_entry(&oldest);
            inner.evictions += 1;
            debug!(key = %oldest, "memory cache evicted oldest entry");
        }
    }

    /// Remove one key. Returns whether an entry existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove_entry(key).is_some()
    }

    /// Remove every key starting with `prefix`, returning the count removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &matching {
            inner.remove_entry(key);
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
            entries: inner.entries.len() as u64,
            total_bytes: inner.total_bytes as u64,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

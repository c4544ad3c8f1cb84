//! Cache Data Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::compute_sha256;

/// One cached value with its bookkeeping metadata. Each tier owns its
/// entries exclusively; promotion copies the value, never the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Opaque value blob (serialized analysis JSON in practice)
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    /// Hex SHA-256 of the value blob
    pub content_hash: Option<String>,
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        value: String,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let size_bytes = value.len();
        let content_hash = Some(compute_sha256(&value));
        Self {
            key: key.into(),
            value,
            created_at,
            expires_at,
            access_count: 0,
            last_accessed: created_at,
            content_hash,
            size_bytes,
        }
    }

    /// Whether the entry has expired as of `at`. Entries without an
    /// `expires_at` never expire.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| at >= expires_at)
    }

    /// Record a successful read.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = at;
    }
}

/// Counter snapshot for one cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: u64,
    pub total_bytes: u64,
}

/// Size bounds and tier switches, supplied by application configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    pub memory_max_entries: usize,
    pub memory_max_bytes: usize,
    pub disk_max_bytes: u64,
    pub memory_enabled: bool,
    pub disk_enabled: bool,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            memory_max_entries: 256,
            memory_max_bytes: 8 * 1024 * 1024,
            disk_max_bytes: 64 * 1024 * 1024,
            memory_enabled: true,
            disk_enabled: true,
        }
    }
}

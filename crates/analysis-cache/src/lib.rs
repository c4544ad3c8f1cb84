//! Plansage Analysis Cache
//!
//! Two-tier cache for expensive analysis results: a strict-LRU memory
//! tier in front of a durable disk tier (JSON index + one blob file per
//! key). Keys embed a hash of the analyzed source text, so editing the
//! source invalidates its entries implicitly. All read/write paths are
//! best-effort; only construction can fail.

pub mod disk;
pub mod error;
pub mod key;
pub mod memory;
pub mod models;
pub mod tiered;

pub use disk::{DiskCache, DiskHit};
pub use error::{CacheError, CacheResult};
pub use key::{blob_file_name, cache_key, compute_sha256, CACHE_NAMESPACE};
pub use memory::MemoryCache;
pub use models::{CacheEntry, CacheLimits, TierStats};
pub use tiered::{CacheStats, TieredAnalysisCache};

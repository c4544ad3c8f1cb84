//! Analysis Cache Integration Tests
//!
//! Exercises the tiered cache through its public surface the way the
//! pipeline uses it: keys derived from analysis requests, JSON analysis
//! blobs as values, reopening over the same directory, and invalidation.

use chrono::{Duration, Utc};
use tempfile::tempdir;

use plansage_analysis_cache::{
    blob_file_name, cache_key, CacheLimits, TieredAnalysisCache, CACHE_NAMESPACE,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn small_limits() -> CacheLimits {
    CacheLimits {
        memory_max_entries: 2,
        memory_max_bytes: 64 * 1024,
        disk_max_bytes: 1024 * 1024,
        memory_enabled: true,
        disk_enabled: true,
    }
}

fn disk_only_limits() -> CacheLimits {
    CacheLimits {
        memory_enabled: false,
        ..small_limits()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_key_shape_is_stable_and_content_sensitive() {
    let key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");
    let parts: Vec<&str> = key.split(':').collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0], CACHE_NAMESPACE);
    assert_eq!(parts[1], "ai-analysis");
    assert_eq!(parts[2], "dbo.GetOrders");
    assert_eq!(parts[3].len(), 16);
    assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));

    // same inputs, same key; changed source, changed hash segment only
    assert_eq!(key, cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1"));
    let edited = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 2");
    assert_ne!(key, edited);
    assert!(edited.starts_with("plansage:ai-analysis:dbo.GetOrders:"));
}

#[test]
fn test_round_trip_and_tier_stats() {
    let dir = tempdir().unwrap();
    let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();

    let key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");
    assert!(cache.get(&key).is_none());
    cache.set(&key, r#"{"verdict":"fine"}"#, None);
    assert_eq!(cache.get(&key).unwrap(), r#"{"verdict":"fine"}"#);

    let stats = cache.stats();
    assert_eq!(stats.memory.hits, 1);
    assert_eq!(stats.memory.misses, 1);
    assert_eq!(stats.memory.entries, 1);
    assert_eq!(stats.disk.entries, 1);
}

#[test]
fn test_reopen_serves_from_disk_then_promotes() {
    let dir = tempdir().unwrap();
    let key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");

    {
        let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();
        cache.set(&key, "analysis body", None);
    }

    // a fresh process: memory is empty, disk still has the entry
    let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();
    assert_eq!(cache.get(&key).unwrap(), "analysis body");
    let stats = cache.stats();
    assert_eq!(stats.disk.hits, 1);
    assert_eq!(stats.memory.misses, 1);

    // the hit was promoted; the second read never reaches the disk tier
    assert_eq!(cache.get(&key).unwrap(), "analysis body");
    let stats = cache.stats();
    assert_eq!(stats.memory.hits, 1);
    assert_eq!(stats.disk.hits, 1);
}

#[test]
fn test_expiry_is_lazy_and_spans_both_tiers() {
    let dir = tempdir().unwrap();
    let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();
    let now = Utc::now();

    let key = cache_key("collection", "dbo.Orders", "snapshot");
    cache.set_at(&key, "rows", Some(Duration::seconds(60)), now);

    assert_eq!(
        cache.get_at(&key, now + Duration::seconds(59)).unwrap(),
        "rows"
    );
    // past the lease the entry reads as a miss everywhere
    assert!(cache.get_at(&key, now + Duration::seconds(61)).is_none());
    assert!(cache.get_at(&key, now + Duration::seconds(61)).is_none());

    let stats = cache.stats();
    assert_eq!(stats.memory.expirations, 1);
    assert_eq!(stats.disk.expirations, 1);
    assert_eq!(stats.memory.entries, 0);
    assert_eq!(stats.disk.entries, 0);
}

#[test]
fn test_memory_overflow_evicts_least_recently_used_only() {
    let dir = tempdir().unwrap();
    let limits = CacheLimits {
        disk_enabled: false,
        ..small_limits()
    };
    let cache = TieredAnalysisCache::open(dir.path(), limits).unwrap();

    cache.set("plansage:t:a:1", "aa", None);
    cache.set("plansage:t:b:1", "bb", None);
    // touch `a` so `b` becomes the least recently used entry
    assert!(cache.get("plansage:t:a:1").is_some());
    cache.set("plansage:t:c:1", "cc", None);

    assert!(cache.get("plansage:t:a:1").is_some());
    assert!(cache.get("plansage:t:c:1").is_some());
    assert!(cache.get("plansage:t:b:1").is_none());
    assert_eq!(cache.stats().memory.evictions, 1);
}

#[test]
fn test_deleted_blob_reads_as_miss_and_cleans_the_index() {
    let dir = tempdir().unwrap();
    let key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");

    let cache = TieredAnalysisCache::open(dir.path(), disk_only_limits()).unwrap();
    cache.set(&key, "analysis body", None);
    assert_eq!(cache.get(&key).unwrap(), "analysis body");

    std::fs::remove_file(dir.path().join(blob_file_name(&key))).unwrap();
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.stats().disk.entries, 0);

    // the index no longer records the key; a rewrite works normally
    let index = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
    assert!(!index.contains(&key));
    cache.set(&key, "fresh body", None);
    assert_eq!(cache.get(&key).unwrap(), "fresh body");
}

#[test]
fn test_prefix_invalidation_spans_tiers_and_survives_reopen() {
    let dir = tempdir().unwrap();
    let orders_key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");
    let totals_key = cache_key("ai-analysis", "dbo.GetTotals", "SELECT 2");

    {
        let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();
        cache.set(&orders_key, "orders analysis", None);
        cache.set(&totals_key, "totals analysis", None);

        let prefix = format!("{}:ai-analysis:dbo.GetOrders:", CACHE_NAMESPACE);
        assert_eq!(cache.invalidate_prefix(&prefix), 1);
        assert!(cache.get(&orders_key).is_none());
        assert_eq!(cache.get(&totals_key).unwrap(), "totals analysis");
    }

    let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();
    assert!(cache.get(&orders_key).is_none());
    assert!(cache.get(&totals_key).is_some());
}

#[test]
fn test_single_key_invalidation_hits_both_tiers() {
    let dir = tempdir().unwrap();
    let cache = TieredAnalysisCache::open(dir.path(), small_limits()).unwrap();

    let key = cache_key("ai-analysis", "dbo.GetOrders", "SELECT 1");
    cache.set(&key, "body", None);
    assert!(cache.invalidate(&key));
    assert!(cache.get(&key).is_none());
    assert!(!cache.invalidate(&key));
    assert!(!dir.path().join(blob_file_name(&key)).exists());
}

#[test]
fn test_disabled_tiers_degrade_to_plain_misses() {
    let dir = tempdir().unwrap();
    let limits = CacheLimits {
        memory_enabled: false,
        disk_enabled: false,
        ..CacheLimits::default()
    };
    let cache = TieredAnalysisCache::open(dir.path(), limits).unwrap();

    cache.set("plansage:t:x:1", "value", None);
    assert!(cache.get("plansage:t:x:1").is_none());
    // nothing was written next to the caller's directory either
    assert!(!dir.path().join("index.json").exists());
}

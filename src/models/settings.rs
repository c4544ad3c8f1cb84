//! Settings Models
//!
//! Advisor configuration and settings data structures.

use serde::{Deserialize, Serialize};

use plansage_analysis_cache::CacheLimits;

use crate::models::analysis::AnalysisCategory;

/// Advisor configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Default model provider id
    pub default_provider: String,
    /// Default model for the provider
    pub default_model: String,
    /// Treat warning-level findings as validation failures
    pub strict_validation: bool,
    /// Cache bounds and per-category lifetimes
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            default_provider: "anthropic".to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
            strict_validation: false,
            cache: CacheSettings::default(),
        }
    }
}

/// Cache tuning. TTLs live here rather than in the cache engine; the
/// engine stores whatever expiry it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub memory_enabled: bool,
    pub disk_enabled: bool,
    pub memory_max_entries: usize,
    pub memory_max_bytes: usize,
    pub disk_max_bytes: u64,
    /// Lifetime of finished AI analyses, in seconds
    pub ai_analysis_ttl_secs: u64,
    /// Lifetime of raw collection snapshots, in seconds
    pub collection_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            disk_enabled: true,
            memory_max_entries: 256,
            memory_max_bytes: 8 * 1024 * 1024,
            disk_max_bytes: 64 * 1024 * 1024,
            ai_analysis_ttl_secs: 24 * 60 * 60,
            collection_ttl_secs: 60 * 60,
        }
    }
}

impl CacheSettings {
    /// Bounds in the shape the cache engine takes.
    pub fn limits(&self) -> CacheLimits {
        CacheLimits {
            memory_max_entries: self.memory_max_entries,
            memory_max_bytes: self.memory_max_bytes,
            disk_max_bytes: self.disk_max_bytes,
            memory_enabled: self.memory_enabled,
            disk_enabled: self.disk_enabled,
        }
    }

    /// Configured lifetime for one analysis category. Zero disables expiry.
    pub fn ttl_for(&self, category: AnalysisCategory) -> Option<chrono::Duration> {
        let secs = match category {
            AnalysisCategory::AiAnalysis => self.ai_analysis_ttl_secs,
            AnalysisCategory::CollectionSnapshot => self.collection_ttl_secs,
        };
        (secs > 0).then(|| chrono::Duration::seconds(secs as i64))
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub strict_validation: Option<bool>,
    pub cache: Option<CacheSettings>,
}

impl AdvisorConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.default_provider {
            self.default_provider = provider;
        }
        if let Some(model) = update.default_model {
            self.default_model = model;
        }
        if let Some(strict) = update.strict_validation {
            self.strict_validation = strict;
        }
        if let Some(cache) = update.cache {
            self.cache = cache;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_provider.is_empty() {
            return Err("default_provider cannot be empty".to_string());
        }

        if self.default_model.is_empty() {
            return Err("default_model cannot be empty".to_string());
        }

        if self.cache.memory_enabled && self.cache.memory_max_entries == 0 {
            return Err("cache.memory_max_entries must be at least 1".to_string());
        }

        if self.cache.memory_enabled && self.cache.memory_max_bytes < 1024 {
            return Err("cache.memory_max_bytes must be at least 1024".to_string());
        }

        if self.cache.disk_enabled && self.cache.disk_max_bytes < 1024 {
            return Err("cache.disk_max_bytes must be at least 1024".to_string());
        }

        Ok(())
    }
}

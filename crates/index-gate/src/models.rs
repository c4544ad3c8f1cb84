//! Gate Models
//!
//! Canonical row types the gate evaluates, and the decision it produces.
//! All raw source shapes are mapped into [`IndexUsageRow`] by the
//! `normalize` module before the gate ever sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sargability::SargabilityFlag;

/// Reliability classification of a usage window.
///
/// LOW means the window covers too little activity to trust (short window,
/// recent instance restart, or counters that were reset mid-window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowReliability {
    #[serde(alias = "high", alias = "High")]
    High,
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "low", alias = "Low")]
    Low,
}

impl WindowReliability {
    /// HIGH and MEDIUM windows are trusted for gating.
    pub fn is_reliable(&self) -> bool {
        matches!(self, WindowReliability::High | WindowReliability::Medium)
    }
}

/// A bounded-time snapshot of read/write counter deltas for one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Days the window spans
    pub window_days: u32,
    /// Reads (seeks + scans + lookups) accumulated over the window
    pub read_delta: i64,
    /// Writes (updates) accumulated over the window
    pub write_delta: i64,
    /// How trustworthy the window is
    pub reliability: WindowReliability,
}

impl UsageWindow {
    /// Whether the window meets the 14-day evidence baseline.
    pub fn meets_baseline(&self) -> bool {
        self.window_days >= BASELINE_WINDOW_DAYS
    }
}

/// Minimum usage-window span before read/write ratios are trusted.
pub const BASELINE_WINDOW_DAYS: u32 = 14;

/// Physical index statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalStats {
    /// Average fragmentation percentage (0-100)
    pub fragmentation_percent: f64,
    /// Leaf-level page count
    pub page_count: u64,
}

/// Statistics-object freshness for the table behind an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsFreshness {
    /// Rows modified since the last statistics update
    pub rows_modified: i64,
    /// Modified rows as a fraction of the table (0.0-1.0+)
    pub modification_ratio: f64,
    /// When statistics were last updated, if known
    pub last_stats_update: Option<DateTime<Utc>>,
}

/// How out-of-date a statistics object is, relative to a supplied clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessLevel {
    /// Updated within the last week and lightly modified
    Fresh,
    /// One to four weeks old
    Aging,
    /// Over a month old, heavily modified, or never updated
    Stale,
}

impl StatsFreshness {
    /// Whole days since the last statistics update, if the date is known.
    pub fn staleness_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_stats_update.map(|t| (now - t).num_days())
    }

    /// Classify freshness. An unknown update date counts as stale, as does
    /// a modification ratio past one half regardless of age.
    pub fn staleness(&self, now: DateTime<Utc>) -> StalenessLevel {
        if self.modification_ratio > 0.5 {
            return StalenessLevel::Stale;
        }
        match self.staleness_days(now) {
            None => StalenessLevel::Stale,
            Some(days) if days > 30 => StalenessLevel::Stale,
            Some(days) if days > 7 => StalenessLevel::Aging,
            Some(_) => StalenessLevel::Fresh,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.staleness(now) == StalenessLevel::Stale
    }
}

/// One canonical existing-index row, normalized from any source shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexUsageRow {
    /// Table the index belongs to
    pub table: String,
    /// Index name
    pub index: String,
    /// Seek count from the usage-stats DMV, when collected
    #[serde(default)]
    pub user_seeks: Option<i64>,
    /// Scan count, when collected
    #[serde(default)]
    pub user_scans: Option<i64>,
    /// Lookup count, when collected
    #[serde(default)]
    pub user_lookups: Option<i64>,
    /// Update (write) count, when collected
    #[serde(default)]
    pub user_updates: Option<i64>,
    /// Snapshot-to-snapshot usage window, when two snapshots exist
    #[serde(default)]
    pub usage_window: Option<UsageWindow>,
    /// Physical stats, when collected
    #[serde(default)]
    pub physical: Option<PhysicalStats>,
    /// Statistics freshness, when collected
    #[serde(default)]
    pub stats: Option<StatsFreshness>,
}

impl IndexUsageRow {
    /// Whether any usage-stats counter was collected for this index.
    pub fn has_usage_stats(&self) -> bool {
        self.user_seeks.is_some()
            || self.user_scans.is_some()
            || self.user_lookups.is_some()
            || self.user_updates.is_some()
    }

    /// Total reads across whichever read counters were collected.
    pub fn read_total(&self) -> i64 {
        self.user_seeks.unwrap_or(0) + self.user_scans.unwrap_or(0) + self.user_lookups.unwrap_or(0)
    }
}

/// Whether the analysis target resolved to a real database object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectResolution {
    /// The name the caller asked about
    pub object_name: String,
    /// True when the name matched exactly one object
    pub object_resolved: bool,
    /// Schema of the resolved object
    #[serde(default)]
    pub resolved_schema: Option<String>,
    /// Object type (table, view, procedure) when resolved
    #[serde(default)]
    pub object_type: Option<String>,
}

impl ObjectResolution {
    pub fn resolved(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            object_resolved: true,
            resolved_schema: None,
            object_type: None,
        }
    }

    pub fn unresolved(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            object_resolved: false,
            resolved_schema: None,
            object_type: None,
        }
    }
}

/// Why the gate decided the way it did. Exactly one reason per decision;
/// when several checks fail, the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Allowed,
    ObjectNotResolved,
    ExistingIndexCoverageMissing,
    #[serde(rename = "dm_db_index_usage_stats_missing")]
    DmDbIndexUsageStatsMissing,
    UsageWindowDeltaMissing,
    #[serde(rename = "usage_window_baseline_14d_missing")]
    UsageWindowBaseline14dMissing,
    #[serde(rename = "usage_window_baseline_14d_incomplete")]
    UsageWindowBaseline14dIncomplete,
    UsageWindowReliabilityLow,
    PhysicalStatsMissing,
    StatsPropertiesMissing,
    SargabilityBlock,
}

impl GateReason {
    /// The stable machine-readable code for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::Allowed => "allowed",
            GateReason::ObjectNotResolved => "object_not_resolved",
            GateReason::ExistingIndexCoverageMissing => "existing_index_coverage_missing",
            GateReason::DmDbIndexUsageStatsMissing => "dm_db_index_usage_stats_missing",
            GateReason::UsageWindowDeltaMissing => "usage_window_delta_missing",
            GateReason::UsageWindowBaseline14dMissing => "usage_window_baseline_14d_missing",
            GateReason::UsageWindowBaseline14dIncomplete => {
                "usage_window_baseline_14d_incomplete"
            }
            GateReason::UsageWindowReliabilityLow => "usage_window_reliability_low",
            GateReason::PhysicalStatsMissing => "physical_stats_missing",
            GateReason::StatsPropertiesMissing => "stats_properties_missing",
            GateReason::SargabilityBlock => "sargability_block",
        }
    }
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The gate's verdict for one analysis request.
///
/// Computed fresh per request and never cached; it depends on live usage
/// statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexGateDecision {
    /// Whether index advice may be offered
    pub allowed: bool,
    /// The first failing check, or `Allowed`
    pub reason: GateReason,
    /// Existing index rows seen
    pub index_count: usize,
    /// Rows carrying any usage-stats counter
    pub usage_covered_index_count: usize,
    /// Rows carrying a usage-window delta
    pub window_delta_index_count: usize,
    /// Rows whose window meets the 14-day baseline
    pub baseline_14d_covered_index_count: usize,
    /// Rows with a HIGH or MEDIUM reliability window
    pub reliable_window_index_count: usize,
    /// Rows carrying physical stats
    pub physical_covered_index_count: usize,
    /// Rows carrying statistics freshness
    pub stats_covered_index_count: usize,
    /// Everything the caller could collect to improve the decision,
    /// stably ordered and de-duplicated
    pub missing_data_hints: Vec<String>,
    /// Sargability flags detected for the request, echoed for the caller
    pub sargability_flags: Vec<SargabilityFlag>,
}

impl IndexGateDecision {
    /// Append a hint, preserving order and skipping duplicates. Used by the
    /// gate itself and by callers appending externally-derived hints.
    pub fn push_hint(&mut self, hint: impl Into<String>) {
        let hint = hint.into();
        if !self.missing_data_hints.contains(&hint) {
            self.missing_data_hints.push(hint);
        }
    }
}

//! Row Normalization
//!
//! Existing-index evidence reaches the gate in three different shapes
//! depending on where it was collected: the snapshot collector's nested
//! snake_case records, the analyzer exporter's flat camelCase records, and
//! a minimal flat fallback with aggregate read/write counters. This module
//! maps all three into the canonical [`IndexUsageRow`] so the gate itself
//! never branches on shape. Rows that match none of the shapes are skipped,
//! never fatal.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::models::{IndexUsageRow, PhysicalStats, StatsFreshness, UsageWindow, WindowReliability};

/// Any of the three raw source shapes. Tried in order; the shared required
/// fields differ (`table_name` / `tableName` / `table`), so each shape is
/// matched unambiguously.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIndexRow {
    Collector(CollectorRow),
    Analyzer(AnalyzerRow),
    Flat(FlatRow),
}

/// Snapshot-collector shape: nested groups, snake_case keys.
#[derive(Debug, Deserialize)]
struct CollectorRow {
    table_name: String,
    index_name: String,
    #[serde(default)]
    usage: Option<CollectorUsage>,
    #[serde(default)]
    usage_window: Option<RawWindow>,
    #[serde(default)]
    physical: Option<RawPhysical>,
    #[serde(default)]
    statistics: Option<RawStats>,
}

#[derive(Debug, Default, Deserialize)]
struct CollectorUsage {
    #[serde(default)]
    user_seeks: Option<i64>,
    #[serde(default)]
    user_scans: Option<i64>,
    #[serde(default)]
    user_lookups: Option<i64>,
    #[serde(default)]
    user_updates: Option<i64>,
}

/// Analyzer-export shape: flat camelCase keys.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzerRow {
    table_name: String,
    index_name: String,
    #[serde(default)]
    user_seeks: Option<i64>,
    #[serde(default)]
    user_scans: Option<i64>,
    #[serde(default)]
    user_lookups: Option<i64>,
    #[serde(default)]
    user_updates: Option<i64>,
    #[serde(default)]
    usage_window: Option<RawWindow>,
    #[serde(default)]
    fragmentation_percent: Option<f64>,
    #[serde(default)]
    page_count: Option<u64>,
    #[serde(default)]
    rows_modified: Option<i64>,
    #[serde(default)]
    modification_ratio: Option<f64>,
    #[serde(default)]
    last_stats_update: Option<DateTime<Utc>>,
}

/// Minimal fallback shape: aggregate counters only.
#[derive(Debug, Deserialize)]
struct FlatRow {
    table: String,
    index: String,
    #[serde(default)]
    reads: Option<i64>,
    #[serde(default)]
    writes: Option<i64>,
}

/// Usage window as it appears in raw rows; accepts both key styles.
#[derive(Debug, Deserialize)]
struct RawWindow {
    #[serde(alias = "windowDays")]
    window_days: u32,
    #[serde(alias = "readDelta")]
    read_delta: i64,
    #[serde(alias = "writeDelta")]
    write_delta: i64,
    reliability: WindowReliability,
}

#[derive(Debug, Deserialize)]
struct RawPhysical {
    #[serde(alias = "fragmentationPercent", alias = "avg_fragmentation_in_percent")]
    fragmentation_percent: f64,
    #[serde(alias = "pageCount")]
    page_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawStats {
    #[serde(default, alias = "rowsModified")]
    rows_modified: i64,
    #[serde(default, alias = "modificationRatio")]
    modification_ratio: f64,
    #[serde(default, alias = "lastStatsUpdate")]
    last_stats_update: Option<DateTime<Utc>>,
}

impl From<RawWindow> for UsageWindow {
    fn from(raw: RawWindow) -> Self {
        UsageWindow {
            window_days: raw.window_days,
            read_delta: raw.read_delta,
            write_delta: raw.write_delta,
            reliability: raw.reliability,
        }
    }
}

impl From<RawPhysical> for PhysicalStats {
    fn from(raw: RawPhysical) -> Self {
        PhysicalStats {
            fragmentation_percent: raw.fragmentation_percent,
            page_count: raw.page_count,
        }
    }
}

impl From<RawStats> for StatsFreshness {
    fn from(raw: RawStats) -> Self {
        StatsFreshness {
            rows_modified: raw.rows_modified,
            modification_ratio: raw.modification_ratio,
            last_stats_update: raw.last_stats_update,
        }
    }
}

impl RawIndexRow {
    fn into_canonical(self) -> IndexUsageRow {
        match self {
            RawIndexRow::Collector(row) => {
                let usage = row.usage.unwrap_or_default();
                IndexUsageRow {
                    table: row.table_name,
                    index: row.index_name,
                    user_seeks: usage.user_seeks,
                    user_scans: usage.user_scans,
                    user_lookups: usage.user_lookups,
                    user_updates: usage.user_updates,
                    usage_window: row.usage_window.map(UsageWindow::from),
                    physical: row.physical.map(PhysicalStats::from),
                    stats: row.statistics.map(StatsFreshness::from),
                }
            }
            RawIndexRow::Analyzer(row) => {
                let physical = match (row.fragmentation_percent, row.page_count) {
                    (Some(fragmentation_percent), Some(page_count)) => Some(PhysicalStats {
                        fragmentation_percent,
                        page_count,
                    }),
                    _ => None,
                };
                let stats = if row.rows_modified.is_some()
                    || row.modification_ratio.is_some()
                    || row.last_stats_update.is_some()
                {
                    Some(StatsFreshness {
                        rows_modified: row.rows_modified.unwrap_or(0),
                        modification_ratio: row.modification_ratio.unwrap_or(0.0),
                        last_stats_update: row.last_stats_update,
                    })
                } else {
                    None
                };
                IndexUsageRow {
                    table: row.table_name,
                    index: row.index_name,
                    user_seeks: row.user_seeks,
                    user_scans: row.user_scans,
                    user_lookups: row.user_lookups,
                    user_updates: row.user_updates,
                    usage_window: row.usage_window.map(UsageWindow::from),
                    physical,
                    stats,
                }
            }
            // Aggregate counters cannot be split; they land on the
            // scan/update counters so usage coverage is still visible.
            RawIndexRow::Flat(row) => IndexUsageRow {
                table: row.table,
                index: row.index,
                user_seeks: None,
                user_scans: row.reads,
                user_lookups: None,
                user_updates: row.writes,
                usage_window: None,
                physical: None,
                stats: None,
            },
        }
    }
}

/// Normalize one raw row, or `None` when it matches no known shape.
pub fn normalize_row(value: &Value) -> Option<IndexUsageRow> {
    match serde_json::from_value::<RawIndexRow>(value.clone()) {
        Ok(row) => Some(row.into_canonical()),
        Err(err) => {
            warn!(error = %err, "skipping malformed index usage row");
            None
        }
    }
}

/// Normalize a batch of raw rows, skipping whatever does not parse.
pub fn normalize_rows(raw: &[Value]) -> Vec<IndexUsageRow> {
    raw.iter().filter_map(normalize_row).collect()
}

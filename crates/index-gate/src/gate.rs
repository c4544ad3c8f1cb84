//! Gate Evaluation
//!
//! The ordered evidence checks behind every index-advice decision. The
//! first failing check names the decision's reason, but every failing
//! check contributes a hint, so a caller can remediate all evidence gaps
//! in one collection pass instead of discovering them one at a time.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{GateReason, IndexGateDecision, IndexUsageRow, ObjectResolution};
use crate::sargability::SargabilityFlag;

/// Hint strings attached to gate decisions. The first nine pair with the
/// gate's own checks; the last two are appended by the orchestrator when
/// collection-side data is absent.
pub mod hints {
    pub const OBJECT_RESOLUTION: &str =
        "Resolve the target to a single schema-qualified object before requesting index advice.";
    pub const EXISTING_INDEXES: &str =
        "Collect existing index definitions (sys.indexes / sys.index_columns) for the object.";
    pub const USAGE_STATS: &str =
        "Collect read/write counters from sys.dm_db_index_usage_stats.";
    pub const USAGE_WINDOW_DELTA: &str =
        "Capture a second usage snapshot so read/write deltas can be computed.";
    pub const USAGE_WINDOW_BASELINE: &str =
        "Extend the usage window to at least 14 days before trusting read/write ratios.";
    pub const USAGE_WINDOW_RELIABILITY: &str =
        "All usage windows are low reliability (short window or counter reset); re-baseline before acting.";
    pub const PHYSICAL_STATS: &str =
        "Collect fragmentation and page counts from sys.dm_db_index_physical_stats.";
    pub const STATS_PROPERTIES: &str =
        "Collect statistics freshness from sys.dm_db_stats_properties.";
    pub const SARGABILITY: &str =
        "Rewrite non-sargable predicates first; new indexes cannot help until seeks are possible.";
    pub const STALE_STATISTICS: &str =
        "Statistics are stale on every covered index; update statistics before trusting row estimates.";
    pub const MISSING_INDEX_DMV: &str =
        "Missing-index DMV data (sys.dm_db_missing_index_details) was not collected.";
    pub const ENGINE_METADATA: &str =
        "Engine version metadata was not collected; version-specific syntax cannot be checked.";
}

/// Decide whether index advice is permitted for one analysis request.
///
/// Deterministic: the only clock dependence is the supplied `now`, used for
/// statistics-staleness diagnostics. Malformed rows never reach this
/// function (normalization skips them), so evaluation cannot fail; thin
/// evidence lowers the decision toward denial instead.
pub fn evaluate(
    rows: &[IndexUsageRow],
    resolution: &ObjectResolution,
    sargability_flags: &[SargabilityFlag],
    now: DateTime<Utc>,
) -> IndexGateDecision {
    let index_count = rows.len();
    let usage_covered_index_count = rows.iter().filter(|r| r.has_usage_stats()).count();
    let window_delta_index_count = rows.iter().filter(|r| r.usage_window.is_some()).count();
    let baseline_14d_covered_index_count = rows
        .iter()
        .filter(|r| r.usage_window.as_ref().is_some_and(|w| w.meets_baseline()))
        .count();
    let reliable_window_index_count = rows
        .iter()
        .filter(|r| {
            r.usage_window
                .as_ref()
                .is_some_and(|w| w.reliability.is_reliable())
        })
        .count();
    let physical_covered_index_count = rows.iter().filter(|r| r.physical.is_some()).count();
    let stats_covered_index_count = rows.iter().filter(|r| r.stats.is_some()).count();

    let mut failures: Vec<(GateReason, &'static str)> = Vec::new();

    // 1. object identity
    if !resolution.object_resolved {
        failures.push((GateReason::ObjectNotResolved, hints::OBJECT_RESOLUTION));
    }
    // 2. existing indexes
    if index_count == 0 {
        failures.push((
            GateReason::ExistingIndexCoverageMissing,
            hints::EXISTING_INDEXES,
        ));
    }
    // 3. usage counters
    if usage_covered_index_count == 0 {
        failures.push((GateReason::DmDbIndexUsageStatsMissing, hints::USAGE_STATS));
    }
    // 4. usage-window deltas
    if window_delta_index_count == 0 {
        failures.push((
            GateReason::UsageWindowDeltaMissing,
            hints::USAGE_WINDOW_DELTA,
        ));
    }
    // 5. 14-day baseline: every tracked window must meet it
    if baseline_14d_covered_index_count == 0 {
        failures.push((
            GateReason::UsageWindowBaseline14dMissing,
            hints::USAGE_WINDOW_BASELINE,
        ));
    } else if baseline_14d_covered_index_count < window_delta_index_count {
        failures.push((
            GateReason::UsageWindowBaseline14dIncomplete,
            hints::USAGE_WINDOW_BASELINE,
        ));
    }
    // 6. window reliability
    if reliable_window_index_count == 0 {
        failures.push((
            GateReason::UsageWindowReliabilityLow,
            hints::USAGE_WINDOW_RELIABILITY,
        ));
    }
    // 7. physical stats
    if physical_covered_index_count == 0 {
        failures.push((GateReason::PhysicalStatsMissing, hints::PHYSICAL_STATS));
    }
    // 8. statistics freshness
    if stats_covered_index_count == 0 {
        failures.push((GateReason::StatsPropertiesMissing, hints::STATS_PROPERTIES));
    }
    // 9. sargability
    if sargability_flags.iter().any(|f| f.is_risky()) {
        failures.push((GateReason::SargabilityBlock, hints::SARGABILITY));
    }

    let reason = failures
        .first()
        .map(|(reason, _)| *reason)
        .unwrap_or(GateReason::Allowed);

    let mut decision = IndexGateDecision {
        allowed: failures.is_empty(),
        reason,
        index_count,
        usage_covered_index_count,
        window_delta_index_count,
        baseline_14d_covered_index_count,
        reliable_window_index_count,
        physical_covered_index_count,
        stats_covered_index_count,
        missing_data_hints: Vec::new(),
        sargability_flags: sargability_flags.to_vec(),
    };
    for (_, hint) in &failures {
        decision.push_hint(*hint);
    }

    // Present-but-stale statistics get a diagnostic hint without changing
    // the verdict.
    if stats_covered_index_count > 0 {
        let all_stale = rows
            .iter()
            .filter_map(|r| r.stats.as_ref())
            .all(|s| s.is_stale(now));
        if all_stale {
            decision.push_hint(hints::STALE_STATISTICS);
        }
    }

    debug!(
        allowed = decision.allowed,
        reason = %decision.reason,
        indexes = decision.index_count,
        hints = decision.missing_data_hints.len(),
        "index gate evaluated"
    );
    decision
}

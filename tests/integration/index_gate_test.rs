//! Index Gate Integration Tests
//!
//! Drives the evidence gate the way the pipeline does: raw JSON usage rows
//! in, normalized rows through evaluation, decision out. Covers the reason
//! codes and hint text downstream consumers key on.

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use plansage_index_gate::{
    detect_sargability, evaluate, hints, normalize_rows, GateReason, ObjectResolution,
};
use plansage_showplan::PlanInsights;

// ============================================================================
// Helper Functions
// ============================================================================

/// A collector-shaped row carrying every evidence group the gate checks.
/// Statistics are dated relative to the real clock so they read as fresh.
fn full_evidence_row(index: &str) -> Value {
    let updated = (Utc::now() - Duration::days(2)).to_rfc3339();
    json!({
        "table_name": "dbo.Orders",
        "index_name": index,
        "usage": {"user_seeks": 900, "user_scans": 14, "user_lookups": 2, "user_updates": 130},
        "usage_window": {"window_days": 21, "read_delta": 640, "write_delta": 90, "reliability": "HIGH"},
        "physical": {"fragmentation_percent": 6.5, "page_count": 3100},
        "statistics": {"rows_modified": 120, "modification_ratio": 0.01, "last_stats_update": updated}
    })
}

fn resolved() -> ObjectResolution {
    ObjectResolution::resolved("dbo.Orders")
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_full_evidence_from_raw_json_allows_advice() {
    let rows = normalize_rows(&[full_evidence_row("IX_Orders_CustomerId")]);
    assert_eq!(rows.len(), 1);

    let decision = evaluate(&rows, &resolved(), &[], Utc::now());
    assert!(decision.allowed);
    assert_eq!(decision.reason, GateReason::Allowed);
    assert_eq!(decision.reason.as_str(), "allowed");
    assert!(decision.missing_data_hints.is_empty());
}

#[test]
fn test_zero_rows_denies_with_machine_readable_reason() {
    let decision = evaluate(&[], &resolved(), &[], Utc::now());
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_str(), "existing_index_coverage_missing");
    assert_eq!(decision.missing_data_hints[0], hints::EXISTING_INDEXES);
}

#[test]
fn test_mixed_shape_rows_normalize_into_one_batch() {
    let updated = (Utc::now() - Duration::days(1)).to_rfc3339();
    let raw = [
        full_evidence_row("IX_Collector"),
        json!({
            "tableName": "dbo.Orders",
            "indexName": "IX_Analyzer",
            "userSeeks": 50, "userScans": 1, "userLookups": 0, "userUpdates": 8,
            "usageWindow": {"windowDays": 30, "readDelta": 51, "writeDelta": 8, "reliability": "HIGH"},
            "fragmentationPercent": 2.0, "pageCount": 150,
            "rowsModified": 3, "modificationRatio": 0.001, "lastStatsUpdate": updated
        }),
        json!({"table": "dbo.Orders", "index": "IX_Flat", "reads": 12, "writes": 1}),
        json!("garbage that should be skipped"),
    ];
    let rows = normalize_rows(&raw);
    assert_eq!(rows.len(), 3);

    let decision = evaluate(&rows, &resolved(), &[], Utc::now());
    assert_eq!(decision.index_count, 3);
    assert_eq!(decision.usage_covered_index_count, 3);
    // only the first two carry windows; the flat fallback cannot
    assert_eq!(decision.window_delta_index_count, 2);
    assert!(decision.allowed);
}

#[test]
fn test_evaluation_is_idempotent_over_identical_input() {
    let rows = normalize_rows(&[full_evidence_row("IX_1")]);
    let resolution = resolved();
    let now = Utc::now();
    let first = evaluate(&rows, &resolution, &[], now);
    let second = evaluate(&rows, &resolution, &[], now);
    assert_eq!(first, second);
}

#[test]
fn test_adding_evidence_never_downgrades_the_decision() {
    let thin = normalize_rows(&[json!({"table": "dbo.Orders", "index": "IX_Flat", "reads": 5, "writes": 1})]);
    let now = Utc::now();
    let denied = evaluate(&thin, &resolved(), &[], now);
    assert!(!denied.allowed);
    let baseline_hints = denied.missing_data_hints.len();

    let mut richer = thin;
    richer.extend(normalize_rows(&[full_evidence_row("IX_Full")]));
    let healed = evaluate(&richer, &resolved(), &[], now);
    assert!(healed.allowed);
    assert!(healed.missing_data_hints.len() <= baseline_hints);
}

#[test]
fn test_non_sargable_source_blocks_even_with_full_evidence() {
    let rows = normalize_rows(&[full_evidence_row("IX_1")]);
    let insights = PlanInsights::default();

    let flags = detect_sargability(
        "SELECT * FROM dbo.Orders WHERE CustomerName LIKE '%smith%'",
        &insights,
    );
    assert!(!flags.is_empty());

    let decision = evaluate(&rows, &resolved(), &flags, Utc::now());
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_str(), "sargability_block");
    assert_eq!(decision.missing_data_hints, vec![hints::SARGABILITY.to_string()]);
}

#[test]
fn test_sargable_source_produces_no_flags() {
    let flags = detect_sargability(
        "SELECT Id, Total FROM dbo.Orders WHERE CustomerId = @CustomerId",
        &PlanInsights::default(),
    );
    assert!(flags.is_empty());
}

#[test]
fn test_decision_serializes_for_caching() {
    let decision = evaluate(&[], &ObjectResolution::unresolved("Ordres"), &[], Utc::now());
    let json = serde_json::to_string(&decision).unwrap();
    assert!(json.contains("object_not_resolved"));
    let back: plansage_index_gate::IndexGateDecision = serde_json::from_str(&json).unwrap();
    assert_eq!(back, decision);
}

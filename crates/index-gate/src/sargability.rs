//! Sargability Detection
//!
//! Flags predicates that prevent index seeks. Some flags come from the
//! query text (regex rules compiled once), some from the analyzed plan.
//! A risky flag means new indexes cannot help until the query is
//! rewritten, so the gate blocks index advice while one is present.

use std::sync::OnceLock;

use plansage_showplan::PlanInsights;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A predicate pattern that defeats (or strains) index seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SargabilityFlag {
    /// `LIKE '%...'`: the leading wildcard forces a scan
    LeadingWildcard,
    /// A function wrapped around a column in a predicate
    FunctionOnColumn,
    /// A plan-affecting implicit type conversion
    ImplicitConvert,
    /// Row-by-row processing (cursors, fetch loops, while loops)
    #[serde(rename = "RBAR")]
    Rbar,
    /// Range scans over large row counts dominate the plan
    RangeScanHeavy,
}

impl SargabilityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SargabilityFlag::LeadingWildcard => "leading_wildcard",
            SargabilityFlag::FunctionOnColumn => "function_on_column",
            SargabilityFlag::ImplicitConvert => "implicit_convert",
            SargabilityFlag::Rbar => "RBAR",
            SargabilityFlag::RangeScanHeavy => "range_scan_heavy",
        }
    }

    /// Risky flags block index advice outright; `RangeScanHeavy` is
    /// advisory only (a wider index can still help a range scan).
    pub fn is_risky(&self) -> bool {
        !matches!(self, SargabilityFlag::RangeScanHeavy)
    }
}

impl std::fmt::Display for SargabilityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row estimate above which a scan operator marks the plan range-scan-heavy.
const RANGE_SCAN_ROW_THRESHOLD: f64 = 10_000.0;

static SQL_RULES: OnceLock<Vec<(SargabilityFlag, Regex)>> = OnceLock::new();

fn sql_rules() -> &'static [(SargabilityFlag, Regex)] {
    SQL_RULES.get_or_init(|| {
        [
            (SargabilityFlag::LeadingWildcard, r"(?i)\bLIKE\s+N?'%"),
            (
                SargabilityFlag::FunctionOnColumn,
                r"(?is)\bWHERE\b.{0,400}?\b(?:UPPER|LOWER|LTRIM|RTRIM|TRIM|SUBSTRING|LEFT|RIGHT|CAST|CONVERT|ISNULL|COALESCE|YEAR|MONTH|DAY|DATEPART|DATEADD|FORMAT)\s*\(\s*[\[\w]",
            ),
            (SargabilityFlag::Rbar, r"(?i)\bDECLARE\s+\S+\s+CURSOR\b"),
            (SargabilityFlag::Rbar, r"(?i)\bFETCH\s+NEXT\s+FROM\b"),
            (SargabilityFlag::Rbar, r"(?is)\bWHILE\b.{0,200}?\bBEGIN\b"),
        ]
        .into_iter()
        .map(|(flag, pattern)| {
            (flag, Regex::new(pattern).expect("sargability pattern compiles"))
        })
        .collect()
    })
}

/// Detect sargability flags from the query text and its analyzed plan.
///
/// Output order is stable: text-rule order first, then plan-derived flags;
/// each flag appears at most once.
pub fn detect_sargability(source_sql: &str, insights: &PlanInsights) -> Vec<SargabilityFlag> {
    let mut flags: Vec<SargabilityFlag> = Vec::new();

    for (flag, regex) in sql_rules() {
        if !flags.contains(flag) && regex.is_match(source_sql) {
            flags.push(*flag);
        }
    }

    if insights.has_implicit_conversion && !flags.contains(&SargabilityFlag::ImplicitConvert) {
        flags.push(SargabilityFlag::ImplicitConvert);
    }

    if has_heavy_range_scan(insights) {
        flags.push(SargabilityFlag::RangeScanHeavy);
    }

    flags
}

fn has_heavy_range_scan(insights: &PlanInsights) -> bool {
    insights.operators.iter().any(|op| {
        matches!(op.name.as_str(), "Index Scan" | "Clustered Index Scan")
            && (op.estimated_rows >= RANGE_SCAN_ROW_THRESHOLD
                || op.actual_rows.unwrap_or(0.0) >= RANGE_SCAN_ROW_THRESHOLD)
    })
}

//! Showplan Models
//!
//! Data structures produced by execution-plan analysis. A [`PlanInsights`]
//! value is built once per analysis call, is immutable after construction,
//! and is never persisted; it is a derived view over the fed XML.

use serde::{Deserialize, Serialize};

/// Severity of a plan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    /// Actively harming the query; fix first
    High,
    /// Worth fixing; unlikely to be the dominant cost
    Medium,
    /// Informational
    Low,
}

impl std::fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningSeverity::High => write!(f, "high"),
            WarningSeverity::Medium => write!(f, "medium"),
            WarningSeverity::Low => write!(f, "low"),
        }
    }
}

/// Category of a plan warning.
///
/// `ParseError` and `AnalysisError` are the two failure categories the
/// analyzer itself emits when the document cannot be processed; everything
/// else is derived from plan content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    /// The XML could not be parsed at all
    ParseError,
    /// The XML parsed but analysis hit an unexpected internal error
    AnalysisError,
    /// A full table scan operator is present
    TableScan,
    /// A key/RID lookup operator is present
    KeyLookup,
    /// Estimated vs. actual row counts diverge by 10x or more
    CardinalityMisestimate,
    /// A plan-affecting implicit type conversion was declared
    ImplicitConversion,
    /// A sort operator spilled to tempdb
    SortSpill,
    /// A hash operator spilled to tempdb
    HashSpill,
    /// The optimizer had no statistics for one or more columns
    MissingStatistics,
    /// A join with no join predicate (cartesian product)
    NoJoinPredicate,
}

impl WarningCategory {
    /// Canned remediation text shown alongside every warning of this category.
    pub fn remediation(&self) -> &'static str {
        match self {
            WarningCategory::ParseError => {
                "Re-export the execution plan as XML and retry the analysis."
            }
            WarningCategory::AnalysisError => {
                "Retry the analysis; if the error persists, report the plan document."
            }
            WarningCategory::TableScan => {
                "Review the WHERE/JOIN predicates and consider an index that lets the engine seek instead of scanning the whole table."
            }
            WarningCategory::KeyLookup => {
                "Consider widening an existing nonclustered index with INCLUDE columns to cover the query."
            }
            WarningCategory::CardinalityMisestimate => {
                "Update statistics on the involved tables; stale statistics are the most common cause of row-estimate drift."
            }
            WarningCategory::ImplicitConversion => {
                "Match parameter and column data types so predicates stay sargable."
            }
            WarningCategory::SortSpill => {
                "Reduce the sorted row count or raise the memory grant; a spilling sort writes intermediate runs to tempdb."
            }
            WarningCategory::HashSpill => {
                "Check row-count estimates feeding the hash operator; a spilling hash build usually means the input was far larger than estimated."
            }
            WarningCategory::MissingStatistics => {
                "Create or update statistics on the flagged columns so the optimizer can estimate selectivity."
            }
            WarningCategory::NoJoinPredicate => {
                "Add the missing join condition; a cartesian product multiplies row counts."
            }
        }
    }
}

impl std::fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningCategory::ParseError => "parse_error",
            WarningCategory::AnalysisError => "analysis_error",
            WarningCategory::TableScan => "table_scan",
            WarningCategory::KeyLookup => "key_lookup",
            WarningCategory::CardinalityMisestimate => "cardinality_misestimate",
            WarningCategory::ImplicitConversion => "implicit_conversion",
            WarningCategory::SortSpill => "sort_spill",
            WarningCategory::HashSpill => "hash_spill",
            WarningCategory::MissingStatistics => "missing_statistics",
            WarningCategory::NoJoinPredicate => "no_join_predicate",
        };
        write!(f, "{}", s)
    }
}

/// A single warning derived from the plan (or from the failure to parse it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWarning {
    /// What kind of problem this is
    pub category: WarningCategory,
    /// How urgently it should be addressed
    pub severity: WarningSeverity,
    /// Human-readable description with plan-specific detail
    pub message: String,
    /// Canned remediation guidance for the category
    pub remediation: String,
}

impl PlanWarning {
    /// Create a warning; remediation text comes from the category.
    pub fn new(
        category: WarningCategory,
        severity: WarningSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            remediation: category.remediation().to_string(),
        }
    }
}

/// One operator node from the plan tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOperator {
    /// Display name (the physical operator, after lookup reclassification)
    pub name: String,
    /// Physical operator kind (e.g. "Hash Match")
    pub physical_op: String,
    /// Logical operator kind (e.g. "Inner Join")
    pub logical_op: String,
    /// Plan node id, when present in the document
    pub node_id: Option<u32>,
    /// Optimizer row estimate
    pub estimated_rows: f64,
    /// Actual rows from the first per-thread runtime counter, when present
    pub actual_rows: Option<f64>,
    /// Estimated CPU cost
    pub cpu_cost: f64,
    /// Estimated IO cost
    pub io_cost: f64,
    /// Combined estimated cost (CPU + IO)
    pub estimated_cost: f64,
    /// Estimated cost of this operator and everything below it
    pub subtree_cost: f64,
    /// Whether the operator ran in parallel
    pub parallel: bool,
    /// Operator-level warning tags (element names from the plan)
    pub warnings: Vec<String>,
}

impl PlanOperator {
    /// Estimate accuracy ratio, or `None` when the plan carried no runtime data.
    pub fn row_estimate_accuracy(&self) -> Option<f64> {
        self.actual_rows
            .map(|actual| row_estimate_accuracy(self.estimated_rows, actual))
    }

    /// Whether estimate and actual diverge by 10x or more.
    ///
    /// Always false when the plan carried no runtime data.
    pub fn has_bad_estimate(&self) -> bool {
        self.actual_rows
            .map(|actual| has_bad_estimate(self.estimated_rows, actual))
            .unwrap_or(false)
    }
}

/// Accuracy of a row estimate: `min / max`, in [0, 1].
///
/// Defined as 1.0 when both counts are zero (a correct empty estimate) and
/// 0.0 when exactly one is zero (the estimate missed entirely).
pub fn row_estimate_accuracy(estimated: f64, actual: f64) -> f64 {
    let lo = estimated.min(actual);
    let hi = estimated.max(actual);
    if hi == 0.0 {
        1.0
    } else {
        lo / hi
    }
}

/// Whether the larger of (estimated, actual) is at least 10x the larger of
/// (1, the smaller), the threshold at which a misestimate is considered
/// plan-shaping rather than noise.
pub fn has_bad_estimate(estimated: f64, actual: f64) -> bool {
    let lo = estimated.min(actual);
    let hi = estimated.max(actual);
    hi >= 10.0 * lo.max(1.0)
}

/// An engine-suggested missing index. Purely advisory; never applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingIndex {
    /// Database name, bracket quoting stripped
    pub database: String,
    /// Schema name, bracket quoting stripped
    pub schema: String,
    /// Table name, bracket quoting stripped
    pub table: String,
    /// Columns the optimizer would seek on with equality predicates
    pub equality_columns: Vec<String>,
    /// Columns the optimizer would seek on with range predicates
    pub inequality_columns: Vec<String>,
    /// Columns the index would carry to cover the query
    pub include_columns: Vec<String>,
    /// Estimated cost reduction percentage (0-100)
    pub impact: f64,
}

/// Structured insight over one execution-plan document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanInsights {
    /// Total estimated cost of the statement(s)
    pub total_cost: f64,
    /// Whether any part of the plan runs in parallel
    pub parallel: bool,
    /// Degree of parallelism from the query-plan node (0 when absent)
    pub degree_of_parallelism: u32,
    /// Every operator node, in document order
    pub operators: Vec<PlanOperator>,
    /// Names of expensive operators present, de-duplicated, first-seen order
    pub expensive_operators: Vec<String>,
    /// Plan warnings, in discovery order
    pub warnings: Vec<PlanWarning>,
    /// Engine-suggested missing indexes, in document order
    pub missing_indexes: Vec<MissingIndex>,
    /// A full table scan is present
    pub has_table_scan: bool,
    /// A key/RID lookup is present
    pub has_key_lookup: bool,
    /// A sort operator spilled to tempdb
    pub has_sort_warning: bool,
    /// A hash operator spilled to tempdb
    pub has_hash_spill: bool,
    /// A plan-affecting implicit conversion was declared
    pub has_implicit_conversion: bool,
}

impl PlanInsights {
    /// Empty insights carrying a single High-severity parse-error warning.
    pub fn parse_failure(detail: impl Into<String>) -> Self {
        Self {
            warnings: vec![PlanWarning::new(
                WarningCategory::ParseError,
                WarningSeverity::High,
                format!("Execution plan XML could not be parsed: {}", detail.into()),
            )],
            ..Self::default()
        }
    }

    /// Empty insights carrying a single Medium-severity analysis-error warning.
    pub fn analysis_failure(detail: impl Into<String>) -> Self {
        Self {
            warnings: vec![PlanWarning::new(
                WarningCategory::AnalysisError,
                WarningSeverity::Medium,
                format!("Execution plan analysis failed: {}", detail.into()),
            )],
            ..Self::default()
        }
    }

    /// Whether analysis failed outright (parse or internal error).
    pub fn is_failed(&self) -> bool {
        self.warnings.iter().any(|w| {
            matches!(
                w.category,
                WarningCategory::ParseError | WarningCategory::AnalysisError
            )
        })
    }

    /// Count of warnings at a given severity.
    pub fn warning_count(&self, severity: WarningSeverity) -> usize {
        self.warnings.iter().filter(|w| w.severity == severity).count()
    }
}

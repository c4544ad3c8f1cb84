//! Plansage Showplan Analysis
//!
//! Parses SQL Server execution-plan XML (the showplan schema) into a
//! structured [`PlanInsights`] value that the rest of the advisor consumes:
//!
//! - `models` - Plan data types (PlanInsights, PlanOperator, MissingIndex, PlanWarning)
//! - `analyzer` - The single-pass showplan walker and summary post-pass
//!
//! Analysis is a total function: malformed or empty XML never raises, it
//! produces an otherwise-empty insights value carrying a parse-error warning.

pub mod analyzer;
pub mod models;

// Re-export the analysis entry point
pub use analyzer::{analyze, EXPENSIVE_OPERATORS, SHOWPLAN_NAMESPACE};

// Re-export plan model types
pub use models::{
    has_bad_estimate, row_estimate_accuracy, MissingIndex, PlanInsights, PlanOperator,
    PlanWarning, WarningCategory, WarningSeverity,
};

//! # Plansage Index Gate
//!
//! Evidence-based gating for index recommendations. Before the advisor is
//! allowed to suggest creating, altering, or dropping indexes, this crate
//! checks that enough usage evidence exists to make that advice defensible:
//! resolved object identity, existing index definitions, live usage
//! counters, a sufficiently long usage window, physical stats, statistics
//! freshness, and the absence of sargability problems that indexing cannot
//! fix.
//!
//! The gate is deterministic and total: malformed input rows are skipped
//! during normalization, and missing evidence degrades the decision toward
//! denial rather than raising an error.

pub mod gate;
pub mod models;
pub mod normalize;
pub mod sargability;

pub use gate::{evaluate, hints};
pub use models::{
    GateReason, IndexGateDecision, IndexUsageRow, ObjectResolution, PhysicalStats,
    StalenessLevel, StatsFreshness, UsageWindow, WindowReliability,
};
pub use normalize::normalize_rows;
pub use sargability::{detect_sargability, SargabilityFlag};

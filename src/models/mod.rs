//! Data Models
//!
//! Contains all data structures used throughout the advisor.

pub mod analysis;
pub mod settings;

pub use analysis::*;
pub use settings::*;

//! # Plansage Response Guard
//!
//! Safety validation for model-generated SQL advice. Every response is
//! scanned against fixed rule tables before it reaches the user:
//! destructive commands are blocked and masked out of the text, risky
//! operations raise warnings, version-gated syntax is checked against the
//! target engine, and a reproducible 0-100 quality score is attached.
//!
//! Rule lists are data tables compiled once at first use; adding a rule
//! never touches control flow.

pub mod models;
pub mod rules;
pub mod validator;

pub use models::{
    DangerLevel, IndexAdviceSuppression, Severity, ValidateOptions, ValidationIssue,
    ValidationResult,
};
pub use validator::validate;

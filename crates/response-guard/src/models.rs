//! Validation Models

use serde::{Deserialize, Serialize};

/// Severity of one validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Ok,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Ok => "OK",
        };
        write!(f, "{}", s)
    }
}

/// Overall danger classification for a validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DangerLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DangerLevel::Safe => "SAFE",
            DangerLevel::Low => "LOW",
            DangerLevel::Medium => "MEDIUM",
            DangerLevel::High => "HIGH",
            DangerLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// One finding from response validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Stable issue category (`blocked_command`, `warning_operation`,
    /// `version_compatibility`, `index_advice_suppressed`)
    pub category: String,
    pub message: String,
    /// What to do instead, when the rule knows
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Whether the matched text was masked out of the response
    pub blocked: bool,
}

impl ValidationIssue {
    pub fn critical(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            category: category.into(),
            message: message.into(),
            suggestion: None,
            blocked: true,
        }
    }

    pub fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            suggestion: None,
            blocked: false,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// The validator's complete verdict for one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False when any critical issue exists (or, in strict mode, any warning)
    pub is_valid: bool,
    pub danger_level: DangerLevel,
    /// All findings, critical first, in rule-table order
    pub issues: Vec<ValidationIssue>,
    /// The response with blocked commands and withheld advice masked
    pub sanitized_response: String,
    /// Reproducible 0-100 quality heuristic
    pub quality_score: u8,
    /// Matched destructive snippets, de-duplicated, in discovery order
    pub blocked_commands: Vec<String>,
}

/// Instruction to withhold index advice, produced by a denied gate
/// decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexAdviceSuppression {
    /// Machine-readable gate reason code
    pub reason: String,
    /// What the caller could collect to lift the suppression
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Knobs for one validation call.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Also invalidate the result on any warning
    pub strict: bool,
    /// Target engine major version (13 = 2016 ... 16 = 2022), when known
    pub engine_major_version: Option<u32>,
    /// Mask index advice and explain why, when the gate denied it
    pub index_suppression: Option<IndexAdviceSuppression>,
}

//! Response Guard Integration Tests
//!
//! Validates whole model responses end to end, including the composition
//! with a real gate decision: a denied gate produces the suppression
//! instruction the validator then enforces on the response text.

use chrono::Utc;

use plansage_index_gate::{evaluate, ObjectResolution};
use plansage_response_guard::{
    validate, DangerLevel, IndexAdviceSuppression, Severity, ValidateOptions, ValidationResult,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn validate_default(response: &str) -> ValidationResult {
    validate(response, &ValidateOptions::default())
}

/// A well-structured advisory response: fenced SQL, a findings table,
/// priorities, and a measured timing.
const GOOD_RESPONSE: &str = r#"## Analysis of dbo.GetOrders

The clustered index seek covers the predicate well. Average duration was 12 ms.

| Finding | Severity |
| ------- | -------- |
| Covered seek | low |

Priority: low. No immediate action required.

```sql
SELECT o.Id, o.Total
FROM dbo.Orders AS o
WHERE o.CustomerId = @CustomerId;
```
"#;

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_destructive_statement_blocks_and_masks() {
    let result = validate_default("First run DROP DATABASE Foo; then re-run the query.");

    assert!(!result.is_valid);
    assert_eq!(result.danger_level, DangerLevel::Critical);
    assert_eq!(result.blocked_commands, vec!["DROP DATABASE Foo".to_string()]);
    assert!(!result.sanitized_response.contains("DROP DATABASE Foo"));
    assert!(result.sanitized_response.contains("[BLOCKED: DROP DATABASE]"));

    let issue = &result.issues[0];
    assert_eq!(issue.severity, Severity::Critical);
    assert_eq!(issue.category, "blocked_command");
    assert!(issue.blocked);
}

#[test]
fn test_sanitized_output_revalidates_clean() {
    let first = validate_default("Run xp_cmdshell 'dir' to check, or TRUNCATE TABLE dbo.Orders.");
    assert!(!first.is_valid);

    // masking must not leave anything a second pass would flag
    let second = validate_default(&first.sanitized_response);
    assert!(second.is_valid);
    assert_eq!(second.sanitized_response, first.sanitized_response);
    assert!(second.blocked_commands.is_empty());
}

#[test]
fn test_structured_response_scores_above_fifty() {
    let result = validate_default(GOOD_RESPONSE);
    assert!(result.is_valid);
    assert_eq!(result.danger_level, DangerLevel::Safe);
    assert!(result.quality_score > 50, "score {}", result.quality_score);
    assert_eq!(result.sanitized_response, GOOD_RESPONSE);
}

#[test]
fn test_strict_mode_invalidates_on_warning() {
    let response = "Add WITH (NOLOCK) to the query to reduce blocking.";

    let lenient = validate_default(response);
    assert!(lenient.is_valid);
    assert_eq!(lenient.danger_level, DangerLevel::Low);

    let strict = validate(
        response,
        &ValidateOptions {
            strict: true,
            ..ValidateOptions::default()
        },
    );
    assert!(!strict.is_valid);
}

#[test]
fn test_version_gate_flags_new_syntax_for_old_engines() {
    let response = "```sql\nSELECT STRING_AGG(Name, ', ') FROM dbo.Tags;\n```";

    let old = validate(
        response,
        &ValidateOptions {
            engine_major_version: Some(13),
            ..ValidateOptions::default()
        },
    );
    let version_issues: Vec<_> = old
        .issues
        .iter()
        .filter(|i| i.category == "version_compatibility")
        .collect();
    assert_eq!(version_issues.len(), 1);
    assert!(version_issues[0].message.contains("SQL Server 2017"));
    assert!(version_issues[0].message.contains("SQL Server 2016"));

    let new = validate(
        response,
        &ValidateOptions {
            engine_major_version: Some(15),
            ..ValidateOptions::default()
        },
    );
    assert!(new
        .issues
        .iter()
        .all(|i| i.category != "version_compatibility"));
}

#[test]
fn test_denied_gate_decision_drives_suppression() {
    // a real denial: resolved object, zero evidence rows
    let decision = evaluate(&[], &ObjectResolution::resolved("dbo.Orders"), &[], Utc::now());
    assert!(!decision.allowed);

    let response = "Consider adding an index on CustomerId.\n\
                    ```sql\nCREATE NONCLUSTERED INDEX IX_Orders_CustomerId ON dbo.Orders (CustomerId);\n```";
    let result = validate(
        response,
        &ValidateOptions {
            index_suppression: Some(IndexAdviceSuppression {
                reason: decision.reason.as_str().to_string(),
                hints: decision.missing_data_hints.clone(),
            }),
            ..ValidateOptions::default()
        },
    );

    assert!(!result.sanitized_response.contains("CREATE NONCLUSTERED INDEX"));
    assert!(!result.sanitized_response.contains("Consider adding an index"));
    assert!(result
        .sanitized_response
        .contains("[INDEX ADVICE WITHHELD: existing_index_coverage_missing]"));

    let suppressed = result
        .issues
        .iter()
        .find(|i| i.category == "index_advice_suppressed")
        .unwrap();
    assert_eq!(suppressed.severity, Severity::Warning);
    assert!(suppressed.blocked);
    // the gate's hints ride along as the suggestion
    assert!(suppressed
        .suggestion
        .as_deref()
        .unwrap()
        .contains("sys.indexes"));
}

#[test]
fn test_allowed_gate_leaves_index_advice_untouched() {
    let response = "```sql\nCREATE NONCLUSTERED INDEX IX_O ON dbo.Orders (CustomerId);\n```";
    let result = validate_default(response);
    assert!(result.is_valid);
    assert_eq!(result.sanitized_response, response);
    assert!(result
        .issues
        .iter()
        .all(|i| i.category != "index_advice_suppressed"));
}

#[test]
fn test_result_serializes_for_caching() {
    let result = validate_default("DELETE FROM dbo.Orders");
    let json = serde_json::to_string(&result).unwrap();
    let back: ValidationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
    assert!(json.contains("CRITICAL"));
}

//! Response Validation
//!
//! Applies the rule tables to one model response: block and mask
//! destructive commands, warn on risky operations, check version-gated
//! syntax, optionally withhold index advice, and score the result.

use regex::{Captures, NoExpand};
use tracing::{debug, warn};

use crate::models::{DangerLevel, Severity, ValidateOptions, ValidationIssue, ValidationResult};
use crate::rules;

/// Validate and sanitize one model-generated response.
///
/// Total: every input yields a complete [`ValidationResult`]; a dangerous
/// response comes back blocked and masked, never as an error.
pub fn validate(response: &str, options: &ValidateOptions) -> ValidationResult {
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut blocked_commands: Vec<String> = Vec::new();
    let mut sanitized = response.to_string();

    // Blocked commands: record every applicable match, mask them all.
    for compiled in rules::blocked_rules() {
        let mut rule_matched = false;
        for caps in compiled.regex.captures_iter(response) {
            if !compiled.applies(&caps) {
                continue;
            }
            let matched = caps
                .get(0)
                .map(|m| m.as_str().trim())
                .unwrap_or_default()
                .to_string();
            if !rule_matched {
                rule_matched = true;
                issues.push(ValidationIssue::critical(
                    "blocked_command",
                    format!(
                        "{} (found: {})",
                        compiled.rule.message,
                        snippet(&matched, 60)
                    ),
                ));
            }
            if !blocked_commands.contains(&matched) {
                blocked_commands.push(matched);
            }
        }
        if rule_matched {
            let label = compiled.rule.label;
            sanitized = compiled
                .regex
                .replace_all(&sanitized, |caps: &Captures<'_>| {
                    if compiled.applies(caps) {
                        format!("[BLOCKED: {}]", label)
                    } else {
                        caps.get(0).map(|m| m.as_str()).unwrap_or_default().to_string()
                    }
                })
                .into_owned();
        }
    }

    // Warning operations: one issue per rule with an applicable match.
    for compiled in rules::warning_rules() {
        let applicable = compiled
            .regex
            .find_iter(response)
            .any(|m| compiled.applies(m.as_str()));
        if applicable {
            let mut issue = ValidationIssue::warning("warning_operation", compiled.rule.message);
            if let Some(suggestion) = compiled.rule.suggestion {
                issue = issue.with_suggestion(suggestion);
            }
            issues.push(issue);
        }
    }

    // Version compatibility, only for SQL-looking text with a known target.
    let looks_like_sql = rules::sql_fence_pattern().is_match(response)
        || rules::sql_keyword_pattern().is_match(response);
    if let (Some(major), true) = (options.engine_major_version, looks_like_sql) {
        for (regex, rule) in rules::version_rules() {
            if rule.min_major > major && regex.is_match(response) {
                issues.push(
                    ValidationIssue::warning(
                        "version_compatibility",
                        format!(
                            "{} requires {} but the target engine is {}",
                            rule.feature,
                            rules::version_name(rule.min_major),
                            rules::version_name(major)
                        ),
                    )
                    .with_suggestion(rule.suggestion),
                );
            }
        }
    }

    // Gate-driven index-advice suppression.
    if let Some(suppression) = &options.index_suppression {
        let marker = format!("[INDEX ADVICE WITHHELD: {}]", suppression.reason);
        let mut masked_any = false;
        for regex in rules::index_advice_patterns() {
            if regex.is_match(&sanitized) {
                masked_any = true;
                sanitized = regex
                    .replace_all(&sanitized, NoExpand(marker.as_str()))
                    .into_owned();
            }
        }
        if masked_any {
            let mut issue = ValidationIssue::warning(
                "index_advice_suppressed",
                format!(
                    "Index advice withheld; evidence gate denied it ({})",
                    suppression.reason
                ),
            );
            issue.blocked = true;
            if !suppression.hints.is_empty() {
                issue = issue.with_suggestion(suppression.hints.join(" "));
            }
            issues.push(issue);
        }
    }

    // Quality score: baseline, issue penalties, practice weights, bonuses.
    let critical_count = issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .count();
    let warning_count = issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .count();

    let sql = sql_regions(response);
    let mut score: i32 = 50;
    score -= 30 * critical_count as i32;
    score -= 5 * warning_count as i32;
    for (regex, rule) in rules::best_practices() {
        if regex.is_match(&sql) {
            score += rule.weight;
        }
    }
    for (regex, rule) in rules::anti_patterns() {
        if regex.is_match(&sql) {
            score -= rule.weight;
        }
    }
    if response.len() >= 500 {
        score += 5;
    }
    if response.contains("```") {
        score += 5;
    }
    if has_markdown_table(response) {
        score += 5;
    }
    if rules::priority_pattern().is_match(response) {
        score += 5;
    }
    if rules::metric_pattern().is_match(response) {
        score += 5;
    }
    let quality_score = score.clamp(0, 100) as u8;

    let danger_level = if critical_count > 0 {
        DangerLevel::Critical
    } else if warning_count > 3 {
        DangerLevel::Medium
    } else if warning_count > 0 {
        DangerLevel::Low
    } else {
        DangerLevel::Safe
    };
    let is_valid = critical_count == 0 && !(options.strict && warning_count > 0);

    if critical_count > 0 {
        warn!(
            blocked = blocked_commands.len(),
            "destructive commands masked out of advisor response"
        );
    }
    debug!(
        quality_score,
        danger = %danger_level,
        issues = issues.len(),
        "response validated"
    );

    ValidationResult {
        is_valid,
        danger_level,
        issues,
        sanitized_response: sanitized,
        quality_score,
        blocked_commands,
    }
}

/// Fenced ```sql bodies joined together, or the whole text without fences.
fn sql_regions(text: &str) -> String {
    let fences: Vec<&str> = rules::sql_fence_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if fences.is_empty() {
        text.to_string()
    } else {
        fences.join("\n")
    }
}

/// A header row followed by a `|---|` separator row.
fn has_markdown_table(text: &str) -> bool {
    let mut saw_header = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('|') && trimmed.ends_with('|') {
            if saw_header
                && trimmed.contains('-')
                && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
            {
                return true;
            }
            saw_header = true;
        } else {
            saw_header = false;
        }
    }
    false
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let shortened: String = text.chars().take(max_chars).collect();
        format!("{}...", shortened)
    }
}

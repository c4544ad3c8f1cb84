//! Validation Rule Tables
//!
//! Every pattern the validator applies lives here as data: blocked
//! commands, warning operations, best practices, anti-patterns, the
//! version-feature table, and the index-advice blocklist. Tables are
//! compiled into matchers once on first use; adding a rule is a table
//! edit, never a control-flow change.

use std::sync::OnceLock;

use regex::{Captures, Regex};

// ============================================================
// Blocked commands (critical, masked out of the response)
// ============================================================

pub struct BlockedRule {
    /// Short label used in `[BLOCKED: <label>]` markers. Labels are worded
    /// so a marker can never re-match its own pattern, which keeps
    /// sanitization idempotent.
    pub label: &'static str,
    pattern: &'static str,
    /// A candidate match containing this pattern is not blocked
    exemption: Option<&'static str>,
    /// A capture-1 target naming a `#`-prefixed temp table is not blocked
    exempt_temp_target: bool,
    pub message: &'static str,
}

pub struct CompiledBlockedRule {
    pub rule: &'static BlockedRule,
    pub regex: Regex,
    exemption: Option<Regex>,
}

impl CompiledBlockedRule {
    /// Whether one concrete match is genuinely blocked, after exemptions.
    pub fn applies(&self, caps: &Captures<'_>) -> bool {
        let matched = caps.get(0).map(|m| m.as_str()).unwrap_or("");
        if let Some(exemption) = &self.exemption {
            if exemption.is_match(matched) {
                return false;
            }
        }
        if self.rule.exempt_temp_target {
            if let Some(target) = caps.get(1) {
                if is_temp_table(target.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

fn is_temp_table(identifier: &str) -> bool {
    identifier.trim_start_matches('[').starts_with('#')
}

const BLOCKED_RULES: &[BlockedRule] = &[
    BlockedRule {
        label: "DROP DATABASE",
        pattern: r"(?i)\bDROP\s+DATABASE\s+(?:IF\s+EXISTS\s+)?\[?\w+\]?",
        exemption: None,
        exempt_temp_target: false,
        message: "Dropping a database is never acceptable advisor output.",
    },
    BlockedRule {
        label: "DROP TABLE",
        pattern: r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?([#\[\w][\w.\[\]#]*)",
        exemption: Some(r"(?i)\bIF\s+EXISTS\b"),
        exempt_temp_target: true,
        message: "Dropping a permanent table without an existence guard destroys data.",
    },
    BlockedRule {
        label: "TRUNCATE TABLE",
        pattern: r"(?i)\bTRUNCATE\s+TABLE\s+([#\[\w][\w.\[\]#]*)",
        exemption: None,
        exempt_temp_target: true,
        message: "Truncating a permanent table destroys data irreversibly.",
    },
    BlockedRule {
        label: "DELETE without WHERE",
        pattern: r"(?is)\bDELETE\s+FROM\s+([#\[\w][\w.\[\]#]*)[^;]{0,200}",
        exemption: Some(r"(?i)\bWHERE\b"),
        exempt_temp_target: true,
        message: "DELETE with no predicate removes every row in the table.",
    },
    BlockedRule {
        label: "shell command execution",
        pattern: r"(?i)\bxp_cmdshell\b",
        exemption: None,
        exempt_temp_target: false,
        message: "xp_cmdshell executes operating-system commands from the engine.",
    },
    BlockedRule {
        label: "server configuration change",
        pattern: r"(?i)\bsp_configure\b|\bRECONFIGURE\b|\bALTER\s+SERVER\s+CONFIGURATION\b",
        exemption: None,
        exempt_temp_target: false,
        message: "Server-level configuration changes are outside advisor scope.",
    },
    BlockedRule {
        label: "privilege escalation",
        pattern: r"(?is)\bGRANT\s+CONTROL\b|\bsp_addsrvrolemember\b|\bALTER\s+SERVER\s+ROLE\b.{0,80}?\bADD\s+MEMBER\b",
        exemption: None,
        exempt_temp_target: false,
        message: "Privilege grants must go through access review, not advisor output.",
    },
    BlockedRule {
        label: "login creation",
        pattern: r"(?i)\bCREATE\s+LOGIN\b",
        exemption: None,
        exempt_temp_target: false,
        message: "Creating logins is outside advisor scope.",
    },
    BlockedRule {
        label: "external data access",
        pattern: r"(?i)\bOPENROWSET\s*\(|\bOPENDATASOURCE\s*\(|\bBULK\s+INSERT\b",
        exemption: None,
        exempt_temp_target: false,
        message: "Ad-hoc external data access can import or exfiltrate arbitrary data.",
    },
    BlockedRule {
        label: "database restore",
        pattern: r"(?i)\bRESTORE\s+(?:DATABASE|LOG)\b",
        exemption: None,
        exempt_temp_target: false,
        message: "Restore operations overwrite live data.",
    },
    BlockedRule {
        label: "server shutdown",
        pattern: r"(?im)^\s*SHUTDOWN(?:\s+WITH\s+NOWAIT)?\s*;?\s*$",
        exemption: None,
        exempt_temp_target: false,
        message: "Shutting the instance down is never acceptable advisor output.",
    },
];

static COMPILED_BLOCKED: OnceLock<Vec<CompiledBlockedRule>> = OnceLock::new();

pub fn blocked_rules() -> &'static [CompiledBlockedRule] {
    COMPILED_BLOCKED.get_or_init(|| {
        BLOCKED_RULES
            .iter()
            .map(|rule| CompiledBlockedRule {
                regex: Regex::new(rule.pattern).expect("blocked pattern compiles"),
                exemption: rule
                    .exemption
                    .map(|p| Regex::new(p).expect("exemption pattern compiles")),
                rule,
            })
            .collect()
    })
}

// ============================================================
// Warning operations (legitimate sometimes, never silent)
// ============================================================

pub struct WarningRule {
    pattern: &'static str,
    exemption: Option<&'static str>,
    pub message: &'static str,
    pub suggestion: Option<&'static str>,
}

pub struct CompiledWarningRule {
    pub rule: &'static WarningRule,
    pub regex: Regex,
    exemption: Option<Regex>,
}

impl CompiledWarningRule {
    pub fn applies(&self, matched: &str) -> bool {
        match &self.exemption {
            Some(exemption) => !exemption.is_match(matched),
            None => true,
        }
    }
}

const WARNING_RULES: &[WarningRule] = &[
    WarningRule {
        pattern: r"(?i)\bDROP\s+INDEX\b",
        exemption: None,
        message: "Dropping an index affects every query that uses it.",
        suggestion: Some("Check sys.dm_db_index_usage_stats for the index before dropping it."),
    },
    WarningRule {
        pattern: r"(?is)\bALTER\s+TABLE\b.{0,120}?\bDROP\s+COLUMN\b",
        exemption: None,
        message: "Dropping a column is destructive and breaks dependent code.",
        suggestion: Some("Deprecate the column first and verify no readers remain."),
    },
    WarningRule {
        pattern: r"(?i)\bNOLOCK\b",
        exemption: None,
        message: "NOLOCK reads uncommitted data and can skip or double-count rows.",
        suggestion: Some("Prefer READ COMMITTED SNAPSHOT isolation."),
    },
    WarningRule {
        pattern: r"(?i)\bREAD\s+UNCOMMITTED\b",
        exemption: None,
        message: "READ UNCOMMITTED carries the same dirty-read anomalies as NOLOCK.",
        suggestion: Some("Prefer READ COMMITTED SNAPSHOT isolation."),
    },
    WarningRule {
        pattern: r"(?i)\bWITH\s+RECOMPILE\b|\bOPTION\s*\(\s*RECOMPILE\s*\)",
        exemption: None,
        message: "Forced recompilation spends CPU on every execution.",
        suggestion: Some("Reserve RECOMPILE for genuinely volatile predicates."),
    },
    WarningRule {
        pattern: r"(?i)\bDBCC\s+(?:FREEPROCCACHE|DROPCLEANBUFFERS)\b",
        exemption: None,
        message: "Flushing caches degrades the whole instance, not just the tested query.",
        suggestion: Some("Scope plan-cache clears to a single plan handle."),
    },
    WarningRule {
        pattern: r"(?is)\bALTER\s+INDEX\b.{0,200}?\bREBUILD\b[^;]{0,200}",
        exemption: Some(r"(?i)\bONLINE\s*=\s*ON\b"),
        message: "Offline index rebuilds block reads and writes for the duration.",
        suggestion: Some("Use REBUILD WITH (ONLINE = ON) on editions that support it."),
    },
    WarningRule {
        pattern: r"(?is)\bUPDATE\s+STATISTICS\b.{0,120}?\bWITH\s+FULLSCAN\b",
        exemption: None,
        message: "FULLSCAN statistics updates read the entire table.",
        suggestion: Some("Sampled updates are usually sufficient outside maintenance windows."),
    },
];

static COMPILED_WARNINGS: OnceLock<Vec<CompiledWarningRule>> = OnceLock::new();

pub fn warning_rules() -> &'static [CompiledWarningRule] {
    COMPILED_WARNINGS.get_or_init(|| {
        WARNING_RULES
            .iter()
            .map(|rule| CompiledWarningRule {
                regex: Regex::new(rule.pattern).expect("warning pattern compiles"),
                exemption: rule
                    .exemption
                    .map(|p| Regex::new(p).expect("exemption pattern compiles")),
                rule,
            })
            .collect()
    })
}

// ============================================================
// Quality scoring tables
// ============================================================

pub struct PracticeRule {
    pub name: &'static str,
    pattern: &'static str,
    /// Score delta magnitude; best practices add it, anti-patterns subtract
    pub weight: i32,
}

const BEST_PRACTICES: &[PracticeRule] = &[
    PracticeRule {
        name: "covering INCLUDE columns",
        pattern: r"(?i)\bINCLUDE\s*\(",
        weight: 5,
    },
    PracticeRule {
        name: "online index operation",
        pattern: r"(?i)\bONLINE\s*=\s*ON\b",
        weight: 5,
    },
    PracticeRule {
        name: "filtered index",
        pattern: r"(?is)\bCREATE\s+(?:UNIQUE\s+)?(?:NONCLUSTERED\s+)?INDEX\b.{0,200}?\bWHERE\b",
        weight: 4,
    },
    PracticeRule {
        name: "existence guard",
        pattern: r"(?i)\bIF\s+EXISTS\s*\(\s*SELECT\b|\bIF\s+OBJECT_ID\s*\(",
        weight: 3,
    },
    PracticeRule {
        name: "statistics maintenance",
        pattern: r"(?i)\bUPDATE\s+STATISTICS\b|\bsp_updatestats\b",
        weight: 3,
    },
    PracticeRule {
        name: "error handling",
        pattern: r"(?i)\bBEGIN\s+TRY\b",
        weight: 3,
    },
    PracticeRule {
        name: "schema-qualified names",
        pattern: r"(?i)\b(?:FROM|JOIN|INTO|ON)\s+\[?\w+\]?\.\[?\w+\]?",
        weight: 2,
    },
];

const ANTI_PATTERNS: &[PracticeRule] = &[
    PracticeRule {
        name: "SELECT *",
        pattern: r"(?i)\bSELECT\s+\*\s+FROM\b",
        weight: 5,
    },
    PracticeRule {
        name: "leading wildcard LIKE",
        pattern: r"(?i)\bLIKE\s+N?'%",
        weight: 4,
    },
    PracticeRule {
        name: "function on filtered column",
        pattern: r"(?is)\bWHERE\b.{0,200}?\b(?:UPPER|LOWER|CONVERT|CAST|ISNULL|YEAR|MONTH|DAY)\s*\(",
        weight: 4,
    },
    PracticeRule {
        name: "cursor iteration",
        pattern: r"(?i)\bDECLARE\s+\S+\s+CURSOR\b",
        weight: 5,
    },
    PracticeRule {
        name: "index hint",
        pattern: r"(?i)\bWITH\s*\(\s*INDEX\s*[=(]",
        weight: 3,
    },
];

static COMPILED_PRACTICES: OnceLock<Vec<(Regex, &'static PracticeRule)>> = OnceLock::new();
static COMPILED_ANTIPATTERNS: OnceLock<Vec<(Regex, &'static PracticeRule)>> = OnceLock::new();

fn compile_practices(
    table: &'static [PracticeRule],
    cell: &'static OnceLock<Vec<(Regex, &'static PracticeRule)>>,
) -> &'static [(Regex, &'static PracticeRule)] {
    cell.get_or_init(|| {
        table
            .iter()
            .map(|rule| {
                (
                    Regex::new(rule.pattern).expect("practice pattern compiles"),
                    rule,
                )
            })
            .collect()
    })
}

pub fn best_practices() -> &'static [(Regex, &'static PracticeRule)] {
    compile_practices(BEST_PRACTICES, &COMPILED_PRACTICES)
}

pub fn anti_patterns() -> &'static [(Regex, &'static PracticeRule)] {
    compile_practices(ANTI_PATTERNS, &COMPILED_ANTIPATTERNS)
}

// ============================================================
// Version-feature table
// ============================================================

pub struct VersionRule {
    pub feature: &'static str,
    pattern: &'static str,
    /// Minimum engine major version (13 = 2016, 14 = 2017, 15 = 2019, 16 = 2022)
    pub min_major: u32,
    pub suggestion: &'static str,
}

const VERSION_RULES: &[VersionRule] = &[
    VersionRule {
        feature: "STRING_AGG",
        pattern: r"(?i)\bSTRING_AGG\s*\(",
        min_major: 14,
        suggestion: "Use FOR XML PATH('') concatenation on SQL Server 2016 and older.",
    },
    VersionRule {
        feature: "TRIM",
        pattern: r"(?i)\bTRIM\s*\(",
        min_major: 14,
        suggestion: "Use LTRIM(RTRIM(...)) on SQL Server 2016 and older.",
    },
    VersionRule {
        feature: "CONCAT_WS",
        pattern: r"(?i)\bCONCAT_WS\s*\(",
        min_major: 14,
        suggestion: "Use CONCAT with explicit separators on SQL Server 2016 and older.",
    },
    VersionRule {
        feature: "STRING_SPLIT",
        pattern: r"(?i)\bSTRING_SPLIT\s*\(",
        min_major: 13,
        suggestion: "Use a table-valued splitter function before SQL Server 2016.",
    },
    VersionRule {
        feature: "DROP ... IF EXISTS",
        pattern: r"(?i)\bDROP\s+(?:TABLE|INDEX|PROCEDURE|VIEW)\s+IF\s+EXISTS\b",
        min_major: 13,
        suggestion: "Guard with IF OBJECT_ID(...) IS NOT NULL before SQL Server 2016.",
    },
    VersionRule {
        feature: "CREATE OR ALTER",
        pattern: r"(?i)\bCREATE\s+OR\s+ALTER\b",
        min_major: 13,
        suggestion: "Split into separate CREATE and ALTER statements before SQL Server 2016 SP1.",
    },
    VersionRule {
        feature: "DATEDIFF_BIG",
        pattern: r"(?i)\bDATEDIFF_BIG\s*\(",
        min_major: 13,
        suggestion: "Use DATEDIFF with coarser units before SQL Server 2016.",
    },
    VersionRule {
        feature: "APPROX_COUNT_DISTINCT",
        pattern: r"(?i)\bAPPROX_COUNT_DISTINCT\s*\(",
        min_major: 15,
        suggestion: "Use COUNT(DISTINCT ...) before SQL Server 2019.",
    },
    VersionRule {
        feature: "GREATEST/LEAST",
        pattern: r"(?i)\b(?:GREATEST|LEAST)\s*\(",
        min_major: 16,
        suggestion: "Use CASE expressions before SQL Server 2022.",
    },
    VersionRule {
        feature: "DATETRUNC",
        pattern: r"(?i)\bDATETRUNC\s*\(",
        min_major: 16,
        suggestion: "Use DATEADD/DATEDIFF rounding before SQL Server 2022.",
    },
    VersionRule {
        feature: "GENERATE_SERIES",
        pattern: r"(?i)\bGENERATE_SERIES\s*\(",
        min_major: 16,
        suggestion: "Use a numbers table before SQL Server 2022.",
    },
];

static COMPILED_VERSIONS: OnceLock<Vec<(Regex, &'static VersionRule)>> = OnceLock::new();

pub fn version_rules() -> &'static [(Regex, &'static VersionRule)] {
    COMPILED_VERSIONS.get_or_init(|| {
        VERSION_RULES
            .iter()
            .map(|rule| {
                (
                    Regex::new(rule.pattern).expect("version pattern compiles"),
                    rule,
                )
            })
            .collect()
    })
}

/// Marketing name for an engine major version.
pub fn version_name(major: u32) -> &'static str {
    match major {
        13 => "SQL Server 2016",
        14 => "SQL Server 2017",
        15 => "SQL Server 2019",
        16 => "SQL Server 2022",
        _ => "a newer SQL Server release",
    }
}

// ============================================================
// Index-advice blocklist (applied only under gate suppression)
// ============================================================

const INDEX_ADVICE_PATTERNS: &[&str] = &[
    r"(?i)\bCREATE\s+(?:UNIQUE\s+)?(?:CLUSTERED\s+|NONCLUSTERED\s+|COLUMNSTORE\s+)?INDEX\b[^;\n]*",
    r"(?i)\bALTER\s+INDEX\b[^;\n]*",
    r"(?i)\bDROP\s+INDEX\b[^;\n]*",
    r"(?i)\b(?:recommend|suggest|consider)(?:ed|ing|s)?\s+(?:creating|adding|building)\s+(?:a\s+|an\s+)?(?:new\s+|covering\s+|filtered\s+)?index(?:es)?[^.\n]*",
    r"(?i)\badd(?:ing)?\s+(?:a\s+|an\s+)?(?:new\s+|covering\s+|filtered\s+)?index\b[^.\n]*",
];

static COMPILED_INDEX_ADVICE: OnceLock<Vec<Regex>> = OnceLock::new();

pub fn index_advice_patterns() -> &'static [Regex] {
    COMPILED_INDEX_ADVICE.get_or_init(|| {
        INDEX_ADVICE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("index advice pattern compiles"))
            .collect()
    })
}

// ============================================================
// Structure and metric detection
// ============================================================

static SQL_FENCE: OnceLock<Regex> = OnceLock::new();
static SQL_KEYWORDS: OnceLock<Regex> = OnceLock::new();
static METRICS: OnceLock<Regex> = OnceLock::new();
static PRIORITY: OnceLock<Regex> = OnceLock::new();

/// Matches ```sql fenced blocks, capturing the code body.
pub fn sql_fence_pattern() -> &'static Regex {
    SQL_FENCE.get_or_init(|| Regex::new(r"(?is)```sql\s*(.*?)```").expect("fence pattern compiles"))
}

pub fn sql_keyword_pattern() -> &'static Regex {
    SQL_KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)\b(?:SELECT|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP|INDEX|FROM|WHERE)\b")
            .expect("keyword pattern compiles")
    })
}

pub fn metric_pattern() -> &'static Regex {
    METRICS.get_or_init(|| {
        Regex::new(r"\d+(?:\.\d+)?\s*%|\b\d+(?:\.\d+)?\s*(?:ms|sec|rows?|KB|MB|GB)\b")
            .expect("metric pattern compiles")
    })
}

pub fn priority_pattern() -> &'static Regex {
    PRIORITY.get_or_init(|| Regex::new(r"(?i)\bpriority\b").expect("priority pattern compiles"))
}

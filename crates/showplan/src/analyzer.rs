//! Showplan Analyzer
//!
//! Single-pass walk over a SQL Server execution-plan XML document
//! (showplan format), producing [`PlanInsights`]. The entry point
//! [`analyze`] is total: any input yields insights, with parse and
//! internal failures reported as warnings instead of errors.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::models::{
    MissingIndex, PlanInsights, PlanOperator, PlanWarning, WarningCategory, WarningSeverity,
};

/// XML namespace of the showplan schema. Plans exported by SSMS and
/// `SET STATISTICS XML ON` both carry it on the root element.
pub const SHOWPLAN_NAMESPACE: &str =
    "http://schemas.microsoft.com/sqlserver/2004/07/showplan";

/// Operator names that warrant a closer look whenever they appear.
/// Matched against the display name after lookup reclassification.
pub const EXPENSIVE_OPERATORS: [&str; 10] = [
    "Table Scan",
    "Clustered Index Scan",
    "Index Scan",
    "Key Lookup",
    "RID Lookup",
    "Sort",
    "Hash Match",
    "Table Spool",
    "Index Spool",
    "Row Count Spool",
];

/// Analyze an execution-plan XML document.
///
/// Never fails: unparseable input produces a [`WarningCategory::ParseError`]
/// warning and an otherwise empty result; an unexpected internal condition
/// produces [`WarningCategory::AnalysisError`] the same way.
pub fn analyze(plan_xml: &str) -> PlanInsights {
    match Walker::run(plan_xml) {
        Ok(insights) => {
            debug!(
                operators = insights.operators.len(),
                warnings = insights.warnings.len(),
                missing_indexes = insights.missing_indexes.len(),
                "execution plan analyzed"
            );
            insights
        }
        Err(WalkError::Parse(detail)) => {
            debug!(%detail, "execution plan XML rejected");
            PlanInsights::parse_failure(detail)
        }
        Err(WalkError::Analysis(detail)) => {
            debug!(%detail, "execution plan analysis aborted");
            PlanInsights::analysis_failure(detail)
        }
    }
}

enum WalkError {
    Parse(String),
    Analysis(String),
}

/// Column role within a missing-index suggestion.
#[derive(Clone, Copy, PartialEq)]
enum ColumnUsage {
    Equality,
    Inequality,
    Include,
    Other,
}

/// In-flight missing-index suggestion; completed on `MissingIndexGroup` end.
struct MissingIndexBuilder {
    impact: f64,
    database: String,
    schema: String,
    table: String,
    equality: Vec<String>,
    inequality: Vec<String>,
    include: Vec<String>,
    usage: ColumnUsage,
}

impl MissingIndexBuilder {
    fn new(impact: f64) -> Self {
        Self {
            impact,
            database: String::new(),
            schema: String::new(),
            table: String::new(),
            equality: Vec::new(),
            inequality: Vec::new(),
            include: Vec::new(),
            usage: ColumnUsage::Other,
        }
    }

    fn build(self) -> Option<MissingIndex> {
        if self.table.is_empty() {
            return None;
        }
        Some(MissingIndex {
            database: self.database,
            schema: self.schema,
            table: self.table,
            equality_columns: self.equality,
            inequality_columns: self.inequality,
            include_columns: self.include,
            impact: self.impact,
        })
    }
}

/// Streaming walker over the plan document.
///
/// Holds the partial [`PlanInsights`] plus the context needed to attribute
/// nested elements (runtime counters, warning blocks, missing-index groups)
/// to the operator that contains them.
struct Walker {
    insights: PlanInsights,
    /// Indexes into `insights.operators` for the open `RelOp` chain
    op_stack: Vec<usize>,
    in_runtime_info: bool,
    in_warnings: bool,
    in_no_stats: bool,
    missing_index: Option<MissingIndexBuilder>,
    saw_root: bool,
    saw_relop: bool,
    saw_missing_stats: bool,
    saw_no_join_predicate: bool,
    root_subtree_max: f64,
    scan_tables: Vec<String>,
    convert_expressions: Vec<String>,
    no_stats_columns: Vec<String>,
    sort_spill_nodes: Vec<String>,
    hash_spill_nodes: Vec<String>,
}

impl Walker {
    fn run(plan_xml: &str) -> Result<PlanInsights, WalkError> {
        let mut reader = Reader::from_str(plan_xml);

        let mut walker = Self {
            insights: PlanInsights::default(),
            op_stack: Vec::new(),
            in_runtime_info: false,
            in_warnings: false,
            in_no_stats: false,
            missing_index: None,
            saw_root: false,
            saw_relop: false,
            saw_missing_stats: false,
            saw_no_join_predicate: false,
            root_subtree_max: 0.0,
            scan_tables: Vec::new(),
            convert_expressions: Vec::new(),
            no_stats_columns: Vec::new(),
            sort_spill_nodes: Vec::new(),
            hash_spill_nodes: Vec::new(),
        };

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => walker.handle_element(&e, false),
                Ok(Event::Empty(e)) => walker.handle_element(&e, true),
                Ok(Event::End(e)) => walker.handle_end(e.local_name().as_ref())?,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(WalkError::Parse(e.to_string())),
            }
            buf.clear();
        }

        walker.finish()
    }

    fn handle_element(&mut self, e: &BytesStart<'_>, is_empty: bool) {
        let local = e.local_name();
        let name = local.as_ref();

        // Children of a Warnings block are warning markers, not structure.
        if self.in_warnings {
            self.record_operator_warning(name);
            match name {
                b"SpillToTempDb" => self.record_spill_for_current_op(),
                b"SortSpillDetails" => self.record_sort_spill(),
                b"HashSpillDetails" => self.record_hash_spill(),
                b"PlanAffectingConvert" => {
                    self.insights.has_implicit_conversion = true;
                    if let Some(expr) = attr_str(e, b"Expression") {
                        if !self.convert_expressions.contains(&expr) {
                            self.convert_expressions.push(expr);
                        }
                    }
                }
                b"ColumnsWithNoStatistics" => {
                    self.saw_missing_stats = true;
                    if !is_empty {
                        self.in_no_stats = true;
                    }
                }
                b"ColumnReference" if self.in_no_stats => {
                    if let Some(column) = attr_str(e, b"Column") {
                        self.no_stats_columns.push(strip_brackets(&column));
                    }
                }
                _ => {}
            }
            return;
        }

        match name {
            b"ShowPlanXML" => self.saw_root = true,
            b"StmtSimple" => {
                if let Some(cost) = attr_f64(e, b"StatementSubTreeCost") {
                    self.insights.total_cost += cost;
                }
            }
            b"QueryPlan" => {
                if let Some(dop) = attr_u32(e, b"DegreeOfParallelism") {
                    self.insights.degree_of_parallelism =
                        self.insights.degree_of_parallelism.max(dop);
                }
            }
            b"RelOp" => self.open_operator(e, is_empty),
            b"Warnings" => {
                if attr_bool(e, b"NoJoinPredicate") {
                    self.saw_no_join_predicate = true;
                    self.record_operator_warning(b"NoJoinPredicate");
                }
                if !is_empty {
                    self.in_warnings = true;
                }
            }
            b"IndexScan" => {
                // A seek flagged Lookup is the bookmark-lookup half of a
                // nonclustered seek; surface it under its common name.
                if attr_bool(e, b"Lookup") {
                    if let Some(&idx) = self.op_stack.last() {
                        self.insights.operators[idx].name = "Key Lookup".to_string();
                    }
                }
            }
            b"Object" => {
                if let (Some(&idx), Some(table)) =
                    (self.op_stack.last(), attr_str(e, b"Table"))
                {
                    if self.insights.operators[idx].physical_op == "Table Scan" {
                        let table = strip_brackets(&table);
                        if !self.scan_tables.contains(&table) {
                            self.scan_tables.push(table);
                        }
                    }
                }
            }
            b"RunTimeInformation" => {
                if !is_empty {
                    self.in_runtime_info = true;
                }
            }
            b"RunTimeCountersPerThread" => {
                // First counter per operator only; later threads repeat.
                if self.in_runtime_info {
                    if let Some(&idx) = self.op_stack.last() {
                        let op = &mut self.insights.operators[idx];
                        if op.actual_rows.is_none() {
                            op.actual_rows =
                                Some(attr_f64(e, b"ActualRows").unwrap_or(0.0));
                        }
                    }
                }
            }
            b"MissingIndexGroup" => {
                let impact = attr_f64(e, b"Impact").unwrap_or(0.0);
                self.missing_index = Some(MissingIndexBuilder::new(impact));
            }
            b"MissingIndex" => {
                if let Some(builder) = self.missing_index.as_mut() {
                    builder.database =
                        strip_brackets(&attr_str(e, b"Database").unwrap_or_default());
                    builder.schema =
                        strip_brackets(&attr_str(e, b"Schema").unwrap_or_default());
                    builder.table =
                        strip_brackets(&attr_str(e, b"Table").unwrap_or_default());
                }
            }
            b"ColumnGroup" => {
                if let Some(builder) = self.missing_index.as_mut() {
                    builder.usage = match attr_str(e, b"Usage") {
                        Some(u) if u.eq_ignore_ascii_case("EQUALITY") => ColumnUsage::Equality,
                        Some(u) if u.eq_ignore_ascii_case("INEQUALITY") => {
                            ColumnUsage::Inequality
                        }
                        Some(u) if u.eq_ignore_ascii_case("INCLUDE") => ColumnUsage::Include,
                        _ => ColumnUsage::Other,
                    };
                }
            }
            b"Column" => {
                if let (Some(builder), Some(column)) =
                    (self.missing_index.as_mut(), attr_str(e, b"Name"))
                {
                    let column = strip_brackets(&column);
                    match builder.usage {
                        ColumnUsage::Equality => builder.equality.push(column),
                        ColumnUsage::Inequality => builder.inequality.push(column),
                        ColumnUsage::Include => builder.include.push(column),
                        ColumnUsage::Other => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, name: &[u8]) -> Result<(), WalkError> {
        match name {
            b"RelOp" => {
                self.op_stack.pop().ok_or_else(|| {
                    WalkError::Analysis("operator stack underflow".to_string())
                })?;
            }
            b"Warnings" => self.in_warnings = false,
            b"ColumnsWithNoStatistics" => self.in_no_stats = false,
            b"RunTimeInformation" => self.in_runtime_info = false,
            b"MissingIndexGroup" => {
                if let Some(index) = self.missing_index.take().and_then(|b| b.build()) {
                    self.insights.missing_indexes.push(index);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn open_operator(&mut self, e: &BytesStart<'_>, is_empty: bool) {
        self.saw_relop = true;
        let physical_op = attr_str(e, b"PhysicalOp").unwrap_or_default();
        let cpu_cost = attr_f64(e, b"EstimateCPU").unwrap_or(0.0);
        let io_cost = attr_f64(e, b"EstimateIO").unwrap_or(0.0);
        let op = PlanOperator {
            name: physical_op.clone(),
            physical_op,
            logical_op: attr_str(e, b"LogicalOp").unwrap_or_default(),
            node_id: attr_u32(e, b"NodeId"),
            estimated_rows: attr_f64(e, b"EstimateRows").unwrap_or(0.0),
            actual_rows: None,
            cpu_cost,
            io_cost,
            estimated_cost: cpu_cost + io_cost,
            subtree_cost: attr_f64(e, b"EstimatedTotalSubtreeCost").unwrap_or(0.0),
            parallel: attr_bool(e, b"Parallel"),
            warnings: Vec::new(),
        };
        if self.op_stack.is_empty() {
            self.root_subtree_max = self.root_subtree_max.max(op.subtree_cost);
        }
        self.insights.operators.push(op);
        // a self-closing RelOp has no children and no matching end tag
        if !is_empty {
            self.op_stack.push(self.insights.operators.len() - 1);
        }
    }

    fn record_operator_warning(&mut self, name: &[u8]) {
        if let Some(&idx) = self.op_stack.last() {
            self.insights.operators[idx]
                .warnings
                .push(String::from_utf8_lossy(name).into_owned());
        }
    }

    fn record_spill_for_current_op(&mut self) {
        // The generic spill element says nothing about what spilled;
        // the enclosing operator does.
        let is_hash = self
            .op_stack
            .last()
            .map(|&idx| self.insights.operators[idx].physical_op.contains("Hash"))
            .unwrap_or(false);
        if is_hash {
            self.record_hash_spill();
        } else {
            self.record_sort_spill();
        }
    }

    fn record_sort_spill(&mut self) {
        self.insights.has_sort_warning = true;
        self.sort_spill_nodes.push(self.current_node_label());
    }

    fn record_hash_spill(&mut self) {
        self.insights.has_hash_spill = true;
        self.hash_spill_nodes.push(self.current_node_label());
    }

    fn current_node_label(&self) -> String {
        self.op_stack
            .last()
            .and_then(|&idx| self.insights.operators[idx].node_id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Derive flags, the expensive-operator list, and the warning set from
    /// the walked document.
    fn finish(self) -> Result<PlanInsights, WalkError> {
        if !self.saw_root && !self.saw_relop {
            return Err(WalkError::Parse(
                "no ShowPlanXML root element found".to_string(),
            ));
        }

        let mut insights = self.insights;

        // Statement nodes normally carry the cost; fragments without one
        // fall back to the costliest root operator.
        if insights.total_cost == 0.0 {
            insights.total_cost = self.root_subtree_max;
        }

        insights.has_table_scan = insights.operators.iter().any(|o| o.name == "Table Scan");
        insights.has_key_lookup = insights
            .operators
            .iter()
            .any(|o| o.name == "Key Lookup" || o.name == "RID Lookup");
        insights.parallel = insights.operators.iter().any(|o| o.name == "Parallelism");

        for op in &insights.operators {
            if EXPENSIVE_OPERATORS.contains(&op.name.as_str())
                && !insights.expensive_operators.contains(&op.name)
            {
                insights.expensive_operators.push(op.name.clone());
            }
        }

        // One warning per finding kind, then one per misestimated operator.
        if insights.has_table_scan {
            let count = insights
                .operators
                .iter()
                .filter(|o| o.name == "Table Scan")
                .count();
            let message = if self.scan_tables.is_empty() {
                format!("{} Table Scan operator(s) read every row of their table", count)
            } else {
                format!("Table Scan on {}", self.scan_tables.join(", "))
            };
            insights.warnings.push(PlanWarning::new(
                WarningCategory::TableScan,
                WarningSeverity::High,
                message,
            ));
        }

        if insights.has_key_lookup {
            let count = insights
                .operators
                .iter()
                .filter(|o| o.name == "Key Lookup" || o.name == "RID Lookup")
                .count();
            insights.warnings.push(PlanWarning::new(
                WarningCategory::KeyLookup,
                WarningSeverity::Medium,
                format!(
                    "{} lookup operator(s) fetch row data the seek index does not cover",
                    count
                ),
            ));
        }

        if insights.has_sort_warning {
            insights.warnings.push(PlanWarning::new(
                WarningCategory::SortSpill,
                WarningSeverity::High,
                format!(
                    "Sort spilled to tempdb at node(s) {}",
                    self.sort_spill_nodes.join(", ")
                ),
            ));
        }

        if insights.has_hash_spill {
            insights.warnings.push(PlanWarning::new(
                WarningCategory::HashSpill,
                WarningSeverity::High,
                format!(
                    "Hash operation spilled to tempdb at node(s) {}",
                    self.hash_spill_nodes.join(", ")
                ),
            ));
        }

        if insights.has_implicit_conversion {
            let message = if self.convert_expressions.is_empty() {
                "Implicit type conversion affects the chosen plan".to_string()
            } else {
                let mut shown = self.convert_expressions;
                shown.truncate(3);
                format!(
                    "Implicit type conversion affects the chosen plan: {}",
                    shown.join("; ")
                )
            };
            insights.warnings.push(PlanWarning::new(
                WarningCategory::ImplicitConversion,
                WarningSeverity::Medium,
                message,
            ));
        }

        if self.saw_missing_stats {
            let message = if self.no_stats_columns.is_empty() {
                "Optimizer had no statistics for one or more columns".to_string()
            } else {
                format!(
                    "Optimizer had no statistics for: {}",
                    self.no_stats_columns.join(", ")
                )
            };
            insights.warnings.push(PlanWarning::new(
                WarningCategory::MissingStatistics,
                WarningSeverity::Medium,
                message,
            ));
        }

        if self.saw_no_join_predicate {
            insights.warnings.push(PlanWarning::new(
                WarningCategory::NoJoinPredicate,
                WarningSeverity::High,
                "Join without a join predicate produces a cartesian product",
            ));
        }

        let misestimates: Vec<PlanWarning> = insights
            .operators
            .iter()
            .filter(|op| op.has_bad_estimate())
            .map(|op| {
                let actual = op.actual_rows.unwrap_or(0.0);
                PlanWarning::new(
                    WarningCategory::CardinalityMisestimate,
                    WarningSeverity::Medium,
                    format!(
                        "{} (node {}) estimated {:.0} rows but produced {:.0}",
                        op.name,
                        op.node_id.map(|n| n.to_string()).unwrap_or_else(|| "?".into()),
                        op.estimated_rows,
                        actual
                    ),
                )
            })
            .collect();
        insights.warnings.extend(misestimates);

        Ok(insights)
    }
}

fn attr_str(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == name {
            attr.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

fn attr_f64(e: &BytesStart<'_>, name: &[u8]) -> Option<f64> {
    attr_str(e, name).and_then(|v| v.parse().ok())
}

fn attr_u32(e: &BytesStart<'_>, name: &[u8]) -> Option<u32> {
    attr_str(e, name).and_then(|v| v.parse().ok())
}

fn attr_bool(e: &BytesStart<'_>, name: &[u8]) -> bool {
    attr_str(e, name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Strip the `[quoted]` form showplan uses for identifiers.
fn strip_brackets(s: &str) -> String {
    s.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}

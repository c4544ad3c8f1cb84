//! Analysis Models
//!
//! Request and outcome shapes for the advisor pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use plansage_index_gate::{IndexGateDecision, ObjectResolution};
use plansage_response_guard::ValidationResult;
use plansage_showplan::PlanInsights;

use crate::services::llm::GenerateOptions;

/// Cache key category for an analysis artifact. Finished AI analyses
/// live longer than raw collection snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisCategory {
    #[serde(rename = "ai-analysis")]
    AiAnalysis,
    #[serde(rename = "collection")]
    CollectionSnapshot,
}

impl AnalysisCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisCategory::AiAnalysis => "ai-analysis",
            AnalysisCategory::CollectionSnapshot => "collection",
        }
    }
}

impl std::fmt::Display for AnalysisCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Everything the pipeline needs for one object analysis. Collection
/// (plan capture, DMV queries) and prompt construction happen upstream;
/// this request carries their outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Analyzed object, e.g. "dbo.GetCustomerOrders"
    pub object_name: String,
    /// Exact source text being analyzed; hashed into the cache key
    pub source_sql: String,
    /// Execution plan XML captured for the object
    pub plan_xml: String,
    /// Raw existing-index/usage rows in any supported source shape
    #[serde(default)]
    pub index_usage_rows: Vec<Value>,
    /// Catalog resolution of the object
    pub resolution: ObjectResolution,
    /// Prompt text for the model call
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Provider override; falls back to the configured default
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub options: GenerateOptions,
    /// Target engine major version, when known (13 = 2016 ... 16 = 2022)
    #[serde(default)]
    pub engine_major_version: Option<u32>,
    /// Whether missing-index DMV data accompanied the collection
    #[serde(default = "default_true")]
    pub missing_index_dmv_present: bool,
    /// Whether engine metadata accompanied the collection
    #[serde(default = "default_true")]
    pub engine_metadata_present: bool,
}

/// The complete result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Correlation id for this run
    pub request_id: String,
    pub object_name: String,
    pub insights: PlanInsights,
    pub gate: IndexGateDecision,
    pub validation: ValidationResult,
    /// Sanitized model response
    pub response_text: String,
    pub quality_score: u8,
    pub from_cache: bool,
    pub cache_key: String,
}

/// The blob persisted in the analysis cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub insights: PlanInsights,
    pub gate: IndexGateDecision,
    pub validation: ValidationResult,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
}

//! Pipeline Integration Tests
//!
//! Runs the assembled advisor pipeline against a canned model client:
//! plan analysis, gate evaluation, model call, validation, and caching in
//! one pass, including the streaming variant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::tempdir;

use plansage_advisor::{
    AdvisorConfig, AdvisorPipeline, AnalysisRequest, ChunkHandler, GenerateOptions, ModelClient,
    ModelResult,
};
use plansage_analysis_cache::TieredAnalysisCache;
use plansage_index_gate::ObjectResolution;

// ============================================================================
// Canned Model Client
// ============================================================================

/// Returns a fixed response and counts invocations.
struct CannedClient {
    response: String,
    calls: AtomicUsize,
}

impl CannedClient {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for CannedClient {
    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _provider_id: &str,
        _options: &GenerateOptions,
    ) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn generate_streaming(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        provider_id: &str,
        options: &GenerateOptions,
        mut on_chunk: ChunkHandler,
    ) -> ModelResult<String> {
        let text = self
            .generate(prompt, system_prompt, provider_id, options)
            .await?;
        for chunk in text.split_inclusive(' ') {
            on_chunk(chunk);
        }
        Ok(text)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

const SEEK_PLAN: &str = r#"<ShowPlanXML xmlns="http://schemas.microsoft.com/sqlserver/2004/07/showplan">
  <BatchSequence><Batch><Statements>
    <StmtSimple StatementSubTreeCost="0.011">
      <QueryPlan>
        <RelOp NodeId="0" PhysicalOp="Clustered Index Seek" LogicalOp="Clustered Index Seek" EstimateRows="4" EstimateCPU="0.0001" EstimateIO="0.003" EstimatedTotalSubtreeCost="0.011" Parallel="0"/>
      </QueryPlan>
    </StmtSimple>
  </Statements></Batch></BatchSequence>
</ShowPlanXML>"#;

const SCAN_PLAN: &str = r#"<ShowPlanXML xmlns="http://schemas.microsoft.com/sqlserver/2004/07/showplan">
  <BatchSequence><Batch><Statements>
    <StmtSimple StatementSubTreeCost="5.4">
      <QueryPlan>
        <RelOp NodeId="0" PhysicalOp="Table Scan" LogicalOp="Table Scan" EstimateRows="80000" EstimateCPU="0.9" EstimateIO="4.5" EstimatedTotalSubtreeCost="5.4" Parallel="0">
          <TableScan Ordered="0">
            <Object Database="[Sales]" Schema="[dbo]" Table="[Orders]"/>
          </TableScan>
        </RelOp>
      </QueryPlan>
    </StmtSimple>
  </Statements></Batch></BatchSequence>
</ShowPlanXML>"#;

/// Evidence rows that satisfy every gate check.
fn full_evidence_rows() -> Vec<serde_json::Value> {
    let updated = (Utc::now() - Duration::days(2)).to_rfc3339();
    vec![json!({
        "table_name": "dbo.Orders",
        "index_name": "IX_Orders_CustomerId",
        "usage": {"user_seeks": 900, "user_scans": 14, "user_lookups": 2, "user_updates": 130},
        "usage_window": {"window_days": 21, "read_delta": 640, "write_delta": 90, "reliability": "HIGH"},
        "physical": {"fragmentation_percent": 6.5, "page_count": 3100},
        "statistics": {"rows_modified": 120, "modification_ratio": 0.01, "last_stats_update": updated}
    })]
}

fn request(object: &str, source: &str, plan: &str) -> AnalysisRequest {
    AnalysisRequest {
        object_name: object.to_string(),
        source_sql: source.to_string(),
        plan_xml: plan.to_string(),
        index_usage_rows: full_evidence_rows(),
        resolution: ObjectResolution::resolved(object),
        prompt: "Analyze this object.".to_string(),
        system_prompt: Some("You are a SQL Server performance advisor.".to_string()),
        provider_id: None,
        options: GenerateOptions::default(),
        engine_major_version: Some(15),
        missing_index_dmv_present: true,
        engine_metadata_present: true,
    }
}

fn pipeline(client: Arc<CannedClient>) -> (AdvisorPipeline, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let config = AdvisorConfig::default();
    let cache =
        Arc::new(TieredAnalysisCache::open(dir.path(), config.cache.limits()).unwrap());
    (AdvisorPipeline::new(cache, client, config), dir)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_allowed_gate_keeps_index_advice_intact() {
    let client = CannedClient::new(
        "The scan dominates the cost. Consider adding a covering index on CustomerId.",
    );
    let (pipeline, _dir) = pipeline(client.clone());

    let outcome = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SCAN_PLAN))
        .await
        .unwrap();

    assert!(outcome.gate.allowed);
    assert!(outcome.insights.has_table_scan);
    assert!(outcome.response_text.contains("covering index"));
    assert!(outcome.validation.is_valid);
    assert!(!outcome.from_cache);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_second_identical_request_skips_the_model() {
    let client = CannedClient::new("Nothing to fix. Priority: low.");
    let (pipeline, _dir) = pipeline(client.clone());

    let first = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();
    let second = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(client.calls(), 1);
    assert_eq!(second.response_text, first.response_text);
    assert_eq!(second.quality_score, first.quality_score);
    assert_ne!(second.request_id, first.request_id);
}

#[tokio::test]
async fn test_edited_source_reaches_the_model_again() {
    let client = CannedClient::new("Fine.");
    let (pipeline, _dir) = pipeline(client.clone());

    pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();
    let outcome = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1 -- edited", SEEK_PLAN))
        .await
        .unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_denied_gate_suppresses_index_advice_in_the_response() {
    let client = CannedClient::new(
        "```sql\nCREATE NONCLUSTERED INDEX IX_O ON dbo.Orders (CustomerId);\n```",
    );
    let (pipeline, _dir) = pipeline(client);

    let mut denied = request("dbo.Orders", "SELECT 1", SEEK_PLAN);
    denied.index_usage_rows = Vec::new();
    let outcome = pipeline.analyze_object(denied).await.unwrap();

    assert!(!outcome.gate.allowed);
    assert_eq!(outcome.gate.reason.as_str(), "existing_index_coverage_missing");
    assert!(!outcome.response_text.contains("CREATE NONCLUSTERED INDEX"));
    assert!(outcome
        .response_text
        .contains("[INDEX ADVICE WITHHELD: existing_index_coverage_missing]"));
    assert!(outcome
        .validation
        .issues
        .iter()
        .any(|i| i.category == "index_advice_suppressed"));
}

#[tokio::test]
async fn test_dangerous_model_output_is_masked_not_fatal() {
    let client = CannedClient::new("Quickest fix: DROP DATABASE Sales and restore from backup.");
    let (pipeline, _dir) = pipeline(client);

    let outcome = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();

    assert!(!outcome.validation.is_valid);
    assert!(!outcome.response_text.contains("DROP DATABASE Sales"));
    assert!(outcome.response_text.contains("[BLOCKED: DROP DATABASE]"));
    assert_eq!(
        outcome.validation.blocked_commands,
        vec!["DROP DATABASE Sales".to_string()]
    );
}

#[tokio::test]
async fn test_missing_collection_data_lands_as_gate_hints() {
    let client = CannedClient::new("All good.");
    let (pipeline, _dir) = pipeline(client);

    let mut sparse = request("dbo.GetOrders", "SELECT 1", SEEK_PLAN);
    sparse.missing_index_dmv_present = false;
    sparse.engine_metadata_present = false;
    let outcome = pipeline.analyze_object(sparse).await.unwrap();

    // collection gaps are hints, not verdict changes
    assert!(outcome.gate.allowed);
    let hints = &outcome.gate.missing_data_hints;
    assert!(hints.iter().any(|h| h.contains("dm_db_missing_index_details")));
    assert!(hints.iter().any(|h| h.contains("Engine version metadata")));
}

#[tokio::test]
async fn test_engine_version_flows_into_validation() {
    let client =
        CannedClient::new("```sql\nSELECT STRING_AGG(Name, ', ') FROM dbo.Tags;\n```");
    let (pipeline, _dir) = pipeline(client);

    let mut old_engine = request("dbo.GetTags", "SELECT 1", SEEK_PLAN);
    old_engine.engine_major_version = Some(13);
    let outcome = pipeline.analyze_object(old_engine).await.unwrap();

    assert!(outcome
        .validation
        .issues
        .iter()
        .any(|i| i.category == "version_compatibility" && i.message.contains("STRING_AGG")));
}

#[tokio::test]
async fn test_streaming_variant_forwards_chunks() {
    let client = CannedClient::new("Streamed verdict: healthy plan.");
    let (pipeline, _dir) = pipeline(client);

    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    let outcome = pipeline
        .analyze_object_streaming(
            request("dbo.GetOrders", "SELECT 1", SEEK_PLAN),
            Box::new(move |chunk| sink.lock().unwrap().push_str(chunk)),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), "Streamed verdict: healthy plan.");
    assert_eq!(outcome.response_text, "Streamed verdict: healthy plan.");
    assert!(!outcome.from_cache);
}

#[tokio::test]
async fn test_invalidate_object_clears_cached_analyses() {
    let client = CannedClient::new("Fine.");
    let (pipeline, _dir) = pipeline(client.clone());

    pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();
    pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 2", SEEK_PLAN))
        .await
        .unwrap();
    assert_eq!(client.calls(), 2);

    assert!(pipeline.invalidate_object("dbo.GetOrders") >= 2);

    let rerun = pipeline
        .analyze_object(request("dbo.GetOrders", "SELECT 1", SEEK_PLAN))
        .await
        .unwrap();
    assert!(!rerun.from_cache);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_request_deserializes_with_collection_defaults() {
    // callers may omit everything the collectors could not gather
    let request: AnalysisRequest = serde_json::from_value(json!({
        "object_name": "dbo.GetOrders",
        "source_sql": "SELECT 1",
        "plan_xml": "<ShowPlanXML/>",
        "resolution": {"object_name": "dbo.GetOrders", "object_resolved": true},
        "prompt": "analyze"
    }))
    .unwrap();

    assert!(request.index_usage_rows.is_empty());
    assert!(request.provider_id.is_none());
    assert!(request.engine_major_version.is_none());
    assert!(request.missing_index_dmv_present);
    assert!(request.engine_metadata_present);
}

//! Advisor Pipeline
//!
//! One analysis run: cache read, plan insights, evidence gate, model
//! call, response validation, cache write. The cache and model client
//! are injected at construction; the pipeline owns no global state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use plansage_analysis_cache::{cache_key, CacheStats, TieredAnalysisCache, CACHE_NAMESPACE};
use plansage_index_gate::{detect_sargability, evaluate, hints, normalize_rows};
use plansage_response_guard::{validate, IndexAdviceSuppression, ValidateOptions};
use plansage_showplan::analyze;

use crate::models::analysis::{AnalysisCategory, AnalysisOutcome, AnalysisRequest, CachedAnalysis};
use crate::models::settings::AdvisorConfig;
use crate::services::llm::{ChunkHandler, ModelClient};
use crate::utils::error::{AdvisorError, AdvisorResult};

pub struct AdvisorPipeline {
    cache: Arc<TieredAnalysisCache>,
    model: Arc<dyn ModelClient>,
    config: AdvisorConfig,
}

impl AdvisorPipeline {
    pub fn new(
        cache: Arc<TieredAnalysisCache>,
        model: Arc<dyn ModelClient>,
        config: AdvisorConfig,
    ) -> Self {
        Self {
            cache,
            model,
            config,
        }
    }

    /// Run one full analysis. An identical (object, source) pair hits
    /// the cache and skips the model call entirely.
    pub async fn analyze_object(&self, request: AnalysisRequest) -> AdvisorResult<AnalysisOutcome> {
        self.run(request, None).await
    }

    /// Same as [`analyze_object`](Self::analyze_object), forwarding
    /// response chunks as they stream in. The final text still passes
    /// validation before being returned or cached; callers display
    /// `response_text`, not the raw stream.
    pub async fn analyze_object_streaming(
        &self,
        request: AnalysisRequest,
        on_chunk: ChunkHandler,
    ) -> AdvisorResult<AnalysisOutcome> {
        self.run(request, Some(on_chunk)).await
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        on_chunk: Option<ChunkHandler>,
    ) -> AdvisorResult<AnalysisOutcome> {
        let request_id = Uuid::new_v4().to_string();
        let key = cache_key(
            AnalysisCategory::AiAnalysis.as_str(),
            &request.object_name,
            &request.source_sql,
        );

        if let Some(blob) = self.cache.get(&key) {
            match serde_json::from_str::<CachedAnalysis>(&blob) {
                Ok(cached) => {
                    debug!(request_id = %request_id, key = %key, "analysis served from cache");
                    return Ok(AnalysisOutcome {
                        request_id,
                        object_name: request.object_name,
                        quality_score: cached.validation.quality_score,
                        response_text: cached.response_text,
                        insights: cached.insights,
                        gate: cached.gate,
                        validation: cached.validation,
                        from_cache: true,
                        cache_key: key,
                    });
                }
                Err(err) => {
                    warn!(error = %err, key = %key, "cached analysis undecodable, re-running");
                    self.cache.invalidate(&key);
                }
            }
        }

        let insights = analyze(&request.plan_xml);

        let flags = detect_sargability(&request.source_sql, &insights);
        let rows = normalize_rows(&request.index_usage_rows);
        let mut gate = evaluate(&rows, &request.resolution, &flags, Utc::now());
        if !request.missing_index_dmv_present {
            gate.push_hint(hints::MISSING_INDEX_DMV);
        }
        if !request.engine_metadata_present {
            gate.push_hint(hints::ENGINE_METADATA);
        }

        let provider = request
            .provider_id
            .as_deref()
            .unwrap_or(&self.config.default_provider);
        let response = match on_chunk {
            Some(handler) => self
                .model
                .generate_streaming(
                    &request.prompt,
                    request.system_prompt.as_deref(),
                    provider,
                    &request.options,
                    handler,
                )
                .await,
            None => self
                .model
                .generate(
                    &request.prompt,
                    request.system_prompt.as_deref(),
                    provider,
                    &request.options,
                )
                .await,
        }
        .map_err(|err| AdvisorError::model(err.to_string()))?;

        let suppression = (!gate.allowed).then(|| IndexAdviceSuppression {
            reason: gate.reason.as_str().to_string(),
            hints: gate.missing_data_hints.clone(),
        });
        let validation = validate(
            &response,
            &ValidateOptions {
                strict: self.config.strict_validation,
                engine_major_version: request.engine_major_version,
                index_suppression: suppression,
            },
        );

        let cached = CachedAnalysis {
            insights: insights.clone(),
            gate: gate.clone(),
            validation: validation.clone(),
            response_text: validation.sanitized_response.clone(),
            created_at: Utc::now(),
        };
        match serde_json::to_string(&cached) {
            Ok(blob) => self.cache.set(
                &key,
                &blob,
                self.config.cache.ttl_for(AnalysisCategory::AiAnalysis),
            ),
            Err(err) => warn!(error = %err, "analysis outcome not cacheable"),
        }

        info!(
            request_id = %request_id,
            object = %request.object_name,
            quality = validation.quality_score,
            gate_allowed = gate.allowed,
            valid = validation.is_valid,
            "analysis complete"
        );

        Ok(AnalysisOutcome {
            request_id,
            object_name: request.object_name,
            quality_score: validation.quality_score,
            response_text: validation.sanitized_response.clone(),
            insights,
            gate,
            validation,
            from_cache: false,
            cache_key: key,
        })
    }

    /// Drop every cached analysis for one object, across categories'
    /// shared object segment. Used when the object's identity changes
    /// (rename, re-create) and the content hash alone cannot catch it.
    pub fn invalidate_object(&self, object_name: &str) -> usize {
        let prefix = format!(
            "{}:{}:{}:",
            CACHE_NAMESPACE,
            AnalysisCategory::AiAnalysis.as_str(),
            object_name
        );
        self.cache.invalidate_prefix(&prefix)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

//! Plansage
//!
//! Governance pipeline for an AI-assisted SQL Server performance
//! advisor. Execution-plan insight extraction, evidence-gated index
//! advice, and model-response validation live in the workspace crates;
//! this crate wires them into one pipeline behind a pluggable model
//! client, with JSON config and a two-tier analysis cache.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::analysis::{AnalysisCategory, AnalysisOutcome, AnalysisRequest, CachedAnalysis};
pub use models::settings::{AdvisorConfig, CacheSettings, SettingsUpdate};
pub use services::advisor::AdvisorPipeline;
pub use services::llm::{ChunkHandler, GenerateOptions, ModelClient, ModelError, ModelResult};
pub use storage::config::ConfigService;
pub use utils::error::{AdvisorError, AdvisorResult};

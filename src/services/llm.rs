//! Model Client Trait
//!
//! Defines the interface the advisor pipeline uses to call a language
//! model. Provider implementations (HTTP clients, request shaping,
//! retries) live outside this crate; the pipeline only ever sees these
//! two operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a model call can surface.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Rate limit exceeded
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },

    /// Model not found or not available
    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    /// Invalid request (bad parameters)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Provider not reachable
    #[error("Provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// Any other provider-side failure
    #[error("Model call failed: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for model calls
pub type ModelResult<T> = Result<T, ModelError>;

/// Per-call tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Model override; the provider's configured default applies otherwise
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Callback receiving response chunks as they stream in.
pub type ChunkHandler = Box<dyn FnMut(&str) + Send>;

/// The two operations the pipeline needs from a model provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a complete response for one prompt.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        provider_id: &str,
        options: &GenerateOptions,
    ) -> ModelResult<String>;

    /// Generate a response, forwarding chunks to `on_chunk` as they
    /// arrive. Returns the complete final text.
    async fn generate_streaming(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        provider_id: &str,
        options: &GenerateOptions,
        on_chunk: ChunkHandler,
    ) -> ModelResult<String>;
}

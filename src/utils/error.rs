//! Error Handling
//!
//! Unified error types for the advisor facade.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use plansage_analysis_cache::CacheError;

/// Facade-wide error type. The governance components themselves are
/// total functions; these errors come from configuration, persistence,
/// and model-call glue around them.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Model client errors
    #[error("Model error: {0}")]
    Model(String),

    /// Cache construction errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for advisor errors
pub type AdvisorResult<T> = Result<T, AdvisorError>;

impl AdvisorError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

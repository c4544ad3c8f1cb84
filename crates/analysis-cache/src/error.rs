//! Cache Error Handling

use thiserror::Error;

/// Errors surfaced by cache construction. Read and write paths are
/// best-effort and degrade to misses instead of returning these.
#[derive(Error, Debug)]
pub enum CacheError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for cache errors
pub type CacheResult<T> = Result<T, CacheError>;

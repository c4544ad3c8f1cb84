//! Cache Key Construction
//!
//! Keys embed a short hash of the analyzed source text, so any edit to the
//! source invalidates its cached analysis implicitly.

use sha2::{Digest, Sha256};

/// Fixed namespace tag leading every cache key.
pub const CACHE_NAMESPACE: &str = "plansage";

/// Hex characters of the source-content hash kept in the key.
const CONTENT_HASH_PREFIX_LEN: usize = 16;

/// Build a deterministic cache key:
/// `plansage:<category>:<object>:<first 16 hex of SHA-256(source)>`.
pub fn cache_key(category: &str, object_id: &str, source_text: &str) -> String {
    let hash = compute_sha256(source_text);
    format!(
        "{}:{}:{}:{}",
        CACHE_NAMESPACE,
        category,
        object_id,
        &hash[..CONTENT_HASH_PREFIX_LEN]
    )
}

/// Filesystem-safe blob file name for a key: the full hex SHA-256 of the
/// key itself, independent of the content hash.
pub fn blob_file_name(key: &str) -> String {
    format!("{}.json", compute_sha256(key))
}

/// Compute SHA-256 of text, returning the full hex string.
pub fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

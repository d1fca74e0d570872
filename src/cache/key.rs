//! Content-addressed cache keys.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Collapse whitespace runs and lower-case.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Pre-hash form of a key: normalized text followed by the canonical JSON
/// of the parameters. Object keys serialize in sorted order.
pub fn fingerprint(text: &str, params: Option<&Value>) -> String {
    let mut out = normalize(text);
    if let Some(params) = params {
        out.push_str(&params.to_string());
    }
    out
}

/// SHA-256 of a fingerprint as 64 lowercase hex characters.
pub fn compute_hash(fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `(hash, fingerprint)` for a request.
pub fn cache_key(text: &str, params: Option<&Value>) -> (String, String) {
    let original = fingerprint(text, params);
    (compute_hash(&original), original)
}

//! Validator helpers for stored assets
//!
//! `ETag` generation and `If-None-Match` evaluation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Strong `ETag` from content length and hash, e.g. `"1f-9a3c0d2e"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// True when the client's `If-None-Match` list names `etag` (or `*`)
///
/// Uses weak comparison, so `W/"x"` matches `"x"`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == etag.trim_start_matches("W/")
        })
    })
}

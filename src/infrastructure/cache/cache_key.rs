//! Cache key derivation
//!
//! Keys are versioned fingerprints: `v<version>:<sha256(normalized path
//! + "|" + options digest)>`. Normalization strips cache-busting query
//! parameters and lowercases the path so equivalent requests converge on
//! one entry. Chunk sub-keys and version counter keys derive from the
//! same fingerprints.

use sha2::{Digest, Sha256};

use crate::domain::value_objects::TransformOptions;

/// Query parameters that never participate in the fingerprint
pub const CACHE_BUSTING_PARAMS: &[&str] = &["nocache", "bypass", "debug"];

/// Lowercases the path and drops cache-busting query parameters
pub fn normalize_path(path: &str) -> String {
    let (path_part, query_part) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    let mut normalized = path_part.to_lowercase();

    if let Some(query) = query_part {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or(pair);
                !CACHE_BUSTING_PARAMS.contains(&key)
            })
            .collect();
        if !kept.is_empty() {
            normalized.push('?');
            normalized.push_str(&kept.join("&"));
        }
    }

    normalized
}

/// Stable digest over the canonical (alphabetical) options encoding
pub fn options_digest(options: &TransformOptions) -> String {
    let encoded: Vec<String> = options
        .canonical_params()
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    sha256_hex(encoded.join(",").as_bytes())
}

/// Version-independent fingerprint of (path, options)
pub fn logical_key(path: &str, options: &TransformOptions) -> String {
    let input = format!("{}|{}", normalize_path(path), options_digest(options));
    sha256_hex(input.as_bytes())
}

/// The addressable cache key for a specific version
pub fn versioned_key(logical_key: &str, version: u64) -> String {
    format!("v{}:{}", version, logical_key)
}

/// Sub-key for chunk `index` of a chunked entry
pub fn chunk_key(key: &str, index: usize) -> String {
    format!("chunk:{}:{}", key, index)
}

/// Prefix covering every chunk of an entry
pub fn chunk_prefix(key: &str) -> String {
    format!("chunk:{}:", key)
}

/// Key of the monotonic version counter for a logical key
pub fn version_counter_key(logical_key: &str) -> String {
    format!("v:{}", logical_key)
}

fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

//! Cache key validation, glob patterns, and deterministic key derivation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

/// Longest key any tier is asked to store.
pub const MAX_KEY_LEN: usize = 512;

// No whitespace and no control characters anywhere in the key.
static KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("Invalid key regex"));

/// Reject malformed keys before any tier I/O is attempted.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(invalid(key, "key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(
            key,
            &format!("key longer than {} bytes", MAX_KEY_LEN),
        ));
    }
    if !KEY_CHARS.is_match(key) {
        return Err(invalid(key, "key contains whitespace or control characters"));
    }
    Ok(())
}

fn invalid(key: &str, reason: &str) -> CacheError {
    CacheError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// A glob pattern over cache keys, e.g. `supplier:*` or `report:202?-*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
    pattern: glob::Pattern,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> CacheResult<Self> {
        if pattern.is_empty() {
            return Err(invalid(pattern, "pattern must not be empty"));
        }
        let compiled = glob::Pattern::new(pattern).map_err(|e| CacheError::InvalidKey {
            key: pattern.to_string(),
            reason: format!("invalid glob pattern: {}", e.msg),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            pattern: compiled,
        })
    }

    /// Pattern matching every key.
    pub fn all() -> Self {
        Self {
            raw: "*".to_string(),
            pattern: glob::Pattern::new("*").expect("Invalid wildcard pattern"),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.pattern.matches(key)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Literal prefix before the first wildcard, usable for range scans.
    pub fn literal_prefix(&self) -> &str {
        let end = self
            .raw
            .find(['*', '?', '['])
            .unwrap_or(self.raw.len());
        &self.raw[..end]
    }
}

/// Derive a deterministic key segment from a method name and its arguments.
///
/// The arguments are JSON-encoded and hashed together with the method name,
/// so equal calls always map to the same key regardless of argument size.
pub fn args_digest<A: Serialize + ?Sized>(method: &str, args: &A) -> CacheResult<String> {
    let encoded = serde_json::to_vec(args).map_err(|e| CacheError::Serialization {
        key: method.to_string(),
        reason: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update([0u8]);
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}

//! Error types for layercache operations

use thiserror::Error;

/// Errors raised by a single cache tier.
///
/// The manager never surfaces these directly to callers: read-path failures
/// degrade to the next tier, write-path failures are reported as warnings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("Tier {tier} unavailable: {reason}")]
    Unavailable { tier: String, reason: String },

    #[error("Tier {tier} could not decode entry for {key}: {reason}")]
    Codec {
        tier: String,
        key: String,
        reason: String,
    },
}

impl TierError {
    /// Shorthand for an unavailable-tier error.
    pub fn unavailable(tier: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            tier: tier.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the tier that produced this error.
    pub fn tier(&self) -> &str {
        match self {
            Self::Unavailable { tier, .. } | Self::Codec { tier, .. } => tier,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Tier error: {0}")]
    TierUnavailable(#[from] TierError),

    #[error("Fetch failed for {key}: {reason}")]
    FetchFailed { key: String, reason: String },

    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Policy misconfigured: {reason}")]
    PolicyMisconfigured { reason: String },

    #[error("Serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalidation index lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    /// Returns true if this error came from the caller-supplied fetch.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for tier operations.
pub type TierResult<T> = Result<T, TierError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_error_display_unavailable() {
        let err = TierError::unavailable("redis", "connection refused");
        let msg = format!("{}", err);
        assert!(msg.contains("redis"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.tier(), "redis");
    }

    #[test]
    fn test_fetch_failed_display() {
        let err = CacheError::FetchFailed {
            key: "supplier:42".to_string(),
            reason: "upstream timeout".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("supplier:42"));
        assert!(msg.contains("upstream timeout"));
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "tiers[0].capacity".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("tiers[0].capacity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_cache_error_from_variants() {
        let tier = CacheError::from(TierError::unavailable("memory", "poisoned"));
        assert!(matches!(tier, CacheError::TierUnavailable(_)));

        let config = CacheError::from(ConfigError::MissingRequired {
            field: "tiers".to_string(),
        });
        assert!(matches!(config, CacheError::Config(_)));
        assert!(!config.is_fetch_failure());
    }
}

//! Configuration types
//!
//! [`CacheSettings`] is the top-level document, normally loaded from TOML:
//!
//! ```toml
//! [manager]
//! stale_retention_ms = 3600000
//! single_flight = true
//!
//! [[tiers]]
//! backend = "memory"
//! name = "local"
//! capacity = 10000
//!
//! [[tiers]]
//! backend = "shared"
//! name = "shared"
//! endpoint = "kv.internal:6379"
//! key_prefix = "app:"
//!
//! [[tiers]]
//! backend = "lmdb"
//! name = "persistent"
//! path = "/var/cache/app"
//! collection = "entries"
//! max_size_mb = 256
//!
//! [policies.DYNAMIC]
//! ttl_seconds = 30
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheResult, ConfigError};
use crate::policy::{PolicyCatalog, PolicyOverride};

/// Runtime behaviour of the cache manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long past their TTL entries of stale-tolerant policies are kept.
    #[serde(rename = "stale_retention_ms", with = "millis")]
    pub stale_retention: Duration,
    /// Fraction of the TTL below which a fresh hit triggers a refresh-ahead
    /// for policies with background refresh.
    pub refresh_ahead_ratio: f64,
    /// Upper bound on a single fetch call.
    #[serde(rename = "fetch_timeout_ms", with = "millis")]
    pub fetch_timeout: Duration,
    /// Tick of the hard-expiry worker.
    #[serde(rename = "expiry_tick_ms", with = "millis")]
    pub expiry_tick: Duration,
    /// Coalesce concurrent cold misses on the same key into one fetch.
    pub single_flight: bool,
    /// Buffered events per subscriber before slow consumers lag.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_retention: Duration::from_secs(3600),
            refresh_ahead_ratio: 0.2,
            fetch_timeout: Duration::from_secs(30),
            expiry_tick: Duration::from_millis(250),
            single_flight: false,
            event_capacity: 1024,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_retention(mut self, duration: Duration) -> Self {
        self.stale_retention = duration;
        self
    }

    pub fn with_refresh_ahead_ratio(mut self, ratio: f64) -> Self {
        self.refresh_ahead_ratio = ratio;
        self
    }

    pub fn with_fetch_timeout(mut self, duration: Duration) -> Self {
        self.fetch_timeout = duration;
        self
    }

    pub fn with_expiry_tick(mut self, duration: Duration) -> Self {
        self.expiry_tick = duration;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LAYERCACHE_STALE_RETENTION_MS`
    /// - `LAYERCACHE_REFRESH_AHEAD_RATIO`
    /// - `LAYERCACHE_FETCH_TIMEOUT_MS`
    /// - `LAYERCACHE_EXPIRY_TICK_MS`
    /// - `LAYERCACHE_SINGLE_FLIGHT` (`true`/`false`)
    /// - `LAYERCACHE_EVENT_CAPACITY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ms = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            stale_retention: ms("LAYERCACHE_STALE_RETENTION_MS", defaults.stale_retention),
            refresh_ahead_ratio: std::env::var("LAYERCACHE_REFRESH_AHEAD_RATIO")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.refresh_ahead_ratio),
            fetch_timeout: ms("LAYERCACHE_FETCH_TIMEOUT_MS", defaults.fetch_timeout),
            expiry_tick: ms("LAYERCACHE_EXPIRY_TICK_MS", defaults.expiry_tick),
            single_flight: std::env::var("LAYERCACHE_SINGLE_FLIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.single_flight),
            event_capacity: std::env::var("LAYERCACHE_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_capacity),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.refresh_ahead_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "manager.refresh_ahead_ratio".to_string(),
                value: self.refresh_ahead_ratio.to_string(),
                reason: "refresh_ahead_ratio must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "manager.fetch_timeout_ms".to_string(),
                value: format!("{:?}", self.fetch_timeout),
                reason: "fetch_timeout must be positive".to_string(),
            });
        }

        if self.expiry_tick.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "manager.expiry_tick_ms".to_string(),
                value: format!("{:?}", self.expiry_tick),
                reason: "expiry_tick must be positive".to_string(),
            });
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "manager.event_capacity".to_string(),
                value: "0".to_string(),
                reason: "event_capacity must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Which concrete store backs a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum TierConfig {
    /// Process-local, size-bounded LRU.
    Memory { name: String, capacity: usize },
    /// Distributed shared store addressed by endpoint, namespaced by prefix.
    Shared {
        name: String,
        endpoint: String,
        key_prefix: String,
    },
    /// Persistent LMDB store.
    Lmdb {
        name: String,
        path: PathBuf,
        collection: String,
        max_size_mb: usize,
    },
}

impl TierConfig {
    pub fn name(&self) -> &str {
        match self {
            TierConfig::Memory { name, .. }
            | TierConfig::Shared { name, .. }
            | TierConfig::Lmdb { name, .. } => name,
        }
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let field = |suffix: &str| format!("tiers[{}].{}", index, suffix);

        if self.name().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: field("name"),
            });
        }

        match self {
            TierConfig::Memory { capacity, .. } if *capacity == 0 => {
                Err(ConfigError::InvalidValue {
                    field: field("capacity"),
                    value: "0".to_string(),
                    reason: "capacity must be positive".to_string(),
                })
            }
            TierConfig::Shared { endpoint, .. } if endpoint.is_empty() => {
                Err(ConfigError::MissingRequired {
                    field: field("endpoint"),
                })
            }
            TierConfig::Lmdb { collection, .. } if collection.is_empty() => {
                Err(ConfigError::MissingRequired {
                    field: field("collection"),
                })
            }
            TierConfig::Lmdb { max_size_mb, .. } if *max_size_mb == 0 => {
                Err(ConfigError::InvalidValue {
                    field: field("max_size_mb"),
                    value: "0".to_string(),
                    reason: "max_size_mb must be positive".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Top-level cache configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub manager: CacheConfig,
    /// Tiers ordered fastest first; the last one is authoritative.
    pub tiers: Vec<TierConfig>,
    /// Per-class policy overrides keyed by policy name.
    pub policies: HashMap<String, PolicyOverride>,
}

impl CacheSettings {
    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(source: &str) -> CacheResult<Self> {
        let settings: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse, and validate a TOML settings file.
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate tiers, manager settings, and policy overrides.
    pub fn validate(&self) -> CacheResult<()> {
        self.manager.validate()?;

        if self.tiers.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "tiers".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for (index, tier) in self.tiers.iter().enumerate() {
            tier.validate(index)?;
            if !seen.insert(tier.name()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("tiers[{}].name", index),
                    value: tier.name().to_string(),
                    reason: "tier names must be unique".to_string(),
                }
                .into());
            }
        }

        self.policy_catalog().map(|_| ())
    }

    /// Build the policy catalog with configured overrides applied.
    pub fn policy_catalog(&self) -> CacheResult<PolicyCatalog> {
        PolicyCatalog::with_overrides(&self.policies)
    }
}

/// Durations stored as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::policy::PolicyName;

    const FULL: &str = r#"
        [manager]
        stale_retention_ms = 60000
        fetch_timeout_ms = 500
        single_flight = true

        [[tiers]]
        backend = "memory"
        name = "local"
        capacity = 100

        [[tiers]]
        backend = "shared"
        name = "shared"
        endpoint = "kv.internal:6379"
        key_prefix = "app:"

        [[tiers]]
        backend = "lmdb"
        name = "persistent"
        path = "/tmp/layercache"
        collection = "entries"
        max_size_mb = 16

        [policies.dynamic]
        ttl_seconds = 30
    "#;

    #[test]
    fn test_parse_full_settings() {
        let settings = CacheSettings::from_toml_str(FULL).unwrap();
        assert_eq!(settings.tiers.len(), 3);
        assert_eq!(settings.tiers[0].name(), "local");
        assert!(matches!(
            settings.tiers[2],
            TierConfig::Lmdb { max_size_mb: 16, .. }
        ));
        assert_eq!(settings.manager.stale_retention, Duration::from_secs(60));
        assert_eq!(settings.manager.fetch_timeout, Duration::from_millis(500));
        assert!(settings.manager.single_flight);
        // Unspecified manager fields fall back to defaults.
        assert_eq!(settings.manager.event_capacity, 1024);

        let catalog = settings.policy_catalog().unwrap();
        assert_eq!(
            catalog.get(PolicyName::Dynamic).ttl(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_missing_tiers_rejected() {
        let err = CacheSettings::from_toml_str("[manager]\nsingle_flight = true\n").unwrap_err();
        assert!(err.to_string().contains("tiers"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let source = r#"
            [[tiers]]
            backend = "memory"
            name = "local"
            capacity = 0
        "#;
        let err = CacheSettings::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("tiers[0].capacity"));
    }

    #[test]
    fn test_duplicate_tier_names_rejected() {
        let source = r#"
            [[tiers]]
            backend = "memory"
            name = "local"
            capacity = 10

            [[tiers]]
            backend = "memory"
            name = "local"
            capacity = 20
        "#;
        let err = CacheSettings::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[test]
    fn test_unknown_policy_override_rejected() {
        let source = r#"
            [[tiers]]
            backend = "memory"
            name = "local"
            capacity = 10

            [policies.hourly]
            ttl_seconds = 3600
        "#;
        let err = CacheSettings::from_toml_str(source).unwrap_err();
        assert!(matches!(err, CacheError::PolicyMisconfigured { .. }));
    }

    #[test]
    fn test_unparseable_toml() {
        let err = CacheSettings::from_toml_str("tiers = 5").unwrap_err();
        assert!(matches!(err, CacheError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_stale_retention(Duration::from_secs(120))
            .with_refresh_ahead_ratio(0.5)
            .with_fetch_timeout(Duration::from_millis(50))
            .with_expiry_tick(Duration::from_millis(10))
            .with_single_flight(true)
            .with_event_capacity(16);

        assert_eq!(config.stale_retention, Duration::from_secs(120));
        assert_eq!(config.refresh_ahead_ratio, 0.5);
        assert_eq!(config.fetch_timeout, Duration::from_millis(50));
        assert_eq!(config.expiry_tick, Duration::from_millis(10));
        assert!(config.single_flight);
        assert_eq!(config.event_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_validation() {
        let bad_ratio = CacheConfig::new().with_refresh_ahead_ratio(1.5);
        assert!(bad_ratio.validate().is_err());

        let zero_timeout = CacheConfig::new().with_fetch_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());
    }
}

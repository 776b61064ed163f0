//! Cache policies and the named policy catalog.
//!
//! A [`CachePolicy`] describes how long data stays fresh and what the
//! manager may do once it is not. Policies are immutable once built and are
//! shared as `Arc<CachePolicy>` between every caller of the same class.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// TTL and freshness behaviour for a class of cached data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    ttl: Duration,
    stale_while_revalidate: bool,
    stale_if_error: bool,
    background_refresh: bool,
    hard_ttl: bool,
}

impl CachePolicy {
    /// Create a custom policy with the given TTL and all flags off.
    ///
    /// A zero TTL is rejected: such an entry would be stale on arrival.
    pub fn custom(ttl: Duration) -> CacheResult<Self> {
        if ttl.is_zero() {
            return Err(CacheError::PolicyMisconfigured {
                reason: "ttl must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            ttl,
            stale_while_revalidate: false,
            stale_if_error: false,
            background_refresh: false,
            hard_ttl: false,
        })
    }

    /// Create a custom policy from a signed number of seconds, as found in
    /// configuration files.
    pub fn from_seconds(ttl_seconds: i64) -> CacheResult<Self> {
        if ttl_seconds < 0 {
            return Err(CacheError::PolicyMisconfigured {
                reason: format!("ttl must not be negative, got {}s", ttl_seconds),
            });
        }
        Self::custom(Duration::from_secs(ttl_seconds as u64))
    }

    /// Serve expired values immediately and refresh them in the background.
    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    /// Serve expired values when the refresh fetch fails.
    pub fn with_stale_if_error(mut self, enabled: bool) -> Self {
        self.stale_if_error = enabled;
        self
    }

    /// Refresh entries ahead of expiry while they are still being read.
    pub fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.background_refresh = enabled;
        self
    }

    /// Force proactive, scheduled expiry at the TTL.
    pub fn with_hard_ttl(mut self, enabled: bool) -> Self {
        self.hard_ttl = enabled;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stale_while_revalidate(&self) -> bool {
        self.stale_while_revalidate
    }

    pub fn stale_if_error(&self) -> bool {
        self.stale_if_error
    }

    pub fn background_refresh(&self) -> bool {
        self.background_refresh
    }

    pub fn hard_ttl(&self) -> bool {
        self.hard_ttl
    }

    /// Returns true if the policy ever allows serving an expired value.
    pub fn allows_stale(&self) -> bool {
        !self.hard_ttl && (self.stale_while_revalidate || self.stale_if_error)
    }

    /// How long tiers should physically keep an entry written under this
    /// policy.
    ///
    /// Policies that may serve stale data keep entries for an extra
    /// `stale_retention` past the TTL; everything else is dropped at the TTL.
    pub fn retention(&self, stale_retention: Duration) -> Duration {
        if self.allows_stale() {
            self.ttl.saturating_add(stale_retention)
        } else {
            self.ttl
        }
    }

    /// Re-validate a policy that did not come through [`CachePolicy::custom`],
    /// e.g. one deserialized from a config file.
    pub fn validate(&self) -> CacheResult<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::PolicyMisconfigured {
                reason: "ttl must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Names of the built-in policy classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyName {
    Default,
    Static,
    Dynamic,
    User,
    Api,
    Micro,
    Report,
}

impl PolicyName {
    pub const ALL: [PolicyName; 7] = [
        PolicyName::Default,
        PolicyName::Static,
        PolicyName::Dynamic,
        PolicyName::User,
        PolicyName::Api,
        PolicyName::Micro,
        PolicyName::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Default => "DEFAULT",
            PolicyName::Static => "STATIC",
            PolicyName::Dynamic => "DYNAMIC",
            PolicyName::User => "USER",
            PolicyName::Api => "API",
            PolicyName::Micro => "MICRO",
            PolicyName::Report => "REPORT",
        }
    }

    /// The built-in policy for this class.
    pub fn builtin(&self) -> CachePolicy {
        let base = |secs: u64| CachePolicy {
            ttl: Duration::from_secs(secs),
            stale_while_revalidate: false,
            stale_if_error: false,
            background_refresh: false,
            hard_ttl: false,
        };
        match self {
            PolicyName::Default => base(300).with_stale_if_error(true),
            PolicyName::Static => base(86_400)
                .with_stale_while_revalidate(true)
                .with_stale_if_error(true),
            PolicyName::Dynamic => base(60).with_stale_if_error(true),
            PolicyName::User => base(900).with_hard_ttl(true),
            PolicyName::Api => base(300)
                .with_stale_while_revalidate(true)
                .with_stale_if_error(true)
                .with_background_refresh(true),
            // Guards against request storms; too short to be worth revalidating.
            PolicyName::Micro => base(5),
            PolicyName::Report => base(3_600)
                .with_stale_while_revalidate(true)
                .with_stale_if_error(true)
                .with_background_refresh(true),
        }
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CacheError::PolicyMisconfigured {
                reason: format!("unknown policy name: {}", s),
            })
    }
}

/// Optional per-class overrides read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub ttl_seconds: Option<i64>,
    pub stale_while_revalidate: Option<bool>,
    pub stale_if_error: Option<bool>,
    pub background_refresh: Option<bool>,
    pub hard_ttl: Option<bool>,
}

impl PolicyOverride {
    fn apply(&self, mut policy: CachePolicy) -> CacheResult<CachePolicy> {
        if let Some(secs) = self.ttl_seconds {
            policy.ttl = CachePolicy::from_seconds(secs)?.ttl;
        }
        if let Some(v) = self.stale_while_revalidate {
            policy.stale_while_revalidate = v;
        }
        if let Some(v) = self.stale_if_error {
            policy.stale_if_error = v;
        }
        if let Some(v) = self.background_refresh {
            policy.background_refresh = v;
        }
        if let Some(v) = self.hard_ttl {
            policy.hard_ttl = v;
        }
        Ok(policy)
    }
}

/// The fixed set of named policies callers reference by name.
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    policies: HashMap<PolicyName, Arc<CachePolicy>>,
}

impl PolicyCatalog {
    /// Catalog with the built-in TTLs.
    pub fn standard() -> Self {
        let policies = PolicyName::ALL
            .iter()
            .map(|name| (*name, Arc::new(name.builtin())))
            .collect();
        Self { policies }
    }

    /// Catalog with configured overrides applied on top of the built-ins.
    ///
    /// Override keys are policy names, matched case-insensitively.
    pub fn with_overrides(overrides: &HashMap<String, PolicyOverride>) -> CacheResult<Self> {
        let mut catalog = Self::standard();
        for (raw_name, over) in overrides {
            let name: PolicyName = raw_name.parse()?;
            let policy = over.apply(name.builtin())?;
            catalog.policies.insert(name, Arc::new(policy));
        }
        Ok(catalog)
    }

    /// Shared handle to the named policy.
    pub fn get(&self, name: PolicyName) -> Arc<CachePolicy> {
        match self.policies.get(&name) {
            Some(policy) => Arc::clone(policy),
            None => Arc::new(name.builtin()),
        }
    }

    /// Resolve a policy by its string name.
    pub fn resolve(&self, name: &str) -> CacheResult<Arc<CachePolicy>> {
        Ok(self.get(name.parse()?))
    }
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

//! Cache tier trait and tier statistics.
//!
//! This module defines the narrow contract every backing store implements.
//! The manager treats tiers as opaque beyond this trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_core::{CacheEntry, KeyPattern, TierResult};

/// One backing store in the cache hierarchy.
///
/// Implementations must be safe for concurrent use without caller-side
/// locking and are responsible for their own capacity and eviction policy.
///
/// # Contract
///
/// - `get` returns `Ok(None)` when the key is absent or past its retention
///   deadline. It never reports a missing key as an error.
/// - `delete` is idempotent and returns whether an entry was removed.
/// - Each tier keeps its own copy of an entry; nothing is shared by
///   reference between tiers.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Stable name used in events, logs, and statistics.
    fn name(&self) -> &str;

    /// Look up an entry.
    async fn get(&self, key: &str) -> TierResult<Option<CacheEntry>>;

    /// Store an entry, keeping it physically for `retention`.
    ///
    /// `retention` may exceed the entry's logical TTL so that stale values
    /// remain available for stale-while-revalidate and stale-if-error.
    async fn set(&self, entry: CacheEntry, retention: Duration) -> TierResult<()>;

    /// Remove an entry.
    async fn delete(&self, key: &str) -> TierResult<bool>;

    /// Remove every entry whose key matches the glob pattern.
    async fn clear_by_pattern(&self, pattern: &KeyPattern) -> TierResult<u64>;

    /// Check for a live entry without counting a hit or miss.
    async fn contains(&self, key: &str) -> TierResult<bool>;

    /// Current tier statistics.
    async fn stats(&self) -> TierResult<TierStats>;
}

/// Shared handle to a tier.
pub type TierRef = Arc<dyn CacheTier>;

/// Statistics about tier usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    /// Number of live entries.
    pub item_count: u64,
    /// Number of lookups that returned an entry.
    pub hit_count: u64,
    /// Number of lookups that found nothing.
    pub miss_count: u64,
    /// Number of entries dropped due to capacity.
    pub evictions: u64,
}

impl TierStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_stats_hit_rate() {
        let stats = TierStats {
            hit_count: 80,
            miss_count: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = TierStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}

//! Manager counters and statistics snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::tier::TierStats;

/// Counters for manager activity since startup.
#[derive(Debug, Default)]
pub struct ManagerMetrics {
    /// Fetch function invocations, refreshes included
    pub fetches: AtomicU64,
    /// Fetches that failed or timed out
    pub fetch_failures: AtomicU64,
    /// Reads answered with a value past its TTL
    pub stale_served: AtomicU64,
    /// Background refreshes that rewrote an entry
    pub refreshes: AtomicU64,
    /// Keys removed by hard expiry
    pub hard_expirations: AtomicU64,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            hard_expirations: self.hard_expirations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ManagerMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerSnapshot {
    pub fetches: u64,
    pub fetch_failures: u64,
    pub stale_served: u64,
    pub refreshes: u64,
    pub hard_expirations: u64,
}

/// Statistics for the whole cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Per-tier statistics, fastest first. Unavailable tiers are omitted.
    pub tiers: Vec<(String, TierStats)>,
    pub manager: ManagerSnapshot,
    /// Keys known to the invalidation index.
    pub indexed_keys: usize,
    /// Pending hard-expiry timers.
    pub scheduled_expiries: usize,
}

impl CacheStats {
    pub fn tier(&self, name: &str) -> Option<&TierStats> {
        self.tiers
            .iter()
            .find(|(tier, _)| tier == name)
            .map(|(_, stats)| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = ManagerMetrics::new();
        ManagerMetrics::incr(&metrics.fetches);
        ManagerMetrics::incr(&metrics.fetches);
        ManagerMetrics::incr(&metrics.stale_served);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fetches, 2);
        assert_eq!(snapshot.stale_served, 1);
        assert_eq!(snapshot.refreshes, 0);
    }

    #[test]
    fn test_tier_lookup() {
        let stats = CacheStats {
            tiers: vec![(
                "memory".to_string(),
                TierStats {
                    item_count: 3,
                    ..Default::default()
                },
            )],
            ..Default::default()
        };
        assert_eq!(stats.tier("memory").map(|s| s.item_count), Some(3));
        assert!(stats.tier("shared").is_none());
    }
}

//! Process-local tier: a size-bounded LRU.
//!
//! The fastest tier. Entries are cloned in and out so no caller ever holds a
//! reference into the map. A single mutex guards the LRU since every access,
//! reads included, updates recency.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use layercache_core::{add_duration, CacheEntry, KeyPattern, TierError, TierResult};
use lru::LruCache;

use super::traits::{CacheTier, TierStats};

struct Slot {
    entry: CacheEntry,
    retain_until: DateTime<Utc>,
}

/// In-memory LRU tier.
pub struct MemoryTier {
    name: String,
    entries: Mutex<LruCache<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryTier {
    /// Create a memory tier holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.lock().map(|lru| lru.cap().get()).unwrap_or(0)
    }

    fn lock(&self) -> TierResult<MutexGuard<'_, LruCache<String, Slot>>> {
        self.entries
            .lock()
            .map_err(|_| TierError::unavailable(&self.name, "memory tier lock poisoned"))
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> TierResult<Option<CacheEntry>> {
        let mut lru = self.lock()?;
        let now = Utc::now();

        let found = lru
            .get(key)
            .map(|slot| (slot.retain_until > now).then(|| slot.entry.clone()));
        let live = match found {
            Some(Some(entry)) => Some(entry),
            Some(None) => {
                lru.pop(key);
                None
            }
            None => None,
        };

        match live {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, entry: CacheEntry, retention: Duration) -> TierResult<()> {
        let retain_until = add_duration(Utc::now(), retention);
        let key = entry.key.clone();
        let mut lru = self.lock()?;

        if let Some((evicted, _)) = lru.push(
            key.clone(),
            Slot {
                entry,
                retain_until,
            },
        ) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> TierResult<bool> {
        Ok(self.lock()?.pop(key).is_some())
    }

    async fn clear_by_pattern(&self, pattern: &KeyPattern) -> TierResult<u64> {
        let mut lru = self.lock()?;
        let matching: Vec<String> = lru
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matching {
            lru.pop(key);
        }
        Ok(matching.len() as u64)
    }

    async fn contains(&self, key: &str) -> TierResult<bool> {
        let lru = self.lock()?;
        Ok(lru
            .peek(key)
            .is_some_and(|slot| slot.retain_until > Utc::now()))
    }

    async fn stats(&self) -> TierResult<TierStats> {
        let lru = self.lock()?;
        let now = Utc::now();
        let live = lru.iter().filter(|(_, slot)| slot.retain_until > now).count();
        Ok(TierStats {
            item_count: live as u64,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> CacheEntry {
        CacheEntry::new(key, value.as_bytes().to_vec(), Some(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let tier = MemoryTier::new("memory", 10);
        tier.set(entry("a", "1"), Duration::from_secs(60))
            .await
            .unwrap();

        let cached = tier.get("a").await.unwrap().expect("entry should be cached");
        assert_eq!(cached.value, b"1");
        assert!(tier.get("b").await.unwrap().is_none());

        let stats = tier.stats().await.unwrap();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.item_count, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let tier = MemoryTier::new("memory", 2);
        let retention = Duration::from_secs(60);
        tier.set(entry("a", "1"), retention).await.unwrap();
        tier.set(entry("b", "2"), retention).await.unwrap();

        // Touch "a" so that "b" becomes least recently used.
        assert!(tier.get("a").await.unwrap().is_some());
        tier.set(entry("c", "3"), retention).await.unwrap();

        assert!(tier.get("b").await.unwrap().is_none());
        assert!(tier.get("a").await.unwrap().is_some());
        assert!(tier.get("c").await.unwrap().is_some());
        assert_eq!(tier.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_overwrite_is_not_an_eviction() {
        let tier = MemoryTier::new("memory", 2);
        let retention = Duration::from_secs(60);
        tier.set(entry("a", "1"), retention).await.unwrap();
        tier.set(entry("a", "2"), retention).await.unwrap();

        assert_eq!(tier.get("a").await.unwrap().unwrap().value, b"2");
        assert_eq!(tier.stats().await.unwrap().evictions, 0);
    }

    #[tokio::test]
    async fn test_expired_retention_is_a_miss() {
        let tier = MemoryTier::new("memory", 10);
        tier.set(entry("a", "1"), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!tier.contains("a").await.unwrap());
        assert!(tier.get("a").await.unwrap().is_none());
        assert_eq!(tier.stats().await.unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tier = MemoryTier::new("memory", 10);
        tier.set(entry("a", "1"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(tier.delete("a").await.unwrap());
        assert!(!tier.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_by_pattern() {
        let tier = MemoryTier::new("memory", 10);
        let retention = Duration::from_secs(60);
        for key in ["supplier:1", "supplier:2", "customer:1"] {
            tier.set(entry(key, "x"), retention).await.unwrap();
        }

        let pattern = KeyPattern::new("supplier:*").unwrap();
        assert_eq!(tier.clear_by_pattern(&pattern).await.unwrap(), 2);
        assert!(tier.contains("customer:1").await.unwrap());
        assert!(!tier.contains("supplier:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one_entry() {
        let tier = MemoryTier::new("memory", 0);
        assert_eq!(tier.capacity(), 1);
    }
}

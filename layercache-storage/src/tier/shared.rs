//! Shared tier: a key-prefixed view over a store shared between managers.
//!
//! [`SharedStore`] plays the role of the distributed key-value service. It
//! holds entries only in their encoded form, exactly as a remote store would,
//! and several [`SharedTier`]s (one per manager) can point at the same store
//! with different key prefixes. The store can be taken offline to model an
//! unreachable endpoint.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use layercache_core::{add_duration, CacheEntry, KeyPattern, TierError, TierResult};
use tracing::{debug, warn};

use super::traits::{CacheTier, TierStats};

/// Concurrent byte store standing in for a networked KV service.
#[derive(Debug)]
pub struct SharedStore {
    endpoint: String,
    entries: DashMap<String, Vec<u8>>,
    online: AtomicBool,
}

impl SharedStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            entries: DashMap::new(),
            online: AtomicBool::new(true),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Take the store on- or offline. While offline every operation fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of raw entries across all prefixes, expired ones included.
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }
}

/// Tier backed by a [`SharedStore`].
pub struct SharedTier {
    name: String,
    key_prefix: String,
    store: Arc<SharedStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SharedTier {
    pub fn new(name: impl Into<String>, key_prefix: impl Into<String>, store: Arc<SharedStore>) -> Self {
        Self {
            name: name.into(),
            key_prefix: key_prefix.into(),
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn ensure_online(&self) -> TierResult<()> {
        if self.store.is_online() {
            Ok(())
        } else {
            Err(TierError::unavailable(
                &self.name,
                format!("endpoint {} unreachable", self.store.endpoint()),
            ))
        }
    }

    /// Decode a stored value, returning `None` for expired or corrupt data.
    fn decode_live(&self, key: &str, bytes: &[u8]) -> Option<CacheEntry> {
        match CacheEntry::decode(key, bytes) {
            Ok((entry, retain_until)) if retain_until > Utc::now() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!(tier = %self.name, key = %key, error = %e, "Dropping undecodable shared entry");
                None
            }
        }
    }

    /// Drop every entry under this prefix that is past retention or corrupt.
    fn sweep_expired(&self) -> u64 {
        let mut swept = 0u64;
        self.store.entries.retain(|storage_key, bytes| {
            let live = match storage_key.strip_prefix(self.key_prefix.as_str()) {
                Some(key) => self.decode_live(key, bytes).is_some(),
                None => true,
            };
            if !live {
                swept += 1;
            }
            live
        });
        if swept > 0 {
            debug!(tier = %self.name, swept = swept, "Swept expired shared entries");
        }
        swept
    }
}

#[async_trait]
impl CacheTier for SharedTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> TierResult<Option<CacheEntry>> {
        self.ensure_online()?;
        let storage_key = self.storage_key(key);

        let found = self
            .store
            .entries
            .get(&storage_key)
            .map(|bytes| self.decode_live(key, bytes.value()));

        match found {
            Some(Some(entry)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry))
            }
            Some(None) => {
                self.store.entries.remove(&storage_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, entry: CacheEntry, retention: Duration) -> TierResult<()> {
        self.ensure_online()?;
        let retain_until = add_duration(Utc::now(), retention);
        self.store
            .entries
            .insert(self.storage_key(&entry.key), entry.encode(retain_until));
        Ok(())
    }

    async fn delete(&self, key: &str) -> TierResult<bool> {
        self.ensure_online()?;
        Ok(self.store.entries.remove(&self.storage_key(key)).is_some())
    }

    async fn clear_by_pattern(&self, pattern: &KeyPattern) -> TierResult<u64> {
        self.ensure_online()?;
        self.sweep_expired();
        let mut removed = 0u64;
        self.store.entries.retain(|storage_key, _| {
            let matched = storage_key
                .strip_prefix(self.key_prefix.as_str())
                .is_some_and(|key| pattern.matches(key));
            if matched {
                removed += 1;
            }
            !matched
        });
        Ok(removed)
    }

    async fn contains(&self, key: &str) -> TierResult<bool> {
        self.ensure_online()?;
        Ok(self
            .store
            .entries
            .get(&self.storage_key(key))
            .is_some_and(|bytes| self.decode_live(key, bytes.value()).is_some()))
    }

    async fn stats(&self) -> TierResult<TierStats> {
        self.ensure_online()?;
        self.sweep_expired();
        let item_count = self
            .store
            .entries
            .iter()
            .filter(|item| item.key().starts_with(self.key_prefix.as_str()))
            .count();
        Ok(TierStats {
            item_count: item_count as u64,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            evictions: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> CacheEntry {
        CacheEntry::new(key, value.as_bytes().to_vec(), Some(Duration::from_secs(60)))
            .with_tags(["supplier"])
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let tier = SharedTier::new("shared", "app:", Arc::clone(&store));

        let original = entry("supplier:1", "acme");
        tier.set(original.clone(), Duration::from_secs(60))
            .await
            .unwrap();

        let cached = tier.get("supplier:1").await.unwrap().unwrap();
        assert_eq!(cached, original);
        assert_eq!(store.raw_len(), 1);
    }

    #[tokio::test]
    async fn test_prefix_isolation() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let a = SharedTier::new("shared-a", "a:", Arc::clone(&store));
        let b = SharedTier::new("shared-b", "b:", Arc::clone(&store));

        a.set(entry("k", "from-a"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(b.get("k").await.unwrap().is_none());
        assert!(a.get("k").await.unwrap().is_some());

        let all = KeyPattern::all();
        assert_eq!(b.clear_by_pattern(&all).await.unwrap(), 0);
        assert_eq!(a.clear_by_pattern(&all).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let tier = SharedTier::new("shared", "app:", Arc::clone(&store));
        store.set_online(false);

        let err = tier.get("k").await.unwrap_err();
        assert!(matches!(err, TierError::Unavailable { .. }));
        assert!(err.to_string().contains("kv.test:6379"));

        store.set_online(true);
        assert!(tier.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_dropped() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let tier = SharedTier::new("shared", "app:", Arc::clone(&store));
        store.entries.insert("app:bad".to_string(), vec![1, 2, 3]);

        assert!(tier.get("bad").await.unwrap().is_none());
        assert_eq!(store.raw_len(), 0);
    }

    #[tokio::test]
    async fn test_expired_retention_is_a_miss() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let tier = SharedTier::new("shared", "app:", store);
        tier.set(entry("k", "v"), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!tier.contains("k").await.unwrap());
        assert!(tier.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_sweeps_unread_expired_entries() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let tier = SharedTier::new("shared", "app:", Arc::clone(&store));
        let other = SharedTier::new("other", "other:", Arc::clone(&store));
        tier.set(entry("old", "v"), Duration::from_millis(20))
            .await
            .unwrap();
        tier.set(entry("live", "v"), Duration::from_secs(60))
            .await
            .unwrap();
        other
            .set(entry("old", "v"), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let stats = tier.stats().await.unwrap();
        assert_eq!(stats.item_count, 1);
        assert_eq!(store.raw_len(), 2);

        let all = KeyPattern::all();
        assert_eq!(other.clear_by_pattern(&all).await.unwrap(), 0);
        assert_eq!(store.raw_len(), 1);
    }
}

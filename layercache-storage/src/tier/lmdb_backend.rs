//! LMDB-backed persistent tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide the slowest,
//! authoritative tier. Entries survive process restarts and are stored in
//! their encoded form (see [`CacheEntry::encode`]) in one named database per
//! configured collection.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The tier uses:
//! - Read transactions for `get`, `contains`, and `stats`
//! - Write transactions for `set`, `delete`, and `clear_by_pattern`
//! - Statistics are tracked with atomic counters

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use layercache_core::{add_duration, CacheEntry, KeyPattern, TierError, TierResult};
use tracing::warn;

use super::traits::{CacheTier, TierStats};

/// Error type for opening the LMDB tier.
#[derive(Debug, thiserror::Error)]
pub enum LmdbTierError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbTierError to TierError.
impl From<LmdbTierError> for layercache_core::CacheError {
    fn from(e: LmdbTierError) -> Self {
        layercache_core::CacheError::TierUnavailable(TierError::unavailable("lmdb", e))
    }
}

/// Persistent tier on LMDB.
///
/// # Example
///
/// ```ignore
/// let tier = LmdbTier::open("persistent", "/var/cache/app", "entries", 256)?;
/// tier.set(entry, Duration::from_secs(300)).await?;
/// ```
pub struct LmdbTier {
    name: String,
    /// The LMDB environment.
    env: Env,
    /// Named database holding this collection.
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LmdbTier {
    /// Open (creating if needed) an LMDB tier.
    ///
    /// # Arguments
    ///
    /// * `name` - Tier name for events and logs
    /// * `path` - Directory where LMDB files will be stored
    /// * `collection` - Named database within the environment
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    pub fn open<P: AsRef<Path>>(
        name: impl Into<String>,
        path: P,
        collection: &str,
        max_size_mb: usize,
    ) -> Result<Self, LmdbTierError> {
        // Ensure directory exists
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(16)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbTierError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbTierError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(collection))
            .map_err(|e| LmdbTierError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbTierError::Transaction(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn unavailable(&self, e: impl ToString) -> TierError {
        TierError::unavailable(&self.name, e)
    }

    /// Read the live entry for a key, removing it if expired or corrupt.
    fn read_live(&self, key: &str) -> TierResult<Option<CacheEntry>> {
        let decoded = {
            let rtxn = self.env.read_txn().map_err(|e| self.unavailable(e))?;
            match self
                .db
                .get(&rtxn, key.as_bytes())
                .map_err(|e| self.unavailable(e))?
            {
                Some(bytes) => Some(CacheEntry::decode(key, bytes)),
                None => None,
            }
        };

        match decoded {
            Some(Ok((entry, retain_until))) if retain_until > Utc::now() => Ok(Some(entry)),
            Some(Ok(_)) => {
                self.remove(key)?;
                Ok(None)
            }
            Some(Err(e)) => {
                warn!(tier = %self.name, key = %key, error = %e, "Dropping undecodable LMDB entry");
                self.remove(key)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> TierResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(|e| self.unavailable(e))?;
        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| self.unavailable(e))?;
        wtxn.commit().map_err(|e| self.unavailable(e))?;
        Ok(deleted)
    }

    /// Iterate over keys matching a pattern and collect them.
    fn collect_matching(&self, pattern: &KeyPattern) -> TierResult<Vec<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(|e| self.unavailable(e))?;
        let prefix = pattern.literal_prefix().as_bytes();

        let mut keys = Vec::new();
        let iter = self.db.iter(&rtxn).map_err(|e| self.unavailable(e))?;
        for result in iter {
            match result {
                Ok((key, _)) => {
                    if !key.starts_with(prefix) {
                        continue;
                    }
                    if std::str::from_utf8(key).is_ok_and(|k| pattern.matches(k)) {
                        keys.push(key.to_vec());
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheTier for LmdbTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> TierResult<Option<CacheEntry>> {
        let found = self.read_live(key)?;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    async fn set(&self, entry: CacheEntry, retention: Duration) -> TierResult<()> {
        let bytes = entry.encode(add_duration(Utc::now(), retention));

        let mut wtxn = self.env.write_txn().map_err(|e| self.unavailable(e))?;
        self.db
            .put(&mut wtxn, entry.key.as_bytes(), &bytes)
            .map_err(|e| self.unavailable(e))?;
        wtxn.commit().map_err(|e| self.unavailable(e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> TierResult<bool> {
        self.remove(key)
    }

    async fn clear_by_pattern(&self, pattern: &KeyPattern) -> TierResult<u64> {
        let keys_to_delete = self.collect_matching(pattern)?;

        let mut wtxn = self.env.write_txn().map_err(|e| self.unavailable(e))?;
        let mut deleted = 0u64;
        for key in &keys_to_delete {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(|e| self.unavailable(e))?;

        Ok(deleted)
    }

    async fn contains(&self, key: &str) -> TierResult<bool> {
        Ok(self.read_live(key)?.is_some())
    }

    async fn stats(&self) -> TierResult<TierStats> {
        let rtxn = self.env.read_txn().map_err(|e| self.unavailable(e))?;
        let item_count = self.db.len(&rtxn).map_err(|e| self.unavailable(e))?;
        Ok(TierStats {
            item_count,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            evictions: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tier() -> (LmdbTier, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let tier = LmdbTier::open("persistent", temp_dir.path(), "entries", 10)
            .expect("tier creation should succeed");
        (tier, temp_dir)
    }

    fn entry(key: &str, value: &str) -> CacheEntry {
        CacheEntry::new(key, value.as_bytes().to_vec(), Some(Duration::from_secs(60)))
            .with_tags(["supplier", "supplier:1"])
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (tier, _temp_dir) = create_test_tier();
        let original = entry("supplier:1", "acme");

        tier.set(original.clone(), Duration::from_secs(60))
            .await
            .expect("set should succeed");

        let cached = tier
            .get("supplier:1")
            .await
            .expect("get should succeed")
            .expect("entry should be present");
        assert_eq!(cached, original);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (tier, _temp_dir) = create_test_tier();
        let cached = tier.get("missing").await.expect("get should succeed");
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (tier, _temp_dir) = create_test_tier();
        tier.set(entry("a", "1"), Duration::from_secs(60))
            .await
            .expect("set should succeed");

        assert!(tier.delete("a").await.expect("delete should succeed"));
        assert!(!tier.delete("a").await.expect("delete should succeed"));
        assert!(tier.get("a").await.expect("get should succeed").is_none());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let tier = LmdbTier::open("persistent", temp_dir.path(), "entries", 10)
                .expect("tier creation should succeed");
            tier.set(entry("a", "1"), Duration::from_secs(60))
                .await
                .expect("set should succeed");
        }

        let reopened = LmdbTier::open("persistent", temp_dir.path(), "entries", 10)
            .expect("tier reopen should succeed");
        let cached = reopened.get("a").await.expect("get should succeed");
        assert_eq!(cached.expect("entry should survive").value, b"1");
    }

    #[tokio::test]
    async fn test_clear_by_pattern() {
        let (tier, _temp_dir) = create_test_tier();
        for key in ["supplier:1", "supplier:2", "supplier:list:x", "customer:1"] {
            tier.set(entry(key, "v"), Duration::from_secs(60))
                .await
                .expect("set should succeed");
        }

        let pattern = KeyPattern::new("supplier:?").unwrap();
        let deleted = tier
            .clear_by_pattern(&pattern)
            .await
            .expect("clear should succeed");
        assert_eq!(deleted, 2);
        assert!(tier.contains("supplier:list:x").await.unwrap());
        assert!(tier.contains("customer:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_retention_is_removed() {
        let (tier, _temp_dir) = create_test_tier();
        tier.set(entry("a", "1"), Duration::from_millis(20))
            .await
            .expect("set should succeed");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(tier.get("a").await.expect("get should succeed").is_none());
        assert_eq!(tier.stats().await.unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let (tier, _temp_dir) = create_test_tier();

        let _ = tier.get("a").await;
        tier.set(entry("a", "1"), Duration::from_secs(60))
            .await
            .expect("set should succeed");
        let _ = tier.get("a").await;
        let _ = tier.get("a").await;

        let stats = tier.stats().await.expect("stats should succeed");
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.item_count, 1);
    }
}

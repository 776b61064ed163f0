//! Build tiers from configuration.

use std::sync::Arc;

use layercache_core::{CacheResult, CacheSettings, TierConfig};
use tracing::info;

use super::lmdb_backend::LmdbTier;
use super::memory::MemoryTier;
use super::shared::{SharedStore, SharedTier};
use super::traits::TierRef;

/// Materialize the configured tiers, fastest first.
///
/// Every shared tier attaches to `shared_store` when one is given, so several
/// managers in one process can share a store. Without one, a store is created
/// per distinct endpoint.
pub fn build_tiers(
    settings: &CacheSettings,
    shared_store: Option<Arc<SharedStore>>,
) -> CacheResult<Vec<TierRef>> {
    settings.validate()?;

    let mut stores: Vec<Arc<SharedStore>> = Vec::new();
    let mut tiers: Vec<TierRef> = Vec::with_capacity(settings.tiers.len());

    for tier in &settings.tiers {
        let built: TierRef = match tier {
            TierConfig::Memory { name, capacity } => Arc::new(MemoryTier::new(name, *capacity)),
            TierConfig::Shared {
                name,
                endpoint,
                key_prefix,
            } => {
                let existing = stores.iter().find(|s| s.endpoint() == endpoint).cloned();
                let store = match (&shared_store, existing) {
                    (Some(given), _) => Arc::clone(given),
                    (None, Some(existing)) => existing,
                    (None, None) => {
                        let store = Arc::new(SharedStore::new(endpoint.clone()));
                        stores.push(Arc::clone(&store));
                        store
                    }
                };
                Arc::new(SharedTier::new(name, key_prefix, store))
            }
            TierConfig::Lmdb {
                name,
                path,
                collection,
                max_size_mb,
            } => Arc::new(LmdbTier::open(name, path, collection, *max_size_mb)?),
        };

        info!(tier = %built.name(), "Cache tier ready");
        tiers.push(built);
    }

    Ok(tiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_tiers_in_order() {
        let dir = TempDir::new().unwrap();
        let source = format!(
            r#"
            [[tiers]]
            backend = "memory"
            name = "memory"
            capacity = 100

            [[tiers]]
            backend = "shared"
            name = "shared"
            endpoint = "kv.test:6379"
            key_prefix = "app:"

            [[tiers]]
            backend = "lmdb"
            name = "persistent"
            path = "{}"
            collection = "entries"
            max_size_mb = 10
            "#,
            dir.path().display()
        );
        let settings = CacheSettings::from_toml_str(&source).unwrap();

        let tiers = build_tiers(&settings, None).unwrap();
        let names: Vec<&str> = tiers.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["memory", "shared", "persistent"]);
    }

    #[tokio::test]
    async fn test_build_tiers_attaches_given_store() {
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let settings = CacheSettings::from_toml_str(
            r#"
            [[tiers]]
            backend = "shared"
            name = "shared"
            endpoint = "kv.test:6379"
            key_prefix = "app:"
            "#,
        )
        .unwrap();

        let tiers = build_tiers(&settings, Some(Arc::clone(&store))).unwrap();
        tiers[0]
            .set(
                layercache_core::CacheEntry::new("k", b"v".to_vec(), None),
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(store.raw_len(), 1);
    }

    #[test]
    fn test_build_tiers_rejects_empty_list() {
        let settings = CacheSettings::default();
        assert!(build_tiers(&settings, None).is_err());
    }
}

//! layercache Test Utilities
//!
//! Shared test infrastructure for the layercache workspace:
//! - Tracing setup for tests
//! - A failure-injecting tier wrapper and a counting fetch helper
//! - An in-memory supplier service for cached-service tests
//! - Proptest generators, fixtures, and assertions

// Re-export core types for convenience
pub use layercache_core::{
    CacheConfig, CacheEntry, CacheError, CacheEvent, CachePolicy, CacheResult, KeyPattern,
    PolicyCatalog, PolicyName, TierError, TierResult,
};
pub use layercache_service::{CachedService, EntityService, ServiceError, ServiceResult};
pub use layercache_storage::{
    CacheManager, CacheRead, CacheTier, GetOptions, LmdbTier, MemoryTier, ReadSource,
    SetOptions, SharedStore, SharedTier, TierRef, TierStats,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TIER AND FETCH HELPERS
// ============================================================================

/// Wraps a tier and fails every operation while `failing` is set.
pub struct FlakyTier {
    inner: TierRef,
    failing: AtomicBool,
}

impl FlakyTier {
    pub fn new(inner: TierRef) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    fn check(&self) -> TierResult<()> {
        if self.is_failing() {
            Err(TierError::unavailable(self.inner.name(), "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheTier for FlakyTier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> TierResult<Option<CacheEntry>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, entry: CacheEntry, retention: Duration) -> TierResult<()> {
        self.check()?;
        self.inner.set(entry, retention).await
    }

    async fn delete(&self, key: &str) -> TierResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn clear_by_pattern(&self, pattern: &KeyPattern) -> TierResult<u64> {
        self.check()?;
        self.inner.clear_by_pattern(pattern).await
    }

    async fn contains(&self, key: &str) -> TierResult<bool> {
        self.check()?;
        self.inner.contains(key).await
    }

    async fn stats(&self) -> TierResult<TierStats> {
        self.check()?;
        self.inner.stats().await
    }
}

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count.
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Get options whose fetch counts calls on `counter` and returns `value`.
pub fn counting_options<T>(policy: Arc<CachePolicy>, counter: &CallCounter, value: T) -> GetOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    let counter = counter.clone();
    GetOptions::new(policy, move || {
        let counter = counter.clone();
        let value = value.clone();
        async move {
            counter.increment();
            Ok::<_, String>(value)
        }
    })
}

/// Get options whose fetch always fails with `reason`.
pub fn failing_options<T>(policy: Arc<CachePolicy>, reason: &str) -> GetOptions<T>
where
    T: Send + 'static,
{
    let reason = reason.to_string();
    GetOptions::new(policy, move || {
        let reason = reason.clone();
        async move { Err::<T, _>(reason) }
    })
}

// ============================================================================
// SUPPLIER SERVICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub category: String,
    pub active: bool,
}

impl Supplier {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierFilter {
    pub category: Option<String>,
    pub active: Option<bool>,
}

impl SupplierFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            active: None,
        }
    }

    fn matches(&self, supplier: &Supplier) -> bool {
        self.category.as_ref().map_or(true, |c| *c == supplier.category)
            && self.active.map_or(true, |a| a == supplier.active)
    }
}

/// In-memory supplier store that counts calls and can fail on demand.
#[derive(Debug, Default)]
pub struct InMemorySupplierService {
    suppliers: DashMap<String, Supplier>,
    pub find_by_id_calls: CallCounter,
    pub find_all_calls: CallCounter,
    pub search_calls: CallCounter,
    pub write_calls: CallCounter,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemorySupplierService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suppliers(suppliers: impl IntoIterator<Item = Supplier>) -> Self {
        let service = Self::new();
        for supplier in suppliers {
            service.suppliers.insert(supplier.id.clone(), supplier);
        }
        service
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }

    fn check_read(&self) -> ServiceResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ServiceError::backend("supplier store unavailable"));
        }
        Ok(())
    }

    fn check_write(&self) -> ServiceResult<()> {
        self.write_calls.increment();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::backend("supplier store rejected write"));
        }
        Ok(())
    }

    fn sorted(&self, keep: impl Fn(&Supplier) -> bool) -> Vec<Supplier> {
        let mut found: Vec<Supplier> = self
            .suppliers
            .iter()
            .filter(|s| keep(s.value()))
            .map(|s| s.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }
}

#[async_trait]
impl EntityService for InMemorySupplierService {
    type Entity = Supplier;
    type Filter = SupplierFilter;

    fn entity_type(&self) -> &str {
        "supplier"
    }

    fn entity_id(entity: &Supplier) -> String {
        entity.id.clone()
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<Supplier>> {
        self.find_by_id_calls.increment();
        self.check_read()?;
        Ok(self.suppliers.get(id).map(|s| s.value().clone()))
    }

    async fn find_all(&self, filter: &SupplierFilter) -> ServiceResult<Vec<Supplier>> {
        self.find_all_calls.increment();
        self.check_read()?;
        Ok(self.sorted(|s| filter.matches(s)))
    }

    async fn search(&self, query: &str) -> ServiceResult<Vec<Supplier>> {
        self.search_calls.increment();
        self.check_read()?;
        let needle = query.to_lowercase();
        Ok(self.sorted(|s| s.name.to_lowercase().contains(&needle)))
    }

    async fn create(&self, entity: Supplier) -> ServiceResult<Supplier> {
        self.check_write()?;
        self.suppliers.insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: &str, entity: Supplier) -> ServiceResult<Supplier> {
        self.check_write()?;
        if !self.suppliers.contains_key(id) {
            return Err(ServiceError::NotFound {
                entity_type: "supplier".to_string(),
                id: id.to_string(),
            });
        }
        let updated = Supplier {
            id: id.to_string(),
            ..entity
        };
        self.suppliers.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> ServiceResult<bool> {
        self.check_write()?;
        Ok(self.suppliers.remove(id).is_some())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys, tags, and suppliers.

    use super::*;
    use proptest::prelude::*;

    /// Generate a valid cache key such as `supplier:42` or `list:ab12`.
    pub fn arb_key() -> impl Strategy<Value = String> {
        ("[a-z]{1,8}", "[a-z0-9]{1,12}").prop_map(|(ns, id)| format!("{}:{}", ns, id))
    }

    /// Generate a small set of tag names.
    pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,6}(:[0-9]{1,3})?", 0..5)
    }

    pub fn arb_policy_name() -> impl Strategy<Value = PolicyName> {
        prop::sample::select(PolicyName::ALL.to_vec())
    }

    pub fn arb_supplier() -> impl Strategy<Value = Supplier> {
        (
            "[0-9]{1,4}",
            "[A-Z][a-z]{2,10}",
            prop_oneof![Just("steel"), Just("timber"), Just("glass")],
            any::<bool>(),
        )
            .prop_map(|(id, name, category, active)| Supplier {
                id,
                name,
                category: category.to_string(),
                active,
            })
    }

    pub fn arb_supplier_filter() -> impl Strategy<Value = SupplierFilter> {
        (
            prop::option::of(prop_oneof![
                Just("steel".to_string()),
                Just("timber".to_string()),
                Just("glass".to_string()),
            ]),
            prop::option::of(any::<bool>()),
        )
            .prop_map(|(category, active)| SupplierFilter { category, active })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built managers and services for common scenarios.

    use super::*;
    use tempfile::TempDir;

    /// Config with short timers so tests never wait long.
    pub fn fast_config() -> CacheConfig {
        CacheConfig::default()
            .with_stale_retention(Duration::from_secs(60))
            .with_fetch_timeout(Duration::from_secs(2))
            .with_expiry_tick(Duration::from_millis(10))
    }

    /// Manager over a single memory tier.
    pub fn memory_manager() -> CacheManager {
        let tiers: Vec<TierRef> = vec![Arc::new(MemoryTier::new("memory", 1000))];
        CacheManager::new(tiers, fast_config()).expect("valid memory manager")
    }

    /// A memory, shared, and LMDB manager. Keep `dir` alive for the test.
    pub struct ThreeTier {
        pub manager: CacheManager,
        pub store: Arc<SharedStore>,
        pub dir: TempDir,
    }

    pub fn three_tier_manager() -> ThreeTier {
        three_tier_manager_with(fast_config())
    }

    pub fn three_tier_manager_with(config: CacheConfig) -> ThreeTier {
        let dir = TempDir::new().expect("temp dir");
        let store = Arc::new(SharedStore::new("kv.test:6379"));
        let persistent = LmdbTier::open("persistent", dir.path(), "entries", 10)
            .expect("open lmdb tier");
        let tiers: Vec<TierRef> = vec![
            Arc::new(MemoryTier::new("memory", 1000)),
            Arc::new(SharedTier::new("shared", "app:", Arc::clone(&store))),
            Arc::new(persistent),
        ];
        ThreeTier {
            manager: CacheManager::new(tiers, config).expect("valid three-tier manager"),
            store,
            dir,
        }
    }

    pub fn sample_suppliers() -> Vec<Supplier> {
        vec![
            Supplier::new("7", "Northwind Timber", "timber"),
            Supplier::new("42", "Acme Steel", "steel"),
            Supplier::new("43", "Apex Steelworks", "steel"),
        ]
    }

    /// A cached supplier service over `manager`, plus the raw service for
    /// call counting.
    pub fn cached_suppliers(
        manager: CacheManager,
    ) -> (CachedService<InMemorySupplierService>, Arc<InMemorySupplierService>) {
        let service = Arc::new(InMemorySupplierService::with_suppliers(sample_suppliers()));
        (CachedService::new(Arc::clone(&service), manager), service)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over cache reads, errors, and events.

    use super::*;
    use tokio::sync::broadcast;

    /// Assert that a read was served from `tier`.
    #[track_caller]
    pub fn assert_served_by<T>(read: &CacheRead<T>, tier: &str) {
        assert_eq!(
            read.tier(),
            Some(tier),
            "Expected value from tier {}, got {:?}",
            tier,
            read.source()
        );
    }

    /// Assert that a read came from the fetch function.
    #[track_caller]
    pub fn assert_fetched<T>(read: &CacheRead<T>) {
        assert_eq!(
            read.source(),
            &ReadSource::Fetch,
            "Expected a fetched value, got {:?}",
            read.source()
        );
    }

    #[track_caller]
    pub fn assert_fetch_failed<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(e) if e.is_fetch_failure() => {}
            other => panic!("Expected FetchFailed, got: {:?}", other),
        }
    }

    /// Drain every event currently buffered on `rx`.
    pub fn drain_events(rx: &mut broadcast::Receiver<CacheEvent>) -> Vec<CacheEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Event kinds, in order, for `key`.
    pub fn event_types_for(events: &[CacheEvent], key: &str) -> Vec<&'static str> {
        events
            .iter()
            .filter(|e| e.key() == key)
            .map(|e| e.event_type())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_flaky_tier_toggles() {
        let tier = FlakyTier::new(Arc::new(MemoryTier::new("memory", 10)));
        tier.set(CacheEntry::new("k", b"1".to_vec(), None), Duration::from_secs(60))
            .await
            .unwrap();

        tier.set_failing(true);
        let err = tier.get("k").await.unwrap_err();
        assert_eq!(err.tier(), "memory");

        tier.set_failing(false);
        assert!(tier.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_supplier_service_filters_and_counts() {
        let service = InMemorySupplierService::with_suppliers(fixtures::sample_suppliers());
        let steel = service.find_all(&SupplierFilter::category("steel")).await.unwrap();
        assert_eq!(steel.len(), 2);
        assert_eq!(service.find_all_calls.count(), 1);

        let found = service.search("acme").await.unwrap();
        assert_eq!(found[0].id, "42");

        service.set_fail_writes(true);
        assert!(service.delete("42").await.is_err());
        assert_eq!(service.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_generated_keys_are_valid(key in generators::arb_key()) {
            prop_assert!(layercache_core::validate_key(&key).is_ok());
        }
    }
}

//! Multi-tier cache manager.
//!
//! The manager walks its tiers fastest first, propagates hits upward, fetches
//! on a full miss, and owns the invalidation index and hard-expiry schedule.
//!
//! # Example
//!
//! ```ignore
//! let manager = CacheManager::from_settings(&settings, None)?;
//! let _worker = manager.spawn_expiry_worker();
//!
//! let options = GetOptions::new(manager.policy(PolicyName::Dynamic), move || {
//!     let db = db.clone();
//!     async move { db.load_supplier(42).await }
//! })
//! .with_tags(["supplier", "supplier:42"]);
//!
//! let read = manager.get::<Supplier>("supplier:42", options).await?;
//! if read.is_stale() {
//!     tracing::debug!("served a stale supplier");
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use layercache_core::{
    validate_key, CacheConfig, CacheEntry, CacheError, CacheEvent, CachePolicy, CacheResult,
    CacheSettings, ConfigError, KeyPattern, PolicyCatalog, PolicyName, TierError, ALL_TIERS,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tracing::{debug, warn};

use super::events::EventSink;
use super::expiry::ExpiryScheduler;
use super::index::InvalidationIndex;
use super::options::{GetOptions, SetOptions};
use super::read::CacheRead;
use super::stats::{CacheStats, ManagerMetrics};
use super::worker::{run_expiry_loop, ExpiryWorker};
use crate::tier::{build_tiers, SharedStore, TierRef};

/// An entry found during a tier walk.
struct Found {
    entry: CacheEntry,
    /// Position of the tier that returned it.
    tier: usize,
}

/// Outcome of a tier walk.
#[derive(Default)]
struct Lookup {
    /// First unexpired entry.
    fresh: Option<Found>,
    /// First expired-but-retained entry seen before the fresh one, if any.
    stale: Option<Found>,
}

struct Inner {
    tiers: Vec<TierRef>,
    config: CacheConfig,
    policies: PolicyCatalog,
    index: InvalidationIndex,
    expiry: ExpiryScheduler,
    events: EventSink,
    metrics: ManagerMetrics,
    /// Keys with a background refresh in flight.
    refreshing: DashMap<String, ()>,
    /// Per-key locks for coalescing cold misses.
    flights: DashMap<String, Arc<AsyncMutex<()>>>,
}

/// Orchestrates an ordered list of tiers.
///
/// Cloning is cheap; every clone shares the same tiers, index, and event
/// stream. Construct one per process and hand clones to every consumer.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`CacheManager`], used by background workers so
/// they stop once the last manager is dropped.
#[derive(Clone)]
pub struct WeakCacheManager {
    inner: Weak<Inner>,
}

impl WeakCacheManager {
    pub fn upgrade(&self) -> Option<CacheManager> {
        self.inner.upgrade().map(|inner| CacheManager { inner })
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tiers: Vec<&str> = self.inner.tiers.iter().map(|t| t.name()).collect();
        f.debug_struct("CacheManager")
            .field("tiers", &tiers)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Create a manager over `tiers` (fastest first) with the built-in
    /// policy catalog.
    pub fn new(tiers: Vec<TierRef>, config: CacheConfig) -> CacheResult<Self> {
        Self::with_policies(tiers, config, PolicyCatalog::standard())
    }

    /// Create a manager with a custom policy catalog.
    pub fn with_policies(
        tiers: Vec<TierRef>,
        config: CacheConfig,
        policies: PolicyCatalog,
    ) -> CacheResult<Self> {
        config.validate()?;
        if tiers.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "tiers".to_string(),
            }
            .into());
        }

        let events = EventSink::new(config.event_capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                tiers,
                config,
                policies,
                index: InvalidationIndex::new(),
                expiry: ExpiryScheduler::new(),
                events,
                metrics: ManagerMetrics::new(),
                refreshing: DashMap::new(),
                flights: DashMap::new(),
            }),
        })
    }

    /// Build tiers, policies, and manager settings from a settings document.
    pub fn from_settings(
        settings: &CacheSettings,
        shared_store: Option<Arc<SharedStore>>,
    ) -> CacheResult<Self> {
        let tiers = build_tiers(settings, shared_store)?;
        Self::with_policies(tiers, settings.manager.clone(), settings.policy_catalog()?)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Tiers in lookup order.
    pub fn tiers(&self) -> &[TierRef] {
        &self.inner.tiers
    }

    pub fn policies(&self) -> &PolicyCatalog {
        &self.inner.policies
    }

    /// Shared handle to a named policy.
    pub fn policy(&self, name: PolicyName) -> Arc<CachePolicy> {
        self.inner.policies.get(name)
    }

    pub fn index(&self) -> &InvalidationIndex {
        &self.inner.index
    }

    /// Receive every subsequent cache event.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    pub fn downgrade(&self) -> WeakCacheManager {
        WeakCacheManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read-through lookup.
    ///
    /// Returns the cached value when a tier has a fresh entry, a stale value
    /// when the policy allows it, and otherwise the result of the fetch.
    pub async fn get<T>(&self, key: &str, options: GetOptions<T>) -> CacheResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        validate_key(key)?;
        options.policy.validate()?;

        if options.force_refresh {
            let lookup = self.lookup(key, false).await;
            let prior = lookup.fresh.or(lookup.stale);
            return self.load(key, &options, prior).await;
        }

        let lookup = self.lookup(key, true).await;
        let mut stale = lookup.stale;

        if let Some(found) = lookup.fresh {
            match self.decode::<T>(&found.entry) {
                Ok(value) => {
                    self.propagate(&found, &options.policy).await;
                    self.maybe_refresh_ahead(key, &found.entry, &options);
                    return Ok(self.serve(value, &found, false));
                }
                Err(e) => {
                    self.drop_corrupt(key, &e).await;
                    stale = None;
                }
            }
        }

        if let Some(found) = stale.take() {
            let policy = &options.policy;
            match self.decode::<T>(&found.entry) {
                Ok(value) if policy.stale_while_revalidate() && !policy.hard_ttl() => {
                    debug!(key = %key, "Serving stale entry while revalidating");
                    ManagerMetrics::incr(&self.inner.metrics.stale_served);
                    self.spawn_refresh(key, &options);
                    return Ok(self.serve(value, &found, true));
                }
                Ok(_) => stale = Some(found),
                Err(e) => self.drop_corrupt(key, &e).await,
            }
        }

        if stale.is_none() {
            // Nothing cached anywhere; forget stale index references.
            self.inner.index.prune(key)?;
        }

        if self.inner.config.single_flight {
            self.load_coalesced(key, &options, stale).await
        } else {
            self.load(key, &options, stale).await
        }
    }

    /// Walk the tiers fastest first.
    async fn lookup(&self, key: &str, record: bool) -> Lookup {
        let now = Utc::now();
        let mut lookup = Lookup::default();

        for (position, tier) in self.inner.tiers.iter().enumerate() {
            match tier.get(key).await {
                Ok(Some(entry)) if !entry.is_expired_at(now) => {
                    lookup.fresh = Some(Found {
                        entry,
                        tier: position,
                    });
                    return lookup;
                }
                Ok(Some(entry)) => {
                    if record {
                        self.emit_miss(key, tier);
                    }
                    if lookup.stale.is_none() {
                        lookup.stale = Some(Found {
                            entry,
                            tier: position,
                        });
                    }
                }
                Ok(None) => {
                    if record {
                        self.emit_miss(key, tier);
                    }
                }
                Err(e) => self.tier_warning(key, tier, &e),
            }
        }
        lookup
    }

    fn serve<T>(&self, value: T, found: &Found, stale: bool) -> CacheRead<T> {
        let tier = self.inner.tiers[found.tier].name();
        debug!(key = %found.entry.key, tier = tier, stale = stale, "Cache hit");
        self.inner.events.emit(CacheEvent::Hit {
            key: found.entry.key.clone(),
            tier: tier.to_string(),
            stale,
        });
        CacheRead::from_tier(value, found.entry.created_at, tier, stale)
    }

    /// Copy an entry found in a slower tier into every faster one.
    async fn propagate(&self, found: &Found, policy: &CachePolicy) {
        if found.tier == 0 {
            return;
        }

        let extra = if found.entry.hard_expire {
            Duration::ZERO
        } else {
            policy
                .retention(self.inner.config.stale_retention)
                .saturating_sub(policy.ttl())
        };
        let retention = found
            .entry
            .remaining_ttl_at(Utc::now())
            .map_or(Duration::MAX, |remaining| remaining.saturating_add(extra));

        for tier in &self.inner.tiers[..found.tier] {
            match tier.set(found.entry.clone(), retention).await {
                Ok(()) => self.emit_set(&found.entry.key, tier),
                Err(e) => self.tier_warning(&found.entry.key, tier, &e),
            }
        }
    }

    fn maybe_refresh_ahead<T>(&self, key: &str, entry: &CacheEntry, options: &GetOptions<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let policy = &options.policy;
        if !policy.background_refresh() {
            return;
        }
        let ttl = policy.ttl();
        let threshold = Duration::try_from_secs_f64(
            ttl.as_secs_f64() * self.inner.config.refresh_ahead_ratio,
        )
        .unwrap_or(ttl);
        if entry
            .remaining_ttl_at(Utc::now())
            .is_some_and(|remaining| remaining < threshold)
        {
            debug!(key = %key, "Refreshing ahead of expiry");
            self.spawn_refresh(key, options);
        }
    }

    /// Fetch, store, and fall back to a prior entry on failure when the
    /// policy allows it.
    async fn load<T>(
        &self,
        key: &str,
        options: &GetOptions<T>,
        prior: Option<Found>,
    ) -> CacheResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        match self.fetch_and_store(key, options).await {
            Ok((value, cached_at)) => Ok(CacheRead::from_fetch(value, cached_at)),
            Err(err) if err.is_fetch_failure() && options.policy.stale_if_error() => {
                let fallback = prior.and_then(|found| {
                    self.decode::<T>(&found.entry)
                        .ok()
                        .map(|value| (value, found))
                });
                match fallback {
                    Some((value, found)) => {
                        let stale = found.entry.is_expired();
                        warn!(key = %key, error = %err, "Fetch failed; serving cached value");
                        if stale {
                            ManagerMetrics::incr(&self.inner.metrics.stale_served);
                        }
                        Ok(self.serve(value, &found, stale))
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// [`load`](Self::load) behind a per-key lock, re-reading the cache once
    /// the lock is held.
    async fn load_coalesced<T>(
        &self,
        key: &str,
        options: &GetOptions<T>,
        prior: Option<Found>,
    ) -> CacheResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let flight = Arc::clone(
            &*self
                .inner
                .flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        );

        let result = {
            let _guard = flight.lock().await;
            let again = self.lookup(key, false).await;
            let cached = again.fresh.and_then(|found| {
                self.decode::<T>(&found.entry)
                    .ok()
                    .map(|value| (value, found))
            });
            match cached {
                Some((value, found)) => Ok(self.serve(value, &found, false)),
                None => self.load(key, options, prior).await,
            }
        };

        drop(flight);
        self.inner
            .flights
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn run_fetch<T>(&self, key: &str, options: &GetOptions<T>) -> CacheResult<T> {
        ManagerMetrics::incr(&self.inner.metrics.fetches);
        let timeout = options.timeout.unwrap_or(self.inner.config.fetch_timeout);

        let reason = match tokio::time::timeout(timeout, (options.fetch)()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(reason)) => reason,
            Err(_) => format!("fetch timed out after {}ms", timeout.as_millis()),
        };

        ManagerMetrics::incr(&self.inner.metrics.fetch_failures);
        warn!(key = %key, reason = %reason, "Fetch failed");
        Err(CacheError::FetchFailed {
            key: key.to_string(),
            reason,
        })
    }

    async fn fetch_and_store<T>(
        &self,
        key: &str,
        options: &GetOptions<T>,
    ) -> CacheResult<(T, DateTime<Utc>)>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let value = self.run_fetch(key, options).await?;
        let bytes = encode_value(key, &value)?;
        let declared = options.declarations_for(&value);
        let policy = &options.policy;
        let cached_at = self
            .store(
                key,
                bytes,
                Some(policy.ttl()),
                policy.retention(self.inner.config.stale_retention),
                &declared.tags,
                &declared.depends_on,
                policy.hard_ttl(),
            )
            .await?;
        Ok((value, cached_at))
    }

    /// Start a background refresh unless one is already running for `key`.
    fn spawn_refresh<T>(&self, key: &str, options: &GetOptions<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        if self.inner.refreshing.insert(key.to_string(), ()).is_some() {
            return;
        }

        let manager = self.clone();
        let key = key.to_string();
        let options = options.clone();
        tokio::spawn(async move {
            match manager.fetch_and_store(&key, &options).await {
                Ok(_) => {
                    ManagerMetrics::incr(&manager.inner.metrics.refreshes);
                    debug!(key = %key, "Background refresh completed");
                    manager.inner.events.emit(CacheEvent::Refresh {
                        key: key.clone(),
                        tier: ALL_TIERS.to_string(),
                    });
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Background refresh failed; keeping cached entry");
                }
            }
            manager.inner.refreshing.remove(&key);
        });
    }

    fn decode<T: DeserializeOwned>(&self, entry: &CacheEntry) -> CacheResult<T> {
        serde_json::from_slice(&entry.value).map_err(|e| CacheError::Serialization {
            key: entry.key.clone(),
            reason: e.to_string(),
        })
    }

    async fn drop_corrupt(&self, key: &str, error: &CacheError) {
        warn!(key = %key, error = %error, "Dropping undecodable cache entry");
        self.remove_everywhere(key).await;
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a value to every tier.
    ///
    /// Without a TTL the entry never expires. With one, tiers keep it for an
    /// extra `stale_retention` so stale-tolerant reads can still serve it.
    /// Any pending hard expiry for the key is cancelled.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> CacheResult<()> {
        validate_key(key)?;
        let bytes = encode_value(key, value)?;
        let retention = options.ttl.map_or(Duration::MAX, |ttl| {
            ttl.saturating_add(self.inner.config.stale_retention)
        });
        self.store(
            key,
            bytes,
            options.ttl,
            retention,
            &options.tags,
            &options.depends_on,
            false,
        )
        .await?;
        Ok(())
    }

    /// Write a value with the TTL, retention, and hard-expiry of `policy`.
    ///
    /// The TTL of `options` is ignored.
    pub async fn set_with_policy<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        policy: &CachePolicy,
        options: SetOptions,
    ) -> CacheResult<()> {
        validate_key(key)?;
        policy.validate()?;
        let bytes = encode_value(key, value)?;
        self.store(
            key,
            bytes,
            Some(policy.ttl()),
            policy.retention(self.inner.config.stale_retention),
            &options.tags,
            &options.depends_on,
            policy.hard_ttl(),
        )
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        ttl: Option<Duration>,
        retention: Duration,
        tags: &[String],
        depends_on: &[String],
        hard_expire: bool,
    ) -> CacheResult<DateTime<Utc>> {
        let entry = CacheEntry::new(key, bytes, ttl)
            .with_tags(tags.iter())
            .with_hard_expire(hard_expire);
        let created_at = entry.created_at;

        for tier in &self.inner.tiers {
            match tier.set(entry.clone(), retention).await {
                Ok(()) => self.emit_set(key, tier),
                Err(e) => self.tier_warning(key, tier, &e),
            }
        }

        self.inner.index.register(key, tags, depends_on)?;
        // A deadline past the end of `Instant` never fires.
        match ttl.and_then(|ttl| Instant::now().checked_add(ttl)) {
            Some(fire_at) if hard_expire => {
                self.inner.expiry.schedule(key, fire_at)?;
            }
            _ => {
                self.inner.expiry.cancel(key)?;
            }
        }
        Ok(created_at)
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Delete a key and, transitively, everything that depends on it.
    ///
    /// Returns the number of keys invalidated. Deleting an absent key is not
    /// an error.
    pub async fn del(&self, key: &str) -> CacheResult<u64> {
        validate_key(key)?;
        self.invalidate_keys([key.to_string()]).await
    }

    /// Delete every key carrying `tag`, cascading to dependents.
    pub async fn invalidate_by_tag(&self, tag: &str) -> CacheResult<u64> {
        let keys = self.inner.index.keys_for_tag(tag)?;
        let count = self.invalidate_keys(keys).await?;
        debug!(tag = %tag, keys = count, "Invalidated tag");
        Ok(count)
    }

    /// Delete every key carrying any of `tags`. Each key is invalidated once.
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> CacheResult<u64> {
        let keys = self.inner.index.keys_for_tags(tags)?;
        self.invalidate_keys(keys).await
    }

    /// Delete a list of keys, each with its own dependents.
    pub async fn batch_invalidate(&self, keys: &[String]) -> CacheResult<u64> {
        for key in keys {
            validate_key(key)?;
        }
        self.invalidate_keys(keys.iter().cloned()).await
    }

    async fn invalidate_keys<I>(&self, keys: I) -> CacheResult<u64>
    where
        I: IntoIterator<Item = String>,
    {
        let mut visited: HashSet<String> = HashSet::new();
        for key in keys {
            if visited.contains(&key) {
                continue;
            }
            let dependents = self.inner.index.dependents_of(&key)?;
            for target in std::iter::once(key).chain(dependents) {
                if visited.insert(target.clone()) {
                    self.remove_everywhere(&target).await;
                }
            }
        }
        Ok(visited.len() as u64)
    }

    /// Delete one key from every tier and forget it in the index.
    async fn remove_everywhere(&self, key: &str) {
        for tier in &self.inner.tiers {
            match tier.delete(key).await {
                Ok(true) => {
                    self.inner.events.emit(CacheEvent::Delete {
                        key: key.to_string(),
                        tier: tier.name().to_string(),
                    });
                }
                Ok(false) => {}
                Err(e) => self.tier_warning(key, tier, &e),
            }
        }

        if let Err(e) = self.inner.index.unregister(key) {
            warn!(key = %key, error = %e, "Failed to unregister key from index");
        }
        if let Err(e) = self.inner.expiry.cancel(key) {
            warn!(key = %key, error = %e, "Failed to cancel scheduled expiry");
        }
    }

    /// Remove every key matching the glob `pattern` from every tier.
    ///
    /// Index entries for matching keys that are gone from the authoritative
    /// (slowest) tier are pruned. Returns the largest per-tier removal count.
    pub async fn clear(&self, pattern: &str) -> CacheResult<u64> {
        let pattern = KeyPattern::new(pattern)?;
        let mut removed = 0u64;

        for tier in &self.inner.tiers {
            match tier.clear_by_pattern(&pattern).await {
                Ok(count) => {
                    removed = removed.max(count);
                    self.inner.events.emit(CacheEvent::Clear {
                        pattern: pattern.as_str().to_string(),
                        tier: tier.name().to_string(),
                        count,
                    });
                }
                Err(e) => self.tier_warning(pattern.as_str(), tier, &e),
            }
        }

        if let Some(authoritative) = self.inner.tiers.last() {
            for key in self.inner.index.keys_matching(&pattern)? {
                match authoritative.contains(&key).await {
                    Ok(true) => {}
                    Ok(false) => {
                        self.inner.index.unregister(&key)?;
                        self.inner.expiry.cancel(&key)?;
                    }
                    Err(e) => self.tier_warning(&key, authoritative, &e),
                }
            }
        }

        debug!(pattern = %pattern.as_str(), removed = removed, "Cleared cache pattern");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Hard expiry
    // ------------------------------------------------------------------

    /// Delete every key whose hard expiry is due. Returns how many fired.
    pub async fn expire_due(&self) -> CacheResult<u64> {
        let due = self.inner.expiry.take_due(Instant::now())?;
        let mut fired = 0u64;
        for key in due {
            debug!(key = %key, "Hard expiry fired");
            self.invalidate_keys([key]).await?;
            ManagerMetrics::incr(&self.inner.metrics.hard_expirations);
            fired += 1;
        }
        Ok(fired)
    }

    /// Start the hard-expiry worker.
    ///
    /// The worker runs until [`ExpiryWorker::shutdown`] is called, the
    /// returned handle is dropped, or the last manager clone is dropped.
    pub fn spawn_expiry_worker(&self) -> ExpiryWorker {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_expiry_loop(
            self.downgrade(),
            self.inner.config.expiry_tick,
            shutdown_rx,
        ));
        ExpiryWorker::new(shutdown_tx, handle)
    }

    // ------------------------------------------------------------------
    // Stats and events
    // ------------------------------------------------------------------

    /// Per-tier statistics plus manager counters.
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let mut tiers = Vec::with_capacity(self.inner.tiers.len());
        for tier in &self.inner.tiers {
            match tier.stats().await {
                Ok(stats) => tiers.push((tier.name().to_string(), stats)),
                Err(e) => warn!(tier = %tier.name(), error = %e, "Tier stats unavailable"),
            }
        }

        Ok(CacheStats {
            tiers,
            manager: self.inner.metrics.snapshot(),
            indexed_keys: self.inner.index.key_count()?,
            scheduled_expiries: self.inner.expiry.len()?,
        })
    }

    fn emit_miss(&self, key: &str, tier: &TierRef) {
        debug!(key = %key, tier = %tier.name(), "Cache miss");
        self.inner.events.emit(CacheEvent::Miss {
            key: key.to_string(),
            tier: tier.name().to_string(),
        });
    }

    fn emit_set(&self, key: &str, tier: &TierRef) {
        self.inner.events.emit(CacheEvent::Set {
            key: key.to_string(),
            tier: tier.name().to_string(),
        });
    }

    fn tier_warning(&self, key: &str, tier: &TierRef, error: &TierError) {
        warn!(key = %key, tier = %tier.name(), error = %error, "Cache tier failed; continuing without it");
        self.inner.events.emit(CacheEvent::TierWarning {
            key: key.to_string(),
            tier: tier.name().to_string(),
            reason: error.to_string(),
        });
    }
}

fn encode_value<T: Serialize + ?Sized>(key: &str, value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

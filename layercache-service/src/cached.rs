//! Cached Entity Service
//!
//! [`CachedService`] wraps an [`EntityService`] so reads go through the
//! cache manager and writes invalidate what they touch. Callers use it in
//! place of the service.
//!
//! Keys and tags:
//!
//! | Call | Key | Tags | Depends on |
//! |------|-----|------|------------|
//! | `find_by_id(id)` | `{type}:{id}` | `{type}`, `{type}:{id}` | |
//! | `find_all(filter)` | `{type}:list:{digest}` | `{type}`, `{type}:{id}` per result | each `{type}:{id}` |
//! | `search(query)` | `{type}:search:{digest}` | `{type}`, `{type}:{id}` per result | each `{type}:{id}` |
//!
//! `digest` is the SHA-256 of the method name and JSON-encoded arguments.
//!
//! # Usage
//!
//! ```ignore
//! let suppliers = CachedService::new(Arc::new(SupplierService::new(db)), manager.clone());
//!
//! let supplier = suppliers.find_by_id("42").await?;
//!
//! // Invalidates supplier:42, its dependents, and every supplier list
//! suppliers.update("42", changed).await?;
//! ```

use std::sync::Arc;

use layercache_core::{args_digest, CachePolicy, PolicyCatalog, PolicyName};
use layercache_storage::{CacheManager, CacheRead, Declarations, GetOptions, SetOptions};
use tracing::{debug, warn};

use crate::error::ServiceResult;
use crate::traits::EntityService;

/// Policy per read method.
#[derive(Debug, Clone)]
pub struct ServicePolicies {
    pub find_by_id: Arc<CachePolicy>,
    pub find_all: Arc<CachePolicy>,
    pub search: Arc<CachePolicy>,
}

impl ServicePolicies {
    /// `DYNAMIC` for single entities, `API` for lists, `MICRO` for searches.
    pub fn from_catalog(catalog: &PolicyCatalog) -> Self {
        Self {
            find_by_id: catalog.get(PolicyName::Dynamic),
            find_all: catalog.get(PolicyName::Api),
            search: catalog.get(PolicyName::Micro),
        }
    }

    pub fn with_find_by_id(mut self, policy: Arc<CachePolicy>) -> Self {
        self.find_by_id = policy;
        self
    }

    pub fn with_find_all(mut self, policy: Arc<CachePolicy>) -> Self {
        self.find_all = policy;
        self
    }

    pub fn with_search(mut self, policy: Arc<CachePolicy>) -> Self {
        self.search = policy;
        self
    }
}

impl Default for ServicePolicies {
    fn default() -> Self {
        Self::from_catalog(&PolicyCatalog::standard())
    }
}

/// Read-through, write-invalidate wrapper around an [`EntityService`].
pub struct CachedService<S: EntityService> {
    service: Arc<S>,
    cache: CacheManager,
    policies: ServicePolicies,
}

impl<S: EntityService> Clone for CachedService<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache: self.cache.clone(),
            policies: self.policies.clone(),
        }
    }
}

impl<S: EntityService> CachedService<S> {
    /// Wrap `service`, taking read policies from the manager's catalog.
    pub fn new(service: Arc<S>, cache: CacheManager) -> Self {
        let policies = ServicePolicies::from_catalog(cache.policies());
        Self {
            service,
            cache,
            policies,
        }
    }

    pub fn with_policies(mut self, policies: ServicePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Get a reference to the wrapped service.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Get a reference to the cache manager.
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn policies(&self) -> &ServicePolicies {
        &self.policies
    }

    /// The entity-type tag, e.g. `supplier`.
    pub fn type_tag(&self) -> &str {
        self.service.entity_type()
    }

    /// Key and instance tag of one entity, e.g. `supplier:42`.
    pub fn instance_key(&self, id: &str) -> String {
        format!("{}:{}", self.type_tag(), id)
    }

    pub fn list_key(&self, filter: &S::Filter) -> ServiceResult<String> {
        Ok(format!(
            "{}:list:{}",
            self.type_tag(),
            args_digest("find_all", filter)?
        ))
    }

    pub fn search_key(&self, query: &str) -> ServiceResult<String> {
        Ok(format!(
            "{}:search:{}",
            self.type_tag(),
            args_digest("search", query)?
        ))
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn find_by_id(&self, id: &str) -> ServiceResult<Option<S::Entity>> {
        Ok(self.find_by_id_read(id).await?.into_value())
    }

    /// [`find_by_id`](Self::find_by_id) with cache metadata.
    pub async fn find_by_id_read(&self, id: &str) -> ServiceResult<CacheRead<Option<S::Entity>>> {
        let key = self.instance_key(id);
        let service = Arc::clone(&self.service);
        let owned_id = id.to_string();

        let options = GetOptions::new(Arc::clone(&self.policies.find_by_id), move || {
            let service = Arc::clone(&service);
            let id = owned_id.clone();
            async move { service.find_by_id(&id).await }
        })
        .with_tags([self.type_tag().to_string(), key.clone()]);

        Ok(self.cache.get(&key, options).await?)
    }

    pub async fn find_all(&self, filter: &S::Filter) -> ServiceResult<Vec<S::Entity>> {
        Ok(self.find_all_read(filter).await?.into_value())
    }

    /// [`find_all`](Self::find_all) with cache metadata.
    pub async fn find_all_read(
        &self,
        filter: &S::Filter,
    ) -> ServiceResult<CacheRead<Vec<S::Entity>>> {
        let key = self.list_key(filter)?;
        let service = Arc::clone(&self.service);
        let filter = filter.clone();

        let options = GetOptions::new(Arc::clone(&self.policies.find_all), move || {
            let service = Arc::clone(&service);
            let filter = filter.clone();
            async move { service.find_all(&filter).await }
        })
        .with_tags([self.type_tag().to_string()])
        .with_declarations(self.result_declarations());

        Ok(self.cache.get(&key, options).await?)
    }

    pub async fn search(&self, query: &str) -> ServiceResult<Vec<S::Entity>> {
        Ok(self.search_read(query).await?.into_value())
    }

    /// [`search`](Self::search) with cache metadata.
    pub async fn search_read(&self, query: &str) -> ServiceResult<CacheRead<Vec<S::Entity>>> {
        let key = self.search_key(query)?;
        let service = Arc::clone(&self.service);
        let query = query.to_string();

        let options = GetOptions::new(Arc::clone(&self.policies.search), move || {
            let service = Arc::clone(&service);
            let query = query.clone();
            async move { service.search(&query).await }
        })
        .with_tags([self.type_tag().to_string()])
        .with_declarations(self.result_declarations());

        Ok(self.cache.get(&key, options).await?)
    }

    /// Instance tags and parent keys for every entity in a result list.
    fn result_declarations(&self) -> impl Fn(&Vec<S::Entity>) -> Declarations + Send + Sync + 'static {
        let type_tag = self.type_tag().to_string();
        move |entities: &Vec<S::Entity>| {
            let keys: Vec<String> = entities
                .iter()
                .map(|entity| format!("{}:{}", type_tag, S::entity_id(entity)))
                .collect();
            Declarations {
                tags: keys.clone(),
                depends_on: keys,
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Create an entity, then invalidate and warm its cache entry.
    pub async fn create(&self, entity: S::Entity) -> ServiceResult<S::Entity> {
        let created = self.service.create(entity).await?;
        let id = S::entity_id(&created);
        self.invalidate_entity(&id).await?;
        self.write_back(&id, &created).await;
        Ok(created)
    }

    /// Update an entity, then invalidate and warm its cache entry.
    pub async fn update(&self, id: &str, entity: S::Entity) -> ServiceResult<S::Entity> {
        let updated = self.service.update(id, entity).await?;
        self.invalidate_entity(id).await?;
        self.write_back(&S::entity_id(&updated), &updated).await;
        Ok(updated)
    }

    /// Delete an entity, then invalidate everything derived from it.
    pub async fn delete(&self, id: &str) -> ServiceResult<bool> {
        let removed = self.service.delete(id).await?;
        self.invalidate_entity(id).await?;
        Ok(removed)
    }

    /// Invalidate one entity: its instance tag, its key with dependents, and
    /// the entity-type tag.
    pub async fn invalidate_entity(&self, id: &str) -> ServiceResult<()> {
        let key = self.instance_key(id);
        let by_instance = self.cache.invalidate_by_tag(&key).await?;
        let by_key = self.cache.del(&key).await?;
        let by_type = self.cache.invalidate_by_tag(self.type_tag()).await?;
        debug!(
            key = %key,
            by_instance = by_instance,
            by_key = by_key,
            by_type = by_type,
            "Invalidated entity"
        );
        Ok(())
    }

    /// Invalidate every cached read of this entity type.
    pub async fn invalidate_all(&self) -> ServiceResult<u64> {
        Ok(self.cache.invalidate_by_tag(self.type_tag()).await?)
    }

    async fn write_back(&self, id: &str, entity: &S::Entity) {
        let key = self.instance_key(id);
        let options = SetOptions::new().with_tags([self.type_tag().to_string(), key.clone()]);
        if let Err(e) = self
            .cache
            .set_with_policy(&key, entity, &self.policies.find_by_id, options)
            .await
        {
            warn!(key = %key, error = %e, "Failed to warm cache after write");
        }
    }
}

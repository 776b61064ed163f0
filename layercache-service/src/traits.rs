//! The entity service contract wrapped by [`CachedService`](crate::CachedService).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ServiceResult;

/// An entity-oriented backing service.
///
/// Implementations are the source of truth; the cached wrapper only calls
/// them on a miss or for writes.
#[async_trait]
pub trait EntityService: Send + Sync + 'static {
    /// The entity returned by every method.
    type Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    /// Filter accepted by [`find_all`](Self::find_all).
    type Filter: Serialize + Clone + Send + Sync + 'static;

    /// Lower-case entity type name, used as the type tag and key prefix
    /// (e.g. `"supplier"`).
    fn entity_type(&self) -> &str;

    /// Identifier of an entity.
    fn entity_id(entity: &Self::Entity) -> String;

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<Self::Entity>>;

    async fn find_all(&self, filter: &Self::Filter) -> ServiceResult<Vec<Self::Entity>>;

    async fn search(&self, query: &str) -> ServiceResult<Vec<Self::Entity>>;

    async fn create(&self, entity: Self::Entity) -> ServiceResult<Self::Entity>;

    async fn update(&self, id: &str, entity: Self::Entity) -> ServiceResult<Self::Entity>;

    /// Returns whether an entity was removed.
    async fn delete(&self, id: &str) -> ServiceResult<bool>;
}

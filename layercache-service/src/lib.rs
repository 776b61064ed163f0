//! layercache Service
//!
//! Puts a [`CacheManager`](layercache_storage::CacheManager) in front of an
//! entity-oriented service. Reads are cached under per-method policies;
//! successful writes invalidate the entity, its dependents, and every list
//! of its type.

pub mod cached;
pub mod error;
pub mod traits;

pub use cached::{CachedService, ServicePolicies};
pub use error::{ServiceError, ServiceResult};
pub use traits::EntityService;

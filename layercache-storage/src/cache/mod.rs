//! Cache manager and invalidation engine.
//!
//! [`CacheManager`] walks the configured tiers fastest first and returns
//! reads as [`CacheRead<T>`], which says where the value came from and
//! whether it was served past its TTL. Tag, dependency, pattern, and
//! hard-expiry invalidation are tracked by the [`InvalidationIndex`] and the
//! [`ExpiryScheduler`].

pub mod events;
pub mod expiry;
pub mod index;
pub mod manager;
pub mod options;
pub mod read;
pub mod stats;
pub mod worker;

pub use events::EventSink;
pub use expiry::ExpiryScheduler;
pub use index::InvalidationIndex;
pub use manager::{CacheManager, WeakCacheManager};
pub use options::{DeclareFn, Declarations, FetchFn, GetOptions, SetOptions};
pub use read::{CacheRead, ReadSource};
pub use stats::{CacheStats, ManagerMetrics, ManagerSnapshot};
pub use worker::ExpiryWorker;

//! layercache Storage
//!
//! Cache tiers and the manager that orchestrates them.
//!
//! - [`tier`]: the [`CacheTier`] trait with memory, shared, and LMDB tiers
//! - [`cache`]: [`CacheManager`], the invalidation index, expiry scheduling,
//!   and event distribution

pub mod cache;
pub mod tier;

pub use cache::{
    CacheManager, CacheRead, CacheStats, Declarations, EventSink, ExpiryWorker, GetOptions,
    InvalidationIndex, ReadSource, SetOptions,
};
pub use tier::{
    build_tiers, CacheTier, LmdbTier, LmdbTierError, MemoryTier, SharedStore, SharedTier,
    TierRef, TierStats,
};

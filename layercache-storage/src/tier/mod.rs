//! Cache tiers.
//!
//! Every backing store implements [`CacheTier`]. Three implementations ship
//! with the crate, ordered here from fastest to slowest:
//!
//! - [`MemoryTier`]: process-local LRU
//! - [`SharedTier`]: prefixed view over a [`SharedStore`] shared between managers
//! - [`LmdbTier`]: persistent LMDB store
//!
//! [`build_tiers`] materializes a configured tier list.

pub mod factory;
pub mod lmdb_backend;
pub mod memory;
pub mod shared;
pub mod traits;

pub use factory::build_tiers;
pub use lmdb_backend::{LmdbTier, LmdbTierError};
pub use memory::MemoryTier;
pub use shared::{SharedStore, SharedTier};
pub use traits::{CacheTier, TierRef, TierStats};

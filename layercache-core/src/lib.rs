//! layercache Core - Shared Types
//!
//! Errors, policies, entries, keys, events, and configuration used by every
//! other crate in the workspace. This crate does no I/O apart from reading a
//! settings file on request.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod key;
pub mod policy;

pub use config::{CacheConfig, CacheSettings, TierConfig};
pub use entry::{add_duration, now_millis, CacheEntry, EntryDecodeError};
pub use error::{CacheError, CacheResult, ConfigError, TierError, TierResult};
pub use event::{CacheEvent, ALL_TIERS};
pub use key::{args_digest, validate_key, KeyPattern, MAX_KEY_LEN};
pub use policy::{CachePolicy, PolicyCatalog, PolicyName, PolicyOverride};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

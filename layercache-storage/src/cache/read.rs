//! Cache read results.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Where a value returned by [`CacheManager::get`](super::CacheManager::get)
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadSource {
    /// Served by the named tier.
    Tier(String),
    /// Produced by the fetch function on this call.
    Fetch,
}

/// Result of a cache read, carrying staleness metadata.
///
/// A stale read is one served past its TTL under stale-while-revalidate or
/// stale-if-error. Callers that care can check [`is_stale`](Self::is_stale)
/// before acting on the value.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was produced by a fetch or `set`.
    cached_at: DateTime<Utc>,
    source: ReadSource,
    stale: bool,
}

impl<T> CacheRead<T> {
    /// A read served by a tier.
    pub fn from_tier(
        value: T,
        cached_at: DateTime<Utc>,
        tier: impl Into<String>,
        stale: bool,
    ) -> Self {
        Self {
            value,
            cached_at,
            source: ReadSource::Tier(tier.into()),
            stale,
        }
    }

    /// A read produced by the fetch function.
    pub fn from_fetch(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            source: ReadSource::Fetch,
            stale: false,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn source(&self) -> &ReadSource {
        &self.source
    }

    /// Name of the tier that served the value, if any.
    pub fn tier(&self) -> Option<&str> {
        match &self.source {
            ReadSource::Tier(name) => Some(name),
            ReadSource::Fetch => None,
        }
    }

    /// True if the value came from a tier rather than a fetch.
    pub fn was_cache_hit(&self) -> bool {
        matches!(self.source, ReadSource::Tier(_))
    }

    /// True if the value was served past its TTL.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Age of the value at the time of the call.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Map the value, keeping the metadata.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            source: self.source,
            stale: self.stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tier() {
        let read = CacheRead::from_tier(42, Utc::now(), "memory", false);
        assert!(read.was_cache_hit());
        assert_eq!(read.tier(), Some("memory"));
        assert!(!read.is_stale());
        assert_eq!(read.into_value(), 42);
    }

    #[test]
    fn test_from_fetch() {
        let read = CacheRead::from_fetch("acme", Utc::now());
        assert!(!read.was_cache_hit());
        assert_eq!(read.source(), &ReadSource::Fetch);
        assert_eq!(read.tier(), None);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let read = CacheRead::from_tier(21, Utc::now(), "shared", true);
        let mapped = read.map(|v| v * 2);
        assert_eq!(*mapped.value(), 42);
        assert!(mapped.is_stale());
        assert_eq!(mapped.tier(), Some("shared"));
    }
}

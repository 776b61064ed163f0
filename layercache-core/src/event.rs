//! Observable cache events.
//!
//! The manager publishes one event per state change. Consumers (loggers,
//! metrics exporters) subscribe through the manager's event sink.

use serde::{Deserialize, Serialize};

/// Tier name used for events that are not tied to a single tier.
pub const ALL_TIERS: &str = "*";

/// A cache state change or lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A tier returned an entry for the key. `stale` is set when the entry was
    /// past its TTL and served anyway.
    Hit {
        key: String,
        tier: String,
        stale: bool,
    },
    /// A tier had no entry for the key.
    Miss { key: String, tier: String },
    /// An entry was written to a tier.
    Set { key: String, tier: String },
    /// An entry was removed from a tier.
    Delete { key: String, tier: String },
    /// A pattern clear removed `count` entries from a tier.
    Clear {
        pattern: String,
        tier: String,
        count: u64,
    },
    /// A background refresh replaced the entry in every tier.
    Refresh { key: String, tier: String },
    /// A tier failed; the operation carried on without it.
    TierWarning {
        key: String,
        tier: String,
        reason: String,
    },
}

impl CacheEvent {
    /// Short name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Set { .. } => "set",
            CacheEvent::Delete { .. } => "delete",
            CacheEvent::Clear { .. } => "clear",
            CacheEvent::Refresh { .. } => "refresh",
            CacheEvent::TierWarning { .. } => "tier_warning",
        }
    }

    /// Key the event refers to; the pattern for `Clear`.
    pub fn key(&self) -> &str {
        match self {
            CacheEvent::Hit { key, .. }
            | CacheEvent::Miss { key, .. }
            | CacheEvent::Set { key, .. }
            | CacheEvent::Delete { key, .. }
            | CacheEvent::Refresh { key, .. }
            | CacheEvent::TierWarning { key, .. } => key,
            CacheEvent::Clear { pattern, .. } => pattern,
        }
    }

    pub fn tier(&self) -> &str {
        match self {
            CacheEvent::Hit { tier, .. }
            | CacheEvent::Miss { tier, .. }
            | CacheEvent::Set { tier, .. }
            | CacheEvent::Delete { tier, .. }
            | CacheEvent::Clear { tier, .. }
            | CacheEvent::Refresh { tier, .. }
            | CacheEvent::TierWarning { tier, .. } => tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = CacheEvent::Clear {
            pattern: "supplier:*".to_string(),
            tier: "memory".to_string(),
            count: 3,
        };
        assert_eq!(event.event_type(), "clear");
        assert_eq!(event.key(), "supplier:*");
        assert_eq!(event.tier(), "memory");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CacheEvent::Hit {
            key: "supplier:42".to_string(),
            tier: "memory".to_string(),
            stale: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "hit");
        assert_eq!(json["key"], "supplier:42");

        let back: CacheEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

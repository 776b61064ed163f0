//! Cache entries and their wire encoding.
//!
//! Every tier owns its own copy of an entry. The memory tier keeps the
//! struct itself; the shared and persistent tiers keep the encoded form.
//!
//! # Binary Format
//!
//! ```text
//! [retain_until_ms: i64 LE][created_at_ms: i64 LE][expires_at_ms: i64 LE]
//! [hard_expire: u8][tags_len: u32 LE][tags: JSON array][value bytes]
//! ```
//!
//! `expires_at_ms == i64::MIN` encodes "no expiry".

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

const HEADER_LEN: usize = 8 + 8 + 8 + 1 + 4;
const NO_EXPIRY: i64 = i64::MIN;

/// Errors decoding an encoded entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryDecodeError {
    #[error("entry too short: {len} bytes")]
    Truncated { len: usize },

    #[error("invalid timestamp: {millis}")]
    InvalidTimestamp { millis: i64 },

    #[error("invalid tag list: {reason}")]
    InvalidTags { reason: String },
}

/// A cached value plus the metadata the manager needs to judge freshness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: BTreeSet<String>,
    pub hard_expire: bool,
}

impl CacheEntry {
    /// Create an entry created now, expiring after `ttl` if given.
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let created_at = now_millis();
        Self {
            key: key.into(),
            value,
            created_at,
            expires_at: ttl.map(|ttl| add_duration(created_at, ttl)),
            tags: BTreeSet::new(),
            hard_expire: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hard_expire(mut self, hard_expire: bool) -> Self {
        self.hard_expire = hard_expire;
        self
    }

    /// Returns true if the entry is past its logical expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Returns true if the entry is past its logical expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Remaining freshness at `now`, or `None` for entries without expiry.
    pub fn remaining_ttl_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// How long ago the entry was created.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Encode the entry together with the tier's physical retention deadline.
    pub fn encode(&self, retain_until: DateTime<Utc>) -> Vec<u8> {
        // A BTreeSet<String> always serializes.
        let tags = serde_json::to_vec(&self.tags).unwrap_or_else(|_| b"[]".to_vec());

        let mut bytes = Vec::with_capacity(HEADER_LEN + tags.len() + self.value.len());
        bytes.extend_from_slice(&retain_until.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&self.created_at.timestamp_millis().to_le_bytes());
        let expires = self
            .expires_at
            .map(|at| at.timestamp_millis())
            .unwrap_or(NO_EXPIRY);
        bytes.extend_from_slice(&expires.to_le_bytes());
        bytes.push(u8::from(self.hard_expire));
        bytes.extend_from_slice(&(tags.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&tags);
        bytes.extend_from_slice(&self.value);
        bytes
    }

    /// Decode an entry previously produced by [`CacheEntry::encode`].
    ///
    /// Returns the entry and its retention deadline.
    pub fn decode(
        key: impl Into<String>,
        bytes: &[u8],
    ) -> Result<(Self, DateTime<Utc>), EntryDecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(EntryDecodeError::Truncated { len: bytes.len() });
        }

        let retain_until = millis_to_datetime(read_i64(&bytes[0..8]))?;
        let created_at = millis_to_datetime(read_i64(&bytes[8..16]))?;
        let expires_at = match read_i64(&bytes[16..24]) {
            NO_EXPIRY => None,
            millis => Some(millis_to_datetime(millis)?),
        };
        let hard_expire = bytes[24] != 0;

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[25..29]);
        let tags_len = u32::from_le_bytes(len_bytes) as usize;
        let tags_end = HEADER_LEN + tags_len;
        if bytes.len() < tags_end {
            return Err(EntryDecodeError::Truncated { len: bytes.len() });
        }
        let tags: BTreeSet<String> = serde_json::from_slice(&bytes[HEADER_LEN..tags_end])
            .map_err(|e| EntryDecodeError::InvalidTags {
                reason: e.to_string(),
            })?;

        let entry = Self {
            key: key.into(),
            value: bytes[tags_end..].to_vec(),
            created_at,
            expires_at,
            tags,
            hard_expire,
        };
        Ok((entry, retain_until))
    }
}

/// Current time truncated to millisecond precision, matching the encoding.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// `ts + d`, saturating at the maximum representable timestamp.
pub fn add_duration(ts: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| ts.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, EntryDecodeError> {
    DateTime::from_timestamp_millis(millis).ok_or(EntryDecodeError::InvalidTimestamp { millis })
}

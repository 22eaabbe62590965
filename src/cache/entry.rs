//! Cache Entry Module
//!
//! Defines the value envelope stored by every backend, with TTL and
//! recency metadata.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

static ACCESS_SEQ: AtomicU64 = AtomicU64::new(1);

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Serialized as camelCase JSON for string-only backends. Unknown fields
/// are ignored when reading, and `accessSeq` defaults to 0 when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// The stored value
    pub data: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Time-to-live in milliseconds, 0 = already expired
    #[serde(rename = "ttl")]
    pub ttl_ms: u64,
    /// Last successful read or write (Unix milliseconds)
    pub last_accessed: u64,
    /// Incremented on every write and successful read
    pub access_count: u64,
    /// Process-wide recency stamp, breaks ties between equal timestamps
    #[serde(default)]
    pub access_seq: u64,
}

/// Value-free view of an entry's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub created_at: u64,
    pub ttl_ms: u64,
    pub last_accessed: u64,
    pub access_count: u64,
    pub access_seq: u64,
}

impl EntryMeta {
    /// LRU sort key: oldest first.
    pub fn recency(&self) -> (u64, u64) {
        (self.last_accessed, self.access_seq)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.ttl_ms == 0 || now > self.created_at.saturating_add(self.ttl_ms)
    }
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry: access count 1, accessed now.
    pub fn new(data: V, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            created_at: now,
            ttl_ms: duration_ms(ttl),
            last_accessed: now,
            access_count: 1,
            access_seq: next_access_seq(),
        }
    }

    // == Rewrite ==
    /// Replaces the value of an existing entry.
    ///
    /// Resets the TTL clock and counts the write as an access.
    pub fn rewrite(&mut self, data: V, ttl: Duration) {
        let now = current_timestamp_ms();
        self.data = data;
        self.created_at = now;
        self.ttl_ms = duration_ms(ttl);
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
        self.access_seq = next_access_seq();
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self) {
        self.last_accessed = current_timestamp_ms().max(self.created_at);
        self.access_count = self.access_count.saturating_add(1);
        self.access_seq = next_access_seq();
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// A zero TTL is expired from the start; otherwise the entry stays
    /// readable through `created_at + ttl` inclusive.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.meta().is_expired_at(now)
    }

    /// Expiration timestamp (Unix milliseconds).
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.ttl_ms)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        if self.is_expired() {
            return 0;
        }
        self.expires_at().saturating_sub(current_timestamp_ms())
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            ttl_ms: self.ttl_ms,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            access_seq: self.access_seq,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Returns the next value of the process-wide recency counter.
pub fn next_access_seq() -> u64 {
    ACCESS_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Converts a caller-supplied TTL in milliseconds; negative values clamp to zero.
pub fn ttl_from_millis(ttl_ms: i64) -> Duration {
    Duration::from_millis(ttl_ms.max(0) as u64)
}

/// Whole milliseconds, rounded up so a positive TTL never stores as zero.
fn duration_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

//! Cache Entry Module
//!
//! Defines a single cache entry with its TTL and access metadata.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::Timestamp;

// == Cache Entry ==
/// A key/value pair plus the metadata used for expiration and eviction.
///
/// `last_access` and `access_count` are atomics so reads can touch an entry
/// while only holding the store's read lock.
pub struct CacheEntry<K, V> {
    key: K,
    value: V,
    /// Time to live, zero means the entry never expires
    ttl: Duration,
    /// Last access timestamp (milliseconds), never decreases
    last_access: AtomicU64,
    /// Number of reads since creation
    access_count: AtomicU64,
    /// Insertion sequence assigned by the store
    seq: u64,
    /// Size charged against the store's weight total
    weight: usize,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new entry whose last access is `now`.
    ///
    /// # Arguments
    /// * `ttl` - Time to live, `Duration::ZERO` for no expiration
    /// * `now` - Creation timestamp in milliseconds
    pub fn new(key: K, value: V, ttl: Duration, now: Timestamp) -> Self {
        Self::with_meta(key, value, ttl, now, 0, 0)
    }

    pub(crate) fn with_meta(
        key: K,
        value: V,
        ttl: Duration,
        now: Timestamp,
        seq: u64,
        weight: usize,
    ) -> Self {
        Self {
            key,
            value,
            ttl,
            last_access: AtomicU64::new(now),
            access_count: AtomicU64::new(0),
            seq,
            weight,
        }
    }

    // == Accessors ==
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn last_access(&self) -> Timestamp {
        self.last_access.load(Ordering::Acquire)
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Acquire)
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    // == Is Expired ==
    /// Checks whether the entry is expired at `now`.
    ///
    /// Boundary condition: an entry whose elapsed time equals its TTL is still
    /// live. A `now` earlier than the last access counts as zero elapsed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let elapsed = now.saturating_sub(self.last_access());
        u128::from(elapsed) > self.ttl.as_millis()
    }

    // == Remaining TTL ==
    /// Returns the time left before expiration, or None if the entry never expires.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a TTL and is still live
    /// - `None` if the entry has no TTL
    pub fn remaining_ttl(&self, now: Timestamp) -> Option<Duration> {
        if self.ttl.is_zero() {
            return None;
        }
        let elapsed = Duration::from_millis(now.saturating_sub(self.last_access()));
        Some(self.ttl.saturating_sub(elapsed))
    }

    // == Touch ==
    /// Records a read and returns the value.
    ///
    /// Always increments the access count. Moves `last_access` to `now` only
    /// when `refresh` is set, and never backwards. Expiration is not checked.
    pub fn touch(&self, now: Timestamp, refresh: bool) -> &V {
        if refresh {
            self.last_access.fetch_max(now, Ordering::AcqRel);
        }
        self.access_count.fetch_add(1, Ordering::AcqRel);
        &self.value
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("ttl", &self.ttl)
            .field("last_access", &self.last_access())
            .field("access_count", &self.access_count())
            .field("weight", &self.weight)
            .finish()
    }
}

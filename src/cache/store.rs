//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with pluggable eviction and TTL expiration.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{
    CacheEntry, CacheStats, Candidate, Clock, Eviction, EvictionStrategy, MonotonicClock, OnFull,
    Timestamp,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Store Internals ==
/// State guarded by the store lock.
struct Inner<K, V> {
    entries: HashMap<K, Arc<CacheEntry<K, V>>>,
    /// Sum of the weights of all stored entries
    weight: usize,
    next_seq: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn live_count(&self, now: Timestamp) -> usize {
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    fn candidates(&self, now: Timestamp) -> Vec<Candidate<'_, K>> {
        self.entries
            .values()
            .filter(|e| !e.is_expired(now))
            .map(|e| Candidate {
                key: e.key(),
                last_access: e.last_access(),
                access_count: e.access_count(),
                seq: e.seq(),
                weight: e.weight(),
            })
            .collect()
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Arc<CacheEntry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.remove(key)?;
        self.weight -= removed.weight();
        Some(removed)
    }
}

// == Cache Store ==
/// Thread-safe key/value store with TTL expiration and capacity-driven eviction.
///
/// Hits only take the read lock; inserts, removals and evictions take the
/// write lock so a victim's removal and the new insert are observed together.
pub struct CacheStore<K, V> {
    inner: RwLock<Inner<K, V>>,
    /// Maximum number of live entries, 0 = unbounded
    capacity: usize,
    /// TTL applied by `put`, zero = never expires
    timeout: Duration,
    strategy: Box<dyn EvictionStrategy<K>>,
    clock: Arc<dyn Clock>,
    stats: StatsCounters,
    /// Per-key slots serializing `get_or_insert_with` suppliers
    loading: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore with the oldest-by-access strategy and a monotonic clock.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of live entries, 0 for unbounded
    /// * `timeout` - Default TTL for `put`, `Duration::ZERO` for no expiration
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self::builder().capacity(capacity).timeout(timeout).build()
    }

    /// Creates a store sized and timed from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.capacity, config.timeout())
    }

    pub fn builder() -> CacheStoreBuilder<K, V> {
        CacheStoreBuilder::new()
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Accessors ==
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // == Put ==
    /// Stores a value with the store's default timeout.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.put_with_ttl(key, value, self.timeout)
    }

    /// Stores a value with an explicit TTL.
    ///
    /// Replacing a live key never evicts. A new key on a full store asks the
    /// eviction strategy for a victim; if it declines, the strategy's
    /// `on_decline` policy either lets the store overflow or fails the put.
    ///
    /// # Errors
    /// `CacheError::CapacityExceeded` when the store is full and the strategy
    /// declines with `OnFull::Fail`.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        self.insert_locked(&mut inner, key, value, ttl, 0, now)
    }

    /// Stores a weighted value, evicting until `weight` fits within `budget`
    /// and the entry fits within the store's capacity.
    ///
    /// Victims are chosen up front and only removed once the whole set makes
    /// room. Returns false, leaving the value uncached and no entry evicted,
    /// when the strategy declines before that.
    pub(crate) fn put_weighted(&self, key: K, value: V, weight: usize, budget: usize) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        if let Some(old) = inner.remove(&key) {
            if old.is_expired(now) {
                self.stats.record_expirations(1);
            }
        }

        if budget > 0 && weight > budget {
            return false;
        }

        if self.needs_room(&inner, weight, budget) {
            self.remove_expired_locked(&mut inner, now);
            match self.plan_victims_locked(&inner, now, weight, budget) {
                Some(victims) => {
                    for victim in &victims {
                        self.evict_locked(&mut inner, victim);
                    }
                }
                None => {
                    debug!(weight, budget, "Eviction declined, value not cached");
                    return false;
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let entry = CacheEntry::with_meta(key.clone(), value, self.timeout, now, seq, weight);
        inner.weight += weight;
        inner.entries.insert(key, Arc::new(entry));
        true
    }

    fn insert_locked(
        &self,
        inner: &mut Inner<K, V>,
        key: K,
        value: V,
        ttl: Duration,
        weight: usize,
        now: Timestamp,
    ) -> Result<()> {
        // Only a live entry counts as a replacement; an expired one is dropped
        let existing_live = inner.entries.get(&key).map(|old| !old.is_expired(now));
        let is_overwrite = match existing_live {
            Some(true) => true,
            Some(false) => {
                inner.remove(&key);
                self.stats.record_expirations(1);
                false
            }
            None => false,
        };

        if !is_overwrite && self.capacity > 0 {
            self.make_room_locked(inner, now)?;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let entry = CacheEntry::with_meta(key.clone(), value, ttl, now, seq, weight);
        inner.weight += weight;
        if let Some(old) = inner.entries.insert(key, Arc::new(entry)) {
            inner.weight -= old.weight();
        }
        Ok(())
    }

    /// Frees one slot for a new key when the store is at capacity.
    fn make_room_locked(&self, inner: &mut Inner<K, V>, now: Timestamp) -> Result<()> {
        if inner.entries.len() < self.capacity {
            return Ok(());
        }

        // Expired entries do not count toward capacity, drop them first
        self.remove_expired_locked(inner, now);

        while inner.entries.len() >= self.capacity {
            if self.evict_one_locked(inner, now) {
                continue;
            }
            // Overflow is allowed by a single entry; prune trims it back
            return match self.strategy.on_decline() {
                OnFull::Overflow if inner.entries.len() == self.capacity => {
                    warn!(
                        capacity = self.capacity,
                        size = inner.entries.len(),
                        "Eviction declined, store exceeds capacity"
                    );
                    Ok(())
                }
                _ => Err(CacheError::CapacityExceeded {
                    capacity: self.capacity,
                }),
            };
        }
        Ok(())
    }

    fn needs_room(&self, inner: &Inner<K, V>, weight: usize, budget: usize) -> bool {
        let over_budget = budget > 0 && inner.weight + weight > budget;
        let over_count = self.capacity > 0 && inner.entries.len() >= self.capacity;
        over_budget || over_count
    }

    /// Picks victims, without removing them, until `weight` more fits in
    /// `budget` and one more entry fits in the capacity.
    ///
    /// None if the strategy declines before enough room is found.
    fn plan_victims_locked(
        &self,
        inner: &Inner<K, V>,
        now: Timestamp,
        weight: usize,
        budget: usize,
    ) -> Option<Vec<K>> {
        let mut candidates = inner.candidates(now);
        let mut victims = Vec::new();
        let mut weight_after = inner.weight;
        let mut count_after = inner.entries.len();

        loop {
            let over_budget = budget > 0 && weight_after + weight > budget;
            let over_count = self.capacity > 0 && count_after >= self.capacity;
            if !over_budget && !over_count {
                return Some(victims);
            }

            let key = self.strategy.select_victim(&candidates)?;
            let pos = candidates.iter().position(|c| *c.key == key)?;
            let victim = candidates.swap_remove(pos);
            weight_after -= victim.weight;
            count_after -= 1;
            victims.push(key);
        }
    }

    /// Removes the strategy's victim. Returns false if nothing was evicted.
    fn evict_one_locked(&self, inner: &mut Inner<K, V>, now: Timestamp) -> bool {
        let victim = {
            let candidates = inner.candidates(now);
            self.strategy.select_victim(&candidates)
        };

        match victim {
            Some(key) => self.evict_locked(inner, &key),
            None => false,
        }
    }

    fn evict_locked(&self, inner: &mut Inner<K, V>, key: &K) -> bool {
        match inner.remove(key) {
            Some(evicted) => {
                self.stats.record_eviction();
                debug!(
                    last_access = evicted.last_access(),
                    access_count = evicted.access_count(),
                    "Evicted cache entry"
                );
                true
            }
            None => false,
        }
    }

    /// Evicts entries beyond capacity left by an overflowing insert.
    ///
    /// Falls back to oldest-by-access order when the strategy declines.
    fn trim_excess_locked(&self, inner: &mut Inner<K, V>, now: Timestamp) {
        if self.capacity == 0 {
            return;
        }
        while inner.entries.len() > self.capacity {
            let victim = {
                let candidates = inner.candidates(now);
                self.strategy
                    .select_victim(&candidates)
                    .or_else(|| Eviction::OldestByAccess.select_victim(&candidates))
            };
            let evicted = victim.is_some_and(|key| self.evict_locked(inner, &key));
            if !evicted {
                break;
            }
        }
    }

    // == Get ==
    /// Retrieves a value and refreshes its last access time.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_with(key, true)
    }

    /// Retrieves a value if present and live.
    ///
    /// An expired entry found here is removed. Every hit increments the access
    /// count; the last access time only moves when `refresh` is set.
    pub fn get_with<Q>(&self, key: &Q, refresh: bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let inner = self.inner.read();
        let stale = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.record_hit();
                return Some(entry.touch(now, refresh).clone());
            }
            Some(entry) => Arc::clone(entry),
            None => {
                self.stats.record_miss();
                return None;
            }
        };
        drop(inner);

        self.expire_lazily(key, &stale);
        self.stats.record_miss();
        None
    }

    /// Removes `stale` if it is still the stored entry for `key` and still expired.
    fn expire_lazily<Q>(&self, key: &Q, stale: &Arc<CacheEntry<K, V>>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let still_stale = inner
            .entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, stale) && current.is_expired(now));

        if still_stale {
            inner.remove(key);
            self.stats.record_expirations(1);
            debug!("Removed expired cache entry on lookup");
        }
    }

    // == Get Or Insert ==
    /// Compute-if-absent with a refreshing read. See [`Self::get_or_insert_with`].
    pub fn get_or_insert<F>(&self, key: K, supplier: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_insert_with(key, true, supplier)
    }

    /// Returns the live value for `key`, or computes, stores and returns one.
    ///
    /// The supplier runs at most once per call and outside the store lock.
    /// Callers for the same key queue on a per-key slot, so concurrent callers
    /// all observe a single stored value while other keys stay available. The
    /// supplier may use the store for other keys but must not call back for
    /// `key` itself. If the store is full and refuses the insert, the computed
    /// value is returned uncached.
    pub fn get_or_insert_with<F>(&self, key: K, refresh: bool, supplier: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_with(&key, refresh) {
            return value;
        }

        let slot = Arc::clone(self.loading.lock().entry(key.clone()).or_default());
        let value = {
            let _loading = slot.lock();
            match self.peek_live(&key, refresh) {
                // Supplied by a caller that held the slot before us
                Some(value) => {
                    self.stats.record_hit();
                    value
                }
                None => {
                    let value = supplier();
                    let now = self.clock.now();
                    let mut inner = self.inner.write();
                    let stored = value.clone();
                    let inserted =
                        self.insert_locked(&mut inner, key.clone(), stored, self.timeout, 0, now);
                    if let Err(err) = inserted {
                        warn!(error = %err, "Supplied value not cached");
                    }
                    value
                }
            }
        };

        let mut loading = self.loading.lock();
        let last_user = loading
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2);
        if last_user {
            loading.remove(&key);
        }
        // Slot handles only change under the loading lock
        drop(slot);
        value
    }

    /// Live value for `key`, touched, without recording a hit or miss.
    fn peek_live(&self, key: &K, refresh: bool) -> Option<V> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let entry = inner.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.touch(now, refresh).clone())
    }

    // == Remove ==
    /// Removes an entry by key, returning its value if it was live.
    ///
    /// Removing a missing key is a no-op.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let removed = self.inner.write().remove(key)?;
        if removed.is_expired(now) {
            self.stats.record_expirations(1);
            return None;
        }
        Some(removed.value().clone())
    }

    // == Clear ==
    /// Drops every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.weight = 0;
    }

    // == Prune ==
    /// Removes all expired entries, then evicts any entries beyond capacity
    /// left by an overflowing insert.
    ///
    /// Returns the number of expired entries removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let expired = self.remove_expired_locked(&mut inner, now);
        self.trim_excess_locked(&mut inner, now);
        expired
    }

    fn remove_expired_locked(&self, inner: &mut Inner<K, V>, now: Timestamp) -> usize {
        let expired_keys: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            inner.remove(&key);
        }

        if count > 0 {
            self.stats.record_expirations(count);
            debug!(count, "Pruned expired cache entries");
        }
        count
    }

    // == Size ==
    /// Returns the number of stored entries, including expired ones not yet pruned.
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Returns true if the number of live entries has reached capacity.
    ///
    /// Always false for an unbounded store.
    pub fn is_full(&self) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let now = self.clock.now();
        self.inner.read().live_count(now) >= self.capacity
    }

    /// Returns true if `key` is stored and live. Does not count as an access.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        self.inner
            .read()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    // == Iteration ==
    /// Snapshot of all stored entries, expired ones included.
    ///
    /// Later mutations of the store are not reflected in the iterator.
    pub fn cache_entry_iter(&self) -> impl Iterator<Item = Arc<CacheEntry<K, V>>> {
        let snapshot: Vec<_> = self.inner.read().entries.values().cloned().collect();
        snapshot.into_iter()
    }

    /// Snapshot of the values of live entries. Does not count as an access.
    pub fn values(&self) -> impl Iterator<Item = V> {
        let now = self.clock.now();
        let snapshot: Vec<V> = self
            .inner
            .read()
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value().clone())
            .collect();
        snapshot.into_iter()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.size())
    }

    /// Sum of the weights of all stored entries.
    pub(crate) fn total_weight(&self) -> usize {
        self.inner.read().weight
    }
}

impl<K, V> fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .field("size", &self.inner.read().entries.len())
            .field("strategy", &self.strategy)
            .field("clock", &self.clock)
            .finish()
    }
}

// == Builder ==
/// Configures a [`CacheStore`].
pub struct CacheStoreBuilder<K, V> {
    capacity: usize,
    timeout: Duration,
    strategy: Box<dyn EvictionStrategy<K>>,
    clock: Arc<dyn Clock>,
    _values: PhantomData<fn() -> V>,
}

impl<K, V> CacheStoreBuilder<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone,
{
    /// Unbounded, non-expiring store with the oldest-by-access strategy.
    pub fn new() -> Self {
        Self {
            capacity: 0,
            timeout: Duration::ZERO,
            strategy: Box::new(Eviction::default()),
            clock: Arc::new(MonotonicClock::new()),
            _values: PhantomData,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn eviction(mut self, strategy: impl EvictionStrategy<K> + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> CacheStore<K, V> {
        CacheStore {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                weight: 0,
                next_seq: 0,
            }),
            capacity: self.capacity,
            timeout: self.timeout,
            strategy: self.strategy,
            clock: self.clock,
            stats: StatsCounters::default(),
            loading: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for CacheStoreBuilder<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

//! Cache Module
//!
//! Provides a thread-safe in-memory store with TTL expiration and pluggable eviction.

mod clock;
mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp, WallClock};
pub use entry::CacheEntry;
pub use eviction::{Candidate, Eviction, EvictionStrategy, OnFull};
pub use stats::CacheStats;
pub use store::{CacheStore, CacheStoreBuilder};

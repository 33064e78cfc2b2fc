//! akk_cache - An embeddable in-process cache
//!
//! Provides a thread-safe key/value store with TTL expiration, pluggable
//! eviction and a byte-size-bounded file cache built on top of it.

pub mod cache;
pub mod config;
pub mod error;
pub mod file;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, CacheStore, Eviction, EvictionStrategy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use file::{FileBytes, FileCache, FileSource};
pub use tasks::spawn_prune_task;

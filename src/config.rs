//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries a generic store holds, 0 = unbounded
    pub capacity: usize,
    /// Default TTL in milliseconds, 0 = never expires
    pub timeout_ms: u64,
    /// File cache budget in bytes, 0 = unbounded
    pub file_cache_capacity: usize,
    /// Largest file the file cache will store, in bytes
    pub max_file_size: usize,
    /// Background prune interval in milliseconds
    pub prune_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum entries (default: 1000)
    /// - `CACHE_TIMEOUT_MS` - Default TTL in milliseconds (default: 300000)
    /// - `FILE_CACHE_CAPACITY` - File cache budget in bytes (default: 64 MiB)
    /// - `FILE_CACHE_MAX_FILE_SIZE` - Largest cached file in bytes (default: 1 MiB)
    /// - `PRUNE_INTERVAL_MS` - Prune frequency in milliseconds (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_or("CACHE_CAPACITY", defaults.capacity),
            timeout_ms: env_or("CACHE_TIMEOUT_MS", defaults.timeout_ms),
            file_cache_capacity: env_or("FILE_CACHE_CAPACITY", defaults.file_cache_capacity),
            max_file_size: env_or("FILE_CACHE_MAX_FILE_SIZE", defaults.max_file_size),
            prune_interval_ms: env_or("PRUNE_INTERVAL_MS", defaults.prune_interval_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            timeout_ms: 300_000,
            file_cache_capacity: 64 * 1024 * 1024,
            max_file_size: 1024 * 1024,
            prune_interval_ms: 1000,
        }
    }
}

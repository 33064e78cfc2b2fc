//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Lookup misses are not errors; they surface as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Store is full and its eviction strategy refused to make room
    #[error("Cache full: capacity of {capacity} entries reached")]
    CapacityExceeded { capacity: usize },

    /// The file reader failed
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

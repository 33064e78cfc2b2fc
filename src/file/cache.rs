//! File Cache
//!
//! Wraps a `CacheStore<PathBuf, Arc<[u8]>>` with per-file size admission and
//! an aggregate byte budget.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::file::{FileReader, FsReader};

// == File Source ==
/// Where the bytes returned by `get_file_bytes` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// Served from the cache
    Hit,
    /// Read from the reader and stored
    Cached,
    /// Read from the reader; larger than the per-file limit, not stored
    Oversized,
    /// Read from the reader; could not be fitted into the byte budget
    Uncached,
}

// == File Bytes ==
/// Contents of a file plus how they were obtained.
#[derive(Debug, Clone)]
pub struct FileBytes {
    pub bytes: Arc<[u8]>,
    pub source: FileSource,
}

impl FileBytes {
    pub fn is_hit(&self) -> bool {
        self.source == FileSource::Hit
    }
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

// == File Cache ==
/// Cache of file contents bounded by total bytes and by per-file size.
///
/// Returned buffers are shared and immutable, so the byte accounting of a
/// stored file never changes while it is cached.
pub struct FileCache<R = FsReader> {
    cache: CacheStore<PathBuf, Arc<[u8]>>,
    /// Byte budget for all cached files, 0 = unbounded
    capacity: usize,
    /// Files larger than this are read through without caching
    max_file_size: usize,
    reader: R,
}

impl FileCache<FsReader> {
    // == Constructor ==
    /// Creates a file cache reading from the filesystem.
    ///
    /// # Arguments
    /// * `capacity` - Byte budget, 0 for unbounded
    /// * `max_file_size` - Largest file that will be cached, in bytes
    /// * `timeout` - TTL of cached files, `Duration::ZERO` for no expiration
    pub fn new(capacity: usize, max_file_size: usize, timeout: Duration) -> Self {
        Self::with_reader(capacity, max_file_size, timeout, FsReader)
    }

    /// Creates a filesystem-backed file cache from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.file_cache_capacity,
            config.max_file_size,
            config.timeout(),
        )
    }
}

impl<R: FileReader> FileCache<R> {
    pub fn with_reader(
        capacity: usize,
        max_file_size: usize,
        timeout: Duration,
        reader: R,
    ) -> Self {
        Self::with_store(CacheStore::new(0, timeout), capacity, max_file_size, reader)
    }

    /// Builds a file cache over a preconfigured store.
    ///
    /// The store supplies the TTL, clock and eviction strategy; its strategy
    /// picks victims when a new file does not fit the byte budget. A store
    /// with an entry capacity also bounds the number of cached files.
    pub fn with_store(
        cache: CacheStore<PathBuf, Arc<[u8]>>,
        capacity: usize,
        max_file_size: usize,
        reader: R,
    ) -> Self {
        Self {
            cache,
            capacity,
            max_file_size,
            reader,
        }
    }

    // == Accessors ==
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn timeout(&self) -> Duration {
        self.cache.timeout()
    }

    /// Number of stored files, expired ones not yet pruned included.
    pub fn cached_files_count(&self) -> usize {
        self.cache.size()
    }

    /// Bytes held by stored files.
    pub fn used_size(&self) -> usize {
        self.cache.total_weight()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // == Get File Bytes ==
    /// Returns the contents of `path`, from the cache when possible.
    ///
    /// On a miss the file is read and cached unless it exceeds the per-file
    /// limit or cannot be fitted into the byte budget; either way the bytes
    /// are returned.
    ///
    /// # Errors
    /// `CacheError::Io` when the reader fails. Failures are never cached.
    pub fn get_file_bytes(&self, path: impl AsRef<Path>) -> Result<FileBytes> {
        let path = path.as_ref();

        if let Some(bytes) = self.cache.get(path) {
            return Ok(FileBytes {
                bytes,
                source: FileSource::Hit,
            });
        }

        let bytes: Arc<[u8]> = match self.reader.read(path) {
            Ok(bytes) => bytes.into(),
            Err(source) => {
                warn!(path = %path.display(), error = %source, "Failed to read file");
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let len = bytes.len();

        if len > self.max_file_size {
            debug!(
                path = %path.display(),
                len,
                max_file_size = self.max_file_size,
                "File exceeds maximum cached size, not caching"
            );
            return Ok(FileBytes {
                bytes,
                source: FileSource::Oversized,
            });
        }

        let stored = self
            .cache
            .put_weighted(path.to_path_buf(), Arc::clone(&bytes), len, self.capacity);
        let source = if stored {
            FileSource::Cached
        } else {
            debug!(
                path = %path.display(),
                len,
                capacity = self.capacity,
                "File does not fit, not caching"
            );
            FileSource::Uncached
        };

        Ok(FileBytes { bytes, source })
    }

    // == Remove ==
    /// Drops a cached file. Returns true if a live entry was removed.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.cache.remove(path.as_ref()).is_some()
    }

    // == Prune ==
    /// Removes expired files, returning how many were dropped.
    pub fn prune(&self) -> usize {
        self.cache.prune()
    }

    // == Clear ==
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<R> fmt::Debug for FileCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("capacity", &self.capacity)
            .field("max_file_size", &self.max_file_size)
            .field("cache", &self.cache)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Eviction, ManualClock};
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory reader counting how often each file is read.
    #[derive(Default)]
    struct MemReader {
        files: HashMap<PathBuf, Vec<u8>>,
        reads: AtomicUsize,
    }

    impl MemReader {
        fn with(files: &[(&str, usize)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, len)| (PathBuf::from(name), vec![b'x'; *len]))
                    .collect(),
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl FileReader for MemReader {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_file_cache_accessors() {
        let cache = FileCache::new(1_000, 100, TTL);
        assert_eq!(cache.capacity(), 1_000);
        assert_eq!(cache.max_file_size(), 100);
        assert_eq!(cache.timeout(), TTL);
        assert_eq!(cache.cached_files_count(), 0);
        assert_eq!(cache.used_size(), 0);
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = FileCache::with_reader(1_000, 100, TTL, MemReader::with(&[("a", 10)]));

        let first = cache.get_file_bytes("a").unwrap();
        assert_eq!(first.source, FileSource::Cached);
        assert_eq!(first.len(), 10);
        assert_eq!(cache.used_size(), 10);
        assert_eq!(cache.cached_files_count(), 1);

        let second = cache.get_file_bytes("a").unwrap();
        assert!(second.is_hit());
        assert_eq!(&*second, &*first);
        assert_eq!(cache.reader.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_oversized_file_read_through() {
        let cache = FileCache::with_reader(1_000, 100, TTL, MemReader::with(&[("big", 101)]));

        let bytes = cache.get_file_bytes("big").unwrap();
        assert_eq!(bytes.source, FileSource::Oversized);
        assert_eq!(bytes.len(), 101);
        assert_eq!(cache.used_size(), 0);
        assert_eq!(cache.cached_files_count(), 0);

        // Read again, never served from the cache
        cache.get_file_bytes("big").unwrap();
        assert_eq!(cache.reader.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_error_is_not_cached() {
        let cache = FileCache::with_reader(1_000, 100, TTL, MemReader::default());

        let err = cache.get_file_bytes("missing").unwrap_err();
        assert!(matches!(err, CacheError::Io { ref path, .. } if path == Path::new("missing")));
        assert_eq!(cache.cached_files_count(), 0);

        cache.get_file_bytes("missing").unwrap_err();
        assert_eq!(cache.reader.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_eviction_to_fit_budget() {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::builder().timeout(TTL).clock(clock.clone()).build();
        let reader = MemReader::with(&[("a", 40), ("b", 40), ("c", 50)]);
        let cache = FileCache::with_store(store, 100, 100, reader);

        cache.get_file_bytes("a").unwrap();
        clock.advance(Duration::from_millis(1));
        cache.get_file_bytes("b").unwrap();
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.used_size(), 80);

        // 80 + 50 > 100: the least recently accessed file goes
        let c = cache.get_file_bytes("c").unwrap();
        assert_eq!(c.source, FileSource::Cached);
        assert_eq!(cache.used_size(), 90);
        assert_eq!(cache.cached_files_count(), 2);
        assert!(cache.get_file_bytes("b").unwrap().is_hit());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_file_larger_than_budget_is_uncached() {
        let reader = MemReader::with(&[("a", 30), ("huge", 80)]);
        let cache = FileCache::with_reader(50, 100, TTL, reader);

        cache.get_file_bytes("a").unwrap();
        let huge = cache.get_file_bytes("huge").unwrap();

        assert_eq!(huge.source, FileSource::Uncached);
        assert_eq!(huge.len(), 80);
        // Nothing was evicted for a file that could never fit
        assert_eq!(cache.used_size(), 30);
        assert_eq!(cache.cached_files_count(), 1);
    }

    #[test]
    fn test_reject_strategy_skips_caching() {
        let store = CacheStore::builder()
            .timeout(TTL)
            .eviction(Eviction::Reject)
            .build();
        let reader = MemReader::with(&[("a", 60), ("b", 60)]);
        let cache = FileCache::with_store(store, 100, 100, reader);

        assert_eq!(cache.get_file_bytes("a").unwrap().source, FileSource::Cached);
        assert_eq!(cache.get_file_bytes("b").unwrap().source, FileSource::Uncached);
        assert_eq!(cache.used_size(), 60);
    }

    #[test]
    fn test_store_entry_capacity_bounds_file_count() {
        let store = CacheStore::builder()
            .capacity(2)
            .timeout(TTL)
            .eviction(Eviction::Reject)
            .build();
        let names = ["a", "b", "c", "d", "e"];
        let files: Vec<(&str, usize)> = names.iter().map(|n| (*n, 10)).collect();
        let cache = FileCache::with_store(store, 1_000, 100, MemReader::with(&files));

        let sources: Vec<FileSource> = names
            .iter()
            .map(|n| cache.get_file_bytes(n).unwrap().source)
            .collect();

        assert_eq!(&sources[..2], &[FileSource::Cached, FileSource::Cached]);
        assert!(sources[2..].iter().all(|s| *s == FileSource::Uncached));
        assert_eq!(cache.cached_files_count(), 2);
        assert_eq!(cache.used_size(), 20);
    }

    #[test]
    fn test_expiration_releases_bytes() {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::builder()
            .timeout(Duration::from_millis(100))
            .clock(clock.clone())
            .build();
        let reader = MemReader::with(&[("a", 10), ("b", 20)]);
        let cache = FileCache::with_store(store, 0, 100, reader);

        cache.get_file_bytes("a").unwrap();
        cache.get_file_bytes("b").unwrap();
        assert_eq!(cache.used_size(), 30);

        clock.advance(Duration::from_millis(101));

        // Lazy expiration on lookup re-reads and recharges the same size
        assert_eq!(cache.get_file_bytes("a").unwrap().source, FileSource::Cached);
        assert_eq!(cache.used_size(), 30);

        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.used_size(), 10);
        assert_eq!(cache.cached_files_count(), 1);
    }

    #[test]
    fn test_remove_and_clear_release_bytes() {
        let reader = MemReader::with(&[("a", 10), ("b", 20)]);
        let cache = FileCache::with_reader(0, 100, TTL, reader);

        cache.get_file_bytes("a").unwrap();
        cache.get_file_bytes("b").unwrap();

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.used_size(), 20);

        cache.clear();
        assert_eq!(cache.used_size(), 0);
        assert_eq!(cache.cached_files_count(), 0);
    }

    #[test]
    fn test_concurrent_reads_keep_accounting_consistent() {
        use std::thread;

        let files: Vec<(String, usize)> = (0..20).map(|i| (format!("f{i}"), 10 + i)).collect();
        let names: Vec<(&str, usize)> = files.iter().map(|(n, l)| (n.as_str(), *l)).collect();
        let cache = Arc::new(FileCache::with_reader(150, 100, TTL, MemReader::with(&names)));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let name = format!("f{}", (i * 7 + t) % 20);
                        let bytes = cache.get_file_bytes(&name).unwrap();
                        assert_eq!(bytes.len(), 10 + (i * 7 + t) % 20);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.used_size() <= 150);
        let stored: usize = cache.cache.cache_entry_iter().map(|e| e.weight()).sum();
        assert_eq!(cache.used_size(), stored);
    }
}

//! Bounded memo shared by all sources of one run.
//!
//! Entries are keyed by an external identifier (a hostname, an image id) and
//! filled first-writer-wins. The cache is created per run and dropped with it;
//! least recently used entries are evicted once capacity is reached.

use std::hash::Hash;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

/// Default number of entries kept per run.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Thread-safe LRU cache. Cloning shares the underlying storage.
pub struct RunCache<K, V> {
    inner: Arc<Mutex<LruCache<K, V>>>,
}

impl<K, V> Clone for RunCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq, V: Clone> RunCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Look up a value, refreshing its recency.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    /// Store `value` unless the key is already present.
    ///
    /// Returns the value that ends up cached, which is the earlier one if
    /// another writer got there first.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        match self.inner.lock() {
            Ok(mut cache) => cache.get_or_insert(key, || value).clone(),
            Err(_) => value,
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.lock().map(|c| c.cap().get()).unwrap_or(0)
    }
}

/// The typed caches available to sources during one run.
#[derive(Debug, Clone)]
pub struct RunCaches {
    /// Resolved socket addresses keyed by `host:port`.
    pub addresses: RunCache<String, Arc<[SocketAddr]>>,
}

impl RunCaches {
    /// Create caches with `capacity` entries each.
    pub fn new(capacity: usize) -> Self {
        Self {
            addresses: RunCache::new(capacity),
        }
    }
}

impl Default for RunCaches {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for RunCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCache")
            .field(
                "len",
                &self.inner.try_lock().map(|c| c.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

//! Bounded LRU cache for hot tiles.
//!
//! [`BoundedCache`] holds a fixed number of entries and evicts the
//! least-recently-used one when a new key pushes it over capacity. Both
//! `get` and `put` count as a use.
//!
//! The cache does no locking of its own; a component that shares it across
//! tasks wraps it in a mutex (see [`TileService`](super::TileService)).

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Default number of tiles held in memory by the tile service.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 1024;

/// Fixed-capacity key/value cache with least-recently-used eviction.
///
/// # Example
///
/// ```
/// use tile_proxy::tile::BoundedCache;
///
/// let mut cache = BoundedCache::new(2);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.get(&"a");
/// cache.put("c", 3);
///
/// assert_eq!(cache.get(&"b"), None);
/// assert_eq!(cache.get(&"a"), Some(&1));
/// ```
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Insert or overwrite a value and promote it to most-recently-used.
    ///
    /// Returns the entry evicted to make room, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        // `push` also hands back the replaced value for an existing key,
        // which is not an eviction.
        if self.inner.contains(&key) {
            self.inner.put(key, value);
            return None;
        }
        self.inner.push(key, value)
    }

    /// Check for a key without touching the recency order.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Number of cached entries.
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

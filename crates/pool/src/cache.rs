//! Shared get-or-create cache for immutable, shareable values.
//!
//! Where a [`Pool`](crate::Pool) lends out stateful resources one holder at a
//! time, a [`SharedCache`] hands the *same* immutable value to every caller
//! asking for a key (glyph styles, compiled templates, parsed configs).
//! Lookup and insertion happen in one critical section per key, so two
//! concurrent misses never build the value twice.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Hit/miss counters for a [`SharedCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that built a new value.
    pub misses: u64,
    /// Entries currently cached.
    pub entries: usize,
}

/// Concurrent map from keys to shared, lazily built values.
pub struct SharedCache<K, V> {
    entries: DashMap<K, Arc<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> SharedCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the value for `key`, building it with `make` on first use.
    ///
    /// `make` runs while the key's shard is locked; it must not touch this
    /// cache.
    pub fn get_or_create(&self, key: K, make: impl FnOnce(&K) -> V) -> Arc<V> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = ?entry.key(), "building cached value");
                let value = Arc::new(make(entry.key()));
                Arc::clone(entry.insert(value).value())
            }
        }
    }

    /// Fallible [`get_or_create`](Self::get_or_create); nothing is cached
    /// when `make` fails.
    pub fn try_get_or_create<E>(
        &self,
        key: K,
        make: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let value = Arc::new(make(entry.key())?);
                Ok(Arc::clone(entry.insert(value).value()))
            }
        }
    }

    /// Look up `key` without building anything.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Values still referenced elsewhere stay alive.
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("shared cache cleared");
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<K, V> Default for SharedCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for SharedCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

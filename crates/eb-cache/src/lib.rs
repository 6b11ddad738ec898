//! Bounded content cache for easyblog.
//!
//! [`ContentCache`] is a thread-safe string-keyed store backed by an
//! adaptive replacement (ARC) policy: entries seen once compete for space
//! with entries seen repeatedly, and the split between the two adapts to
//! the workload. Besides capacity pressure, entries only leave the cache
//! through [`ContentCache::remove`] and [`ContentCache::remove_all`].
//!
//! # Example
//!
//! ```
//! use eb_cache::ContentCache;
//!
//! let cache = ContentCache::new(1000);
//! cache.set("blog:/blog/a.md", "<h1>A</h1>".to_owned());
//! assert_eq!(cache.get("blog:/blog/a.md").as_deref(), Some("<h1>A</h1>"));
//! cache.remove("blog:/blog/a.md");
//! assert_eq!(cache.get("blog:/blog/a.md"), None);
//! ```

mod arc;

use std::num::NonZeroUsize;
use std::sync::Mutex;

use arc::ArcStore;

/// Capacity used when zero is requested.
const MIN_CAPACITY: NonZeroUsize = NonZeroUsize::MIN;

/// Thread-safe bounded cache with adaptive replacement.
///
/// Values are cloned out on [`get`](Self::get); store `Arc`s for anything
/// larger than a handful of bytes.
pub struct ContentCache<V> {
    store: Mutex<ArcStore<String, V>>,
    capacity: usize,
}

impl<V: Clone> ContentCache<V> {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(MIN_CAPACITY);
        Self {
            store: Mutex::new(ArcStore::new(capacity)),
            capacity: capacity.get(),
        }
    }

    /// Look up a value. Counts as a use for replacement purposes.
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.lock().unwrap().get(&key.to_owned()).cloned()
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.store.lock().unwrap().put(key.into(), value);
    }

    /// Drop one entry. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.store.lock().unwrap().remove(&key.to_owned()).is_some();
        if removed {
            tracing::debug!(key, "Cache entry removed");
        }
        removed
    }

    /// Drop every entry.
    pub fn remove_all(&self) {
        self.store.lock().unwrap().clear();
        tracing::debug!("Cache purged");
    }

    /// Whether `key` is cached, without counting as a use.
    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().unwrap().contains(&key.to_owned())
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

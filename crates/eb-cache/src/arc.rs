//! Adaptive replacement cache.
//!
//! Four LRU lists: `t1` holds entries seen once recently, `t2` entries seen
//! at least twice. `b1` and `b2` remember keys recently evicted from `t1` and
//! `t2` (no values). A hit in a ghost list shifts the target size `p` of
//! `t1`, which is how the cache adapts between recency and frequency.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

pub(crate) struct ArcStore<K: Hash + Eq + Clone, V> {
    capacity: usize,
    p: usize,
    t1: LruCache<K, V>,
    t2: LruCache<K, V>,
    b1: LruCache<K, ()>,
    b2: LruCache<K, ()>,
}

impl<K: Hash + Eq + Clone, V> ArcStore<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            p: 0,
            t1: LruCache::unbounded(),
            t2: LruCache::unbounded(),
            b1: LruCache::new(capacity),
            b2: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        // Second hit promotes from recency to frequency list
        if let Some(value) = self.t1.pop(key) {
            self.t2.put(key.clone(), value);
            return self.t2.peek(key);
        }
        self.t2.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.t1.contains(key) || self.t2.contains(key)
    }

    pub fn put(&mut self, key: K, value: V) {
        if self.t1.pop(&key).is_some() || self.t2.contains(&key) {
            self.t2.put(key, value);
            return;
        }

        if self.b1.contains(&key) {
            let delta = ratio(self.b2.len(), self.b1.len());
            self.p = (self.p + delta).min(self.capacity);
            if self.len() >= self.capacity {
                self.replace(false);
            }
            self.b1.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.b2.contains(&key) {
            let delta = ratio(self.b1.len(), self.b2.len());
            self.p = self.p.saturating_sub(delta);
            if self.len() >= self.capacity {
                self.replace(true);
            }
            self.b2.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.len() >= self.capacity {
            self.replace(false);
        }
        if self.b1.len() > self.capacity - self.p {
            self.b1.pop_lru();
        }
        if self.b2.len() > self.p {
            self.b2.pop_lru();
        }
        self.t1.put(key, value);
    }

    /// Evict one entry from `t1` or `t2` into the matching ghost list.
    fn replace(&mut self, hit_in_b2: bool) {
        let t1_len = self.t1.len();
        if t1_len > 0 && (t1_len > self.p || (t1_len == self.p && hit_in_b2)) {
            if let Some((key, _)) = self.t1.pop_lru() {
                self.b1.put(key, ());
            }
        } else if let Some((key, _)) = self.t2.pop_lru() {
            self.b2.put(key, ());
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.b1.pop(key);
        self.b2.pop(key);
        self.t1.pop(key).or_else(|| self.t2.pop(key))
    }

    pub fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }
}

/// Ghost-hit adjustment: at least 1, otherwise `other / own`.
fn ratio(other: usize, own: usize) -> usize {
    if own == 0 || other <= own {
        1
    } else {
        other / own
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> ArcStore<u32, u32> {
        ArcStore::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_bounded_by_capacity() {
        let mut arc = store(4);
        for i in 0..100 {
            arc.put(i, i);
            assert!(arc.len() <= 4);
        }
        assert!(arc.contains(&99));
        assert!(!arc.contains(&0));
    }

    #[test]
    fn test_frequent_entries_survive_scan() {
        let mut arc = store(4);
        arc.put(1, 1);
        arc.put(2, 2);
        // Promote both to the frequency list
        assert_eq!(arc.get(&1), Some(&1));
        assert_eq!(arc.get(&2), Some(&2));

        // One-shot scan over many keys
        for i in 100..110 {
            arc.put(i, i);
        }

        assert!(arc.contains(&1));
        assert!(arc.contains(&2));
        assert_eq!(arc.len(), 4);
    }

    #[test]
    fn test_ghost_hit_adapts_target() {
        let mut arc = store(2);
        arc.put(1, 1);
        arc.put(2, 2);
        arc.put(3, 3); // evicts 1 into b1
        assert!(!arc.contains(&1));
        arc.put(1, 10); // ghost hit: grows p, lands in t2
        assert!(arc.p > 0);
        assert_eq!(arc.get(&1), Some(&10));
        assert!(arc.len() <= 2);
    }

    #[test]
    fn test_update_existing_keeps_single_copy() {
        let mut arc = store(3);
        arc.put(1, 1);
        arc.put(1, 2);
        arc.put(1, 3);
        assert_eq!(arc.len(), 1);
        assert_eq!(arc.get(&1), Some(&3));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut arc = store(3);
        arc.put(1, 1);
        arc.put(2, 2);
        arc.get(&2);
        assert_eq!(arc.remove(&1), Some(1));
        assert_eq!(arc.remove(&2), Some(2));
        assert_eq!(arc.remove(&3), None);
        arc.put(4, 4);
        arc.clear();
        assert_eq!(arc.len(), 0);
        assert_eq!(arc.get(&4), None);
    }
}

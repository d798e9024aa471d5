// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;

/// Default number of entries kept by a [`ResultCache`].
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded least-recently-used cache of evaluation results.
///
/// A hit refreshes recency; inserting past capacity evicts exactly the least
/// recently used entry. A capacity of zero disables caching.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Option<LruCache<String, V>>,
    stats: CacheStats,
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let hit = self.entries.as_mut().and_then(|e| e.get(key)).cloned();
        match hit {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        hit
    }

    pub fn put(&mut self, key: String, value: V) {
        let Some(entries) = self.entries.as_mut() else {
            return;
        };
        self.stats.insertions += 1;
        // `push` hands back either the replaced value for the same key or the
        // evicted least recently used entry.
        if let Some((old, _)) = entries.push(key.clone(), value) {
            if old != key {
                self.stats.evictions += 1;
            }
        }
    }

    /// Changes the capacity, evicting least recently used entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        let len = self.len();
        let Some(cap) = NonZeroUsize::new(capacity) else {
            self.stats.evictions += len as u64;
            self.entries = None;
            return;
        };
        match self.entries.as_mut() {
            Some(entries) => {
                entries.resize(cap);
                self.stats.evictions += len.saturating_sub(cap.get()) as u64;
            }
            None => self.entries = Some(LruCache::new(cap)),
        }
    }

    /// Drops every entry. Statistics are kept.
    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.cap().get())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.len(),
            capacity: self.capacity(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_are_counted() {
        let mut cache = ResultCache::new(4);
        assert_eq!(cache.get("a"), None);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.insertions), (1, 1, 1));
        assert_eq!((stats.len, stats.capacity), (1, 4));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ResultCache::new(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        // Refresh `a` so that `b` becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let mut cache = ResultCache::new(2);
        cache.put("a".to_string(), 1);
        cache.put("a".to_string(), 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn shrinking_evicts() {
        let mut cache = ResultCache::new(3);
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            cache.put(k.to_string(), v);
        }
        cache.set_capacity(1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut cache = ResultCache::new(0);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().insertions, 0);

        cache.set_capacity(2);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn clear_keeps_statistics() {
        let mut cache = ResultCache::new(2);
        cache.put("a".to_string(), 1);
        let _ = cache.get("a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().hits, 1);
    }
}

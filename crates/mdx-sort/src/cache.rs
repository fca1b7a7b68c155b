//! Bounded LRU cache backing the tuple-value memoizer.
//!
//! Single-threaded by design; a cache instance lives inside one comparator
//! and never outlives the sort that created it. Eviction only costs repeat
//! evaluations, never correctness.

use std::hash::Hash;

use ahash::AHashMap;

/// Hit/miss/eviction counters of one cache instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity map evicting the least recently used entry. Entries live
/// in a slab indexed by a hash map; recency is an intrusive doubly-linked
/// list over slab indices.
pub(crate) struct LruCache<K, V> {
    map: AHashMap<K, usize>,
    entries: Vec<Entry<K, V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    stats: CacheStats,
}

impl<K: Clone + Eq + Hash, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: AHashMap::new(),
            entries: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Looks up `key`, marking the entry as most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.map.get(key).copied() {
            Some(index) => {
                self.stats.hits += 1;
                self.move_to_front(index);
                Some(&self.entries[index].value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some(&index) = self.map.get(&key) {
            self.entries[index].value = value;
            self.move_to_front(index);
            return;
        }
        if self.map.len() == self.capacity {
            self.evict_lru();
        }
        let entry = Entry {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index] = entry;
                index
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        self.map.insert(key, index);
        self.push_front(index);
    }

    fn move_to_front(&mut self, index: usize) {
        if self.head == Some(index) {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }

    fn push_front(&mut self, index: usize) {
        self.entries[index].prev = None;
        self.entries[index].next = self.head;
        if let Some(old_head) = self.head {
            self.entries[old_head].prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.entries[index].prev, self.entries[index].next);
        match prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.tail = prev,
        }
        self.entries[index].prev = None;
        self.entries[index].next = None;
    }

    fn evict_lru(&mut self) {
        if let Some(index) = self.tail {
            self.unlink(index);
            self.map.remove(&self.entries[index].key);
            self.free.push(index);
            self.stats.evictions += 1;
        }
    }
}

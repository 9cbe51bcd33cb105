//! Bounded least-recently-used cache.
//!
//! [`LruCache`] memoizes expensive intermediate structures (for example
//! sparse matrices keyed by a fingerprint of their inputs). It holds at most
//! `maxsize` entries; when a new key arrives at capacity, the entry touched
//! longest ago is evicted. A *touch* is either a [`put`](LruCache::put) or a
//! successful [`get`](LruCache::get).
//!
//! Recency is tracked with an index-based doubly linked list stored in a
//! `Vec`, so every operation is O(1) and no two keys ever share a rank.
//!
//! The cache takes `&mut self` for every touching operation and performs no
//! internal locking. Wrap it in [`SharedLruCache`] when several threads need
//! access.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::error::{AdjacencyError, Result};

/// Slot in the recency list.
#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    /// Towards the most recent end.
    prev: Option<usize>,
    /// Towards the least recent end.
    next: Option<usize>,
}

/// A capacity-limited map with strict LRU eviction.
///
/// # Example
///
/// ```
/// use ruvector_adjacency::cache::LruCache;
///
/// let mut cache = LruCache::new(2).unwrap();
/// cache.put("a", 1);
/// cache.put("b", 2);
/// assert_eq!(*cache.get(&"a").unwrap(), 1); // "a" is now most recent
/// cache.put("c", 3);                         // evicts "b"
/// assert!(!cache.contains(&"b"));
/// assert!(cache.contains(&"a") && cache.contains(&"c"));
/// ```
pub struct LruCache<K, V> {
    /// key -> (value, slot in `nodes`)
    map: HashMap<K, (V, usize)>,
    nodes: Vec<Node<K>>,
    /// Most recently touched slot.
    head: Option<usize>,
    /// Least recently touched slot (next eviction victim).
    tail: Option<usize>,
    maxsize: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
{
    /// Create an empty cache holding at most `maxsize` entries.
    ///
    /// # Errors
    ///
    /// Returns [`AdjacencyError::InvalidParameter`] if `maxsize` is zero.
    pub fn new(maxsize: usize) -> Result<Self> {
        if maxsize == 0 {
            return Err(AdjacencyError::parameter("maxsize", maxsize, ">= 1"));
        }
        Ok(Self {
            map: HashMap::with_capacity(maxsize),
            nodes: Vec::with_capacity(maxsize),
            head: None,
            tail: None,
            maxsize,
        })
    }

    /// Insert or overwrite `key`, making it the most recent entry.
    ///
    /// If `key` is new and the cache is full, the least recently touched
    /// entry is evicted first and returned.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some((stored, slot)) = self.map.get_mut(&key) {
            *stored = value;
            let slot = *slot;
            self.promote(slot);
            return None;
        }

        if self.map.len() < self.maxsize {
            let slot = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                prev: None,
                next: None,
            });
            self.map.insert(key, (value, slot));
            self.push_front(slot);
            return None;
        }

        // Full: recycle the tail slot for the new key.
        let slot = self.tail?;
        self.unlink(slot);
        let old_key = std::mem::replace(&mut self.nodes[slot].key, key.clone());
        let evicted = self
            .map
            .remove(&old_key)
            .map(|(old_value, _)| (old_key, old_value));
        self.map.insert(key, (value, slot));
        self.push_front(slot);
        evicted
    }

    /// Look up `key` and promote it to most recent.
    ///
    /// # Errors
    ///
    /// Returns [`AdjacencyError::NotFound`] if `key` is absent.
    pub fn get(&mut self, key: &K) -> Result<&V> {
        let slot = match self.map.get(key) {
            Some((_, slot)) => *slot,
            None => return Err(AdjacencyError::NotFound(format!("{key:?}"))),
        };
        self.promote(slot);
        self.map
            .get(key)
            .map(|(value, _)| value)
            .ok_or_else(|| AdjacencyError::NotFound(format!("{key:?}")))
    }

    /// Look up `key` without changing its rank.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|(value, _)| value)
    }

    /// Whether `key` is present. Does not change its rank.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries, fixed at construction.
    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Keys ordered from most to least recently touched.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            let node = &self.nodes[slot];
            cursor = node.next;
            Some(&node.key)
        })
    }

    fn promote(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.nodes[slot];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("maxsize", &self.maxsize)
            .field("len", &self.map.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SharedLruCache
// ---------------------------------------------------------------------------

/// [`LruCache`] behind a mutex, for callers sharing one cache across threads.
///
/// Every operation takes the lock for its whole duration, so the LRU
/// contract holds exactly as for the single-threaded cache. `get` returns a
/// clone because the value cannot outlive the guard.
pub struct SharedLruCache<K, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K, V> SharedLruCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    /// Create a shared cache holding at most `maxsize` entries.
    pub fn new(maxsize: usize) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(LruCache::new(maxsize)?),
        })
    }

    /// See [`LruCache::put`].
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        self.inner.lock().put(key, value)
    }

    /// See [`LruCache::get`].
    pub fn get(&self, key: &K) -> Result<V> {
        self.inner.lock().get(key).cloned()
    }

    /// See [`LruCache::contains`].
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// See [`LruCache::len`].
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// See [`LruCache::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn maxsize(&self) -> usize {
        self.inner.lock().maxsize()
    }
}

impl<K, V> fmt::Debug for SharedLruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("SharedLruCache")
            .field("maxsize", &guard.maxsize)
            .field("len", &guard.map.len())
            .finish()
    }
}

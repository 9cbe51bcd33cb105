//! Integration tests for the bounded LRU caches.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use ruvector_adjacency::cache::{LruCache, SharedLruCache};
use ruvector_adjacency::AdjacencyError;

#[test]
fn test_evicts_least_recent() {
    let mut cache = LruCache::new(2).unwrap();
    assert!(cache.put("a", 1).is_none());
    assert!(cache.put("b", 2).is_none());
    assert_eq!(*cache.get(&"a").unwrap(), 1);

    // "b" is now the least recently touched entry.
    assert_eq!(cache.put("c", 3), Some(("b", 2)));
    assert!(!cache.contains(&"b"));
    assert_eq!(cache.keys_by_recency().copied().collect::<Vec<_>>(), vec!["c", "a"]);
}

#[test]
fn test_overwrite_promotes_without_evicting() {
    let mut cache = LruCache::new(2).unwrap();
    cache.put(1, "one");
    cache.put(2, "two");
    assert!(cache.put(1, "uno").is_none());
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.peek(&1), Some(&"uno"));
    assert_eq!(cache.put(3, "three"), Some((2, "two")));
}

#[test]
fn test_peek_and_contains_keep_rank() {
    let mut cache = LruCache::new(2).unwrap();
    cache.put('x', 0);
    cache.put('y', 1);
    assert!(cache.contains(&'x'));
    assert_eq!(cache.peek(&'x'), Some(&0));
    assert_eq!(cache.put('z', 2), Some(('x', 0)));
}

#[test]
fn test_missing_key_is_not_found() {
    let mut cache: LruCache<String, u8> = LruCache::new(4).unwrap();
    assert!(cache.is_empty());
    assert!(matches!(
        cache.get(&"absent".to_string()),
        Err(AdjacencyError::NotFound(_))
    ));
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(
        LruCache::<u32, u32>::new(0),
        Err(AdjacencyError::InvalidParameter { .. })
    ));
    assert!(SharedLruCache::<u32, u32>::new(0).is_err());
}

#[test]
fn test_capacity_one() {
    let mut cache = LruCache::new(1).unwrap();
    cache.put(1, 1);
    assert_eq!(cache.put(2, 2), Some((1, 1)));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.maxsize(), 1);
}

#[test]
fn test_shared_cache_across_threads() {
    let cache = Arc::new(SharedLruCache::new(64).unwrap());
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..16 {
                    cache.put(t * 100 + i, i * i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.len(), 64);
    assert_eq!(cache.get(&305).unwrap(), 25);
    assert!(cache.contains(&0));
}

/// Reference model: front is most recent.
fn model_put(
    model: &mut VecDeque<(u8, u32)>,
    cap: usize,
    key: u8,
    value: u32,
) -> Option<(u8, u32)> {
    if let Some(pos) = model.iter().position(|(k, _)| *k == key) {
        model.remove(pos);
        model.push_front((key, value));
        return None;
    }
    let evicted = if model.len() == cap { model.pop_back() } else { None };
    model.push_front((key, value));
    evicted
}

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    Get(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..8).prop_map(Op::Get),
    ]
}

proptest! {
    #[test]
    fn prop_matches_reference_model(
        cap in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 0..64)
    ) {
        let mut cache = LruCache::new(cap).unwrap();
        let mut model: VecDeque<(u8, u32)> = VecDeque::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    prop_assert_eq!(cache.put(k, v), model_put(&mut model, cap, k, v));
                }
                Op::Get(k) => {
                    let expected = model.iter().position(|(mk, _)| *mk == k).map(|pos| {
                        let entry = model.remove(pos).unwrap();
                        model.push_front(entry);
                        entry.1
                    });
                    prop_assert_eq!(cache.get(&k).ok().copied(), expected);
                }
            }
            prop_assert!(cache.len() <= cap);
            let order: Vec<u8> = cache.keys_by_recency().copied().collect();
            let model_order: Vec<u8> = model.iter().map(|(k, _)| *k).collect();
            prop_assert_eq!(order, model_order);
        }
    }
}

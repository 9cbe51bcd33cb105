//! Grouping and sequence helpers used to assemble coordinate batches.
//!
//! [`group_by`] partitions a collection by key after a stable sort, and
//! [`repeat_expand`] / [`repeat_pairs`] flatten run-length encoded sequences
//! (for example the row index of every stored entry of a CSR matrix, expanded
//! from the per-row degrees).

use std::collections::BTreeMap;

use crate::error::{AdjacencyError, Result};

/// Partition `data` into a map from key to the elements sharing that key.
///
/// Elements are stably sorted by `key_fn` before being split into runs, so
/// the cost is O(n log n) and each group keeps the relative input order of
/// its members. The key function is evaluated once per element.
///
/// # Example
///
/// ```
/// use ruvector_adjacency::grouping::group_by;
///
/// let groups = group_by(vec![5, 1, 5, 2, 1], |x| *x);
/// assert_eq!(groups[&1], vec![1, 1]);
/// assert_eq!(groups[&2], vec![2]);
/// assert_eq!(groups[&5], vec![5, 5]);
/// ```
pub fn group_by<T, K, F>(data: impl IntoIterator<Item = T>, mut key_fn: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut keyed: Vec<(K, T)> = data.into_iter().map(|item| (key_fn(&item), item)).collect();
    // Stable: equal keys keep input order.
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    let mut run: Option<(K, Vec<T>)> = None;

    for (key, item) in keyed {
        if let Some((current, members)) = run.as_mut() {
            if *current == key {
                members.push(item);
                continue;
            }
        }
        if let Some((k, members)) = run.replace((key, vec![item])) {
            groups.insert(k, members);
        }
    }
    if let Some((k, members)) = run {
        groups.insert(k, members);
    }

    groups
}

/// Concatenate `sources[i]` repeated `counts[i]` times.
///
/// The output length is `counts.iter().sum()`. Zero counts contribute
/// nothing.
///
/// # Errors
///
/// Returns [`AdjacencyError::LengthMismatch`] if `sources` and `counts` have
/// different lengths.
pub fn repeat_expand<T: Clone>(sources: &[T], counts: &[usize]) -> Result<Vec<T>> {
    if sources.len() != counts.len() {
        return Err(AdjacencyError::LengthMismatch {
            expected: sources.len(),
            actual: counts.len(),
        });
    }
    Ok(repeat_pairs(
        sources.iter().cloned().zip(counts.iter().copied()),
    ))
}

/// Flatten `(value, count)` pairs into a single sequence.
pub fn repeat_pairs<T: Clone>(pairs: impl IntoIterator<Item = (T, usize)>) -> Vec<T> {
    let pairs: Vec<(T, usize)> = pairs.into_iter().collect();
    let total: usize = pairs.iter().map(|(_, n)| *n).sum();
    let mut out = Vec::with_capacity(total);
    for (value, count) in pairs {
        out.extend(std::iter::repeat(value).take(count));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_identity_keys() {
        let groups = group_by(vec![5, 1, 5, 2, 1], |x| *x);
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 5]);
        assert_eq!(groups[&1], vec![1, 1]);
        assert_eq!(groups[&2], vec![2]);
        assert_eq!(groups[&5], vec![5, 5]);
    }

    #[test]
    fn group_members_keep_input_order() {
        let words = vec!["bb", "a", "cc", "d", "eee"];
        let groups = group_by(words, |w| w.len());
        assert_eq!(groups[&1], vec!["a", "d"]);
        assert_eq!(groups[&2], vec!["bb", "cc"]);
        assert_eq!(groups[&3], vec!["eee"]);
    }

    #[test]
    fn group_empty_input() {
        let groups = group_by(Vec::<u32>::new(), |x| *x);
        assert!(groups.is_empty());
    }

    #[test]
    fn expand_repeats_in_order() {
        let out = repeat_expand(&['a', 'b', 'c'], &[2, 0, 3]).unwrap();
        assert_eq!(out, vec!['a', 'a', 'c', 'c', 'c']);
    }

    #[test]
    fn expand_rejects_length_mismatch() {
        let err = repeat_expand(&[1, 2], &[1]).unwrap_err();
        assert!(matches!(
            err,
            AdjacencyError::LengthMismatch { expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn pairs_match_expand() {
        let a = repeat_pairs(vec![(7u8, 1), (9u8, 2)]);
        let b = repeat_expand(&[7u8, 9u8], &[1, 2]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }
}

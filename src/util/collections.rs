//! Collection helpers shared by the pipeline stages

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::Hash;

/// Insertion-ordered map with the fast hasher
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Invert a multimap `{k: [v]}` into `{v: [k]}`.
///
/// Keys and values keep their first-seen order.
pub fn invert_multimap<K, V, I, J>(pairs: I) -> FxIndexMap<V, Vec<K>>
where
    K: Clone,
    V: Hash + Eq,
    I: IntoIterator<Item = (K, J)>,
    J: IntoIterator<Item = V>,
{
    let mut out: FxIndexMap<V, Vec<K>> = FxIndexMap::default();
    for (k, vs) in pairs {
        for v in vs {
            out.entry(v).or_default().push(k.clone());
        }
    }
    out
}

/// Group the positions of a label sequence by label: `{label: [index]}`
pub fn invert_seq(labels: &[usize]) -> FxIndexMap<usize, Vec<usize>> {
    invert_multimap(labels.iter().enumerate().map(|(i, &l)| (i, [l])))
}

/// Sort `(key, rating)` pairs by rating, ties broken by ascending key
pub fn sort_v<K: Ord, I: IntoIterator<Item = (K, f64)>>(pairs: I, descending: bool) -> Vec<(K, f64)> {
    let mut v: Vec<(K, f64)> = pairs.into_iter().collect();
    v.sort_by(|a, b| {
        let by_rating = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
        let by_rating = if descending { by_rating.reverse() } else { by_rating };
        by_rating.then_with(|| a.0.cmp(&b.0))
    });
    v
}

/// Split ascending ids into consecutive bands `[bounds[i], bounds[i+1])`;
/// the last band is unbounded above and ids below `bounds[0]` are dropped.
pub fn split_asc(ids: &[usize], bounds: &[usize]) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new(); bounds.len()];
    for &id in ids {
        if let Some(band) = bounds.iter().rposition(|&b| id >= b) {
            out[band].push(id);
        }
    }
    out
}

/// Arcs between sets whose overlap is significantly better than random.
///
/// `A -> B` is kept when `ratio * |A & B| > |A|`, with weight `|A & B| / |A|`.
/// The default ratio is `sqrt(items)`, `items` being the size of the universe
/// the sets are drawn from.
pub fn infer_arcs(sets: &[Vec<usize>], items: usize, ratio: Option<f64>) -> Vec<(usize, usize, f64)> {
    let r = ratio.unwrap_or_else(|| (items as f64).sqrt());
    let hashed: Vec<FxHashSet<usize>> = sets.iter().map(|s| s.iter().copied().collect()).collect();

    let mut arcs = Vec::new();
    for sid in 0..sets.len() {
        let slen = hashed[sid].len() as f64;
        for tid in sid + 1..sets.len() {
            let tlen = hashed[tid].len() as f64;
            let ilen = hashed[sid].intersection(&hashed[tid]).count() as f64;
            if ilen == 0.0 {
                continue;
            }
            if r * ilen > slen {
                arcs.push((sid, tid, ilen / slen));
            }
            if r * ilen > tlen {
                arcs.push((tid, sid, ilen / tlen));
            }
        }
    }
    arcs
}

/// Frequency table, ascending by value
pub fn freq<T: Ord, I: IntoIterator<Item = T>>(values: I) -> BTreeMap<T, usize> {
    let mut out = BTreeMap::new();
    for v in values {
        *out.entry(v).or_insert(0) += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_multimap() {
        let inv = invert_multimap([("d1", vec!["a", "b"]), ("d2", vec!["b"])]);
        assert_eq!(inv.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(inv["b"], vec!["d1", "d2"]);
    }

    #[test]
    fn test_invert_seq() {
        let inv = invert_seq(&[1, 0, 1]);
        assert_eq!(inv[&1], vec![0, 2]);
        assert_eq!(inv[&0], vec![1]);
    }

    #[test]
    fn test_sort_v_ties_by_key() {
        let v = sort_v([("b", 0.5), ("a", 0.5), ("c", 0.9)], true);
        assert_eq!(v, vec![("c", 0.9), ("a", 0.5), ("b", 0.5)]);
    }

    #[test]
    fn test_split_asc() {
        let bands = split_asc(&[0, 3, 5, 6, 9], &[0, 5, 8]);
        assert_eq!(bands, vec![vec![0, 3], vec![5, 6], vec![9]]);
    }

    #[test]
    fn test_infer_arcs_asymmetric() {
        // universe of 16: ratio 4
        let sets = vec![vec![0, 1], vec![1, 2, 3, 4, 5, 6, 7, 8, 9]];
        let arcs = infer_arcs(&sets, 16, None);
        assert_eq!(arcs, vec![(0, 1, 0.5)]);
    }

    #[test]
    fn test_freq() {
        let f = freq([2, 1, 2]);
        assert_eq!(f.into_iter().collect::<Vec<_>>(), vec![(1, 1), (2, 2)]);
    }
}

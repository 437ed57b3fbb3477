//! Community detection algorithms
//!
//! Label propagation and greedy modularity agglomeration (Clauset-Newman-Moore).
//! Both read the view as undirected; pass [`GraphView::undirected_simple`] for
//! graphs with arcs in one direction only.

use super::common::GraphView;
use super::dendrogram::Dendrogram;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

const MAX_PROPAGATION_ROUNDS: usize = 1000;

/// Relabel a membership vector so labels are `0..k` in order of first appearance.
pub fn normalize_membership(labels: &[usize]) -> Vec<usize> {
    let mut seen = HashMap::new();
    labels
        .iter()
        .map(|&l| {
            let next = seen.len();
            *seen.entry(l).or_insert(next)
        })
        .collect()
}

/// Label propagation (Raghavan, Albert, Kumara)
///
/// Every node repeatedly adopts the label most frequent among its neighbours,
/// visiting nodes in random order and breaking ties at random, until every
/// node carries one of its neighbourhood's dominant labels. `initial` seeds the
/// labels; by default each node starts in its own community.
pub fn label_propagation<R: Rng>(view: &GraphView, initial: Option<&[usize]>, rng: &mut R) -> Vec<usize> {
    let n = view.node_count;
    let mut labels: Vec<usize> = match initial {
        Some(init) => init.to_vec(),
        None => (0..n).collect(),
    };
    let mut order: Vec<usize> = (0..n).collect();

    let dominant = |labels: &[usize], u: usize| -> Vec<usize> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &v in view.successors(u).iter().chain(view.predecessors(u)) {
            if v != u {
                *counts.entry(labels[v]).or_insert(0) += 1;
            }
        }
        let best = counts.values().copied().max().unwrap_or(0);
        counts.into_iter().filter(|&(_, c)| c == best && c > 0).map(|(l, _)| l).collect()
    };

    for _ in 0..MAX_PROPAGATION_ROUNDS {
        order.shuffle(rng);
        for &u in &order {
            let cands = dominant(&labels, u);
            if cands.is_empty() || cands.contains(&labels[u]) {
                continue;
            }
            labels[u] = cands[rng.gen_range(0..cands.len())];
        }

        let stable = (0..n).all(|u| {
            let cands = dominant(&labels, u);
            cands.is_empty() || cands.contains(&labels[u])
        });
        if stable {
            break;
        }
    }

    normalize_membership(&labels)
}

/// Greedy modularity agglomeration (Clauset, Newman, Moore)
///
/// Starting from singletons, repeatedly merges the pair of adjacent
/// communities with the largest modularity gain, until no adjacent pair is
/// left. Ties go to the lowest pair of community slots.
pub fn fast_greedy(view: &GraphView) -> Dendrogram {
    let n = view.node_count;
    let edges = view.undirected_edges();
    let m2 = 2.0 * edges.len() as f64;
    if edges.is_empty() {
        return Dendrogram::from_merges(view, Vec::new());
    }

    // e[i][j]: fraction of edge ends joining communities i and j
    let mut e: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    let mut a = vec![0.0f64; n];
    for &(u, v) in &edges {
        *e[u].entry(v).or_insert(0.0) += 1.0 / m2;
        *e[v].entry(u).or_insert(0.0) += 1.0 / m2;
        a[u] += 1.0 / m2;
        a[v] += 1.0 / m2;
    }

    let mut cluster_id: Vec<usize> = (0..n).collect();
    let mut merges = Vec::new();

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..n {
            for (&j, &eij) in e[i].range(i + 1..) {
                let dq = 2.0 * (eij - a[i] * a[j]);
                if best.map_or(true, |(bq, _, _)| dq > bq) {
                    best = Some((dq, i, j));
                }
            }
        }
        let Some((_, i, j)) = best else { break };

        // fold j into i
        let row_j = std::mem::take(&mut e[j]);
        for (k, ejk) in row_j {
            if k == i {
                continue;
            }
            e[k].remove(&j);
            *e[i].entry(k).or_insert(0.0) += ejk;
            *e[k].entry(i).or_insert(0.0) += ejk;
        }
        e[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;

        merges.push((cluster_id[i], cluster_id[j]));
        cluster_id[i] = n + merges.len() - 1;
    }

    Dendrogram::from_merges(view, merges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two triangles joined by the bridge 2-3
    pub(crate) fn two_triangles() -> GraphView {
        GraphView::from_edges(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)], None).undirected_simple()
    }

    #[test]
    fn test_fast_greedy_finds_triangles() {
        let dg = fast_greedy(&two_triangles());
        assert_eq!(dg.len(), 5);
        assert_eq!(dg.optimal_count, 2);
        let mem = dg.cut(2).unwrap();
        assert_eq!(mem[0], mem[1]);
        assert_eq!(mem[1], mem[2]);
        assert_eq!(mem[3], mem[4]);
        assert_eq!(mem[4], mem[5]);
        assert_ne!(mem[0], mem[3]);
    }

    #[test]
    fn test_fast_greedy_disconnected_is_incomplete() {
        let view = GraphView::from_edges(4, &[(0, 1), (2, 3)], None).undirected_simple();
        let dg = fast_greedy(&view);
        assert_eq!(dg.len(), 2);
        assert!(dg.cut(1).is_err());
        assert!(dg.cut(2).is_ok());
    }

    #[test]
    fn test_label_propagation_separates_components() {
        let view = GraphView::from_edges(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)], None).undirected_simple();
        let mut rng = StdRng::seed_from_u64(7);
        let mem = label_propagation(&view, None, &mut rng);
        assert_eq!(mem[0], mem[1]);
        assert_eq!(mem[1], mem[2]);
        assert_eq!(mem[3], mem[4]);
        assert_eq!(mem[4], mem[5]);
        assert_ne!(mem[0], mem[3]);
    }

    #[test]
    fn test_label_propagation_keeps_stable_initial_labels() {
        let view = two_triangles();
        let mut rng = StdRng::seed_from_u64(1);
        let mem = label_propagation(&view, Some(&[5, 5, 5, 9, 9, 9]), &mut rng);
        assert_eq!(mem, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_normalize_membership() {
        assert_eq!(normalize_membership(&[7, 3, 7, 1]), vec![0, 1, 0, 2]);
    }
}

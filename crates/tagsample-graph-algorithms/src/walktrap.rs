//! Walktrap community detection (Pons, Latapy)
//!
//! Communities are compared through the distributions of short random walks
//! started inside them. Adjacent communities are merged greedily, always the
//! pair whose merge least increases the mean squared walk distance.

use super::common::GraphView;
use super::dendrogram::Dendrogram;
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};

/// Default random walk length
pub const DEFAULT_STEPS: usize = 4;

struct Community {
    size: usize,
    prob: Array1<f64>,
    neighbors: BTreeSet<usize>,
    id: usize,
}

/// Distribution of a `steps`-long walk from `start`, every node carrying a self-loop.
fn walk_from(view: &GraphView, degree: &Array1<f64>, start: usize, steps: usize) -> Array1<f64> {
    let n = view.node_count;
    let mut p = Array1::<f64>::zeros(n);
    p[start] = 1.0;
    for _ in 0..steps {
        let mut next = Array1::<f64>::zeros(n);
        for u in 0..n {
            if p[u] == 0.0 {
                continue;
            }
            let share = p[u] / degree[u];
            next[u] += share;
            for &v in view.successors(u) {
                next[v] += share;
            }
        }
        p = next;
    }
    p
}

fn delta_sigma(a: &Community, b: &Community, degree: &Array1<f64>, n: usize) -> f64 {
    let diff = &a.prob - &b.prob;
    let dist: f64 = (&diff * &diff / degree).sum();
    let (sa, sb) = (a.size as f64, b.size as f64);
    sa * sb / (sa + sb) * dist / n as f64
}

/// Walktrap hierarchical clustering on an undirected simple view.
///
/// Pass a view without isolated nodes; an isolated node never merges.
pub fn walktrap(view: &GraphView, steps: usize) -> Dendrogram {
    let n = view.node_count;
    let degree: Array1<f64> = (0..n).map(|u| view.out_degree(u) as f64 + 1.0).collect();

    let mut comms: Vec<Option<Community>> = (0..n)
        .map(|u| {
            Some(Community {
                size: 1,
                prob: walk_from(view, &degree, u, steps),
                neighbors: view.successors(u).iter().copied().filter(|&v| v != u).collect(),
                id: u,
            })
        })
        .collect();

    let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for u in 0..n {
        for &v in view.successors(u) {
            if u < v {
                if let (Some(a), Some(b)) = (&comms[u], &comms[v]) {
                    pairs.insert((u, v), delta_sigma(a, b, &degree, n));
                }
            }
        }
    }

    let mut merges = Vec::new();
    loop {
        let best = pairs
            .iter()
            .fold(None::<((usize, usize), f64)>, |best, (&key, &ds)| match best {
                Some((_, b)) if b <= ds => best,
                _ => Some((key, ds)),
            });
        let Some(((i, j), _)) = best else { break };

        let (Some(a), Some(b)) = (comms[i].take(), comms[j].take()) else { break };
        let size = a.size + b.size;
        let prob = (&a.prob * a.size as f64 + &b.prob * b.size as f64) / size as f64;
        let mut neighbors: BTreeSet<usize> = a.neighbors.union(&b.neighbors).copied().collect();
        neighbors.remove(&i);
        neighbors.remove(&j);

        merges.push((a.id, b.id));
        let merged = Community { size, prob, neighbors, id: n + merges.len() - 1 };

        pairs.retain(|&(x, y), _| x != i && x != j && y != i && y != j);
        for &k in &merged.neighbors {
            if let Some(c) = comms[k].as_mut() {
                c.neighbors.remove(&j);
                c.neighbors.insert(i);
            }
        }
        for &k in &merged.neighbors {
            if let Some(c) = &comms[k] {
                pairs.insert((i.min(k), i.max(k)), delta_sigma(&merged, c, &degree, n));
            }
        }
        comms[i] = Some(merged);
    }

    Dendrogram::from_merges(view, merges)
}

//! Merge dendrograms produced by hierarchical community detection
//!
//! Leaves are the nodes `0..n`; merge `i` creates cluster `n + i` from the two
//! clusters it names. Disconnected graphs produce incomplete dendrograms, which
//! cannot be cut into fewer clusters than they have roots.

use super::common::GraphView;
use std::fmt;

/// Error raised by [`Dendrogram::cut`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DendrogramError {
    InvalidCut { clusters: usize, nodes: usize, merges: usize },
}

impl fmt::Display for DendrogramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DendrogramError::InvalidCut { clusters, nodes, merges } => write!(
                f,
                "cannot cut dendrogram of {} nodes and {} merges into {} clusters",
                nodes, merges, clusters
            ),
        }
    }
}

impl std::error::Error for DendrogramError {}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    pub node_count: usize,
    pub merges: Vec<(usize, usize)>,
    /// Cluster count with the best modularity along the merge sequence
    pub optimal_count: usize,
}

struct Clusters {
    parent: Vec<usize>,
}

impl Clusters {
    fn new(size: usize) -> Self {
        Clusters { parent: (0..size).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            self.parent[i] = self.find(self.parent[i]); // Path compression
        }
        self.parent[i]
    }
}

impl Dendrogram {
    /// Build a dendrogram and pick its default cut by modularity on `view`.
    pub fn from_merges(view: &GraphView, merges: Vec<(usize, usize)>) -> Self {
        let mut dg = Dendrogram { node_count: view.node_count, merges, optimal_count: view.node_count };
        dg.optimal_count = dg.best_count(view);
        dg
    }

    /// Number of merges
    pub fn len(&self) -> usize {
        self.merges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merges.is_empty()
    }

    /// Fewest clusters this dendrogram can be cut into
    pub fn min_clusters(&self) -> usize {
        self.node_count - self.merges.len()
    }

    /// Membership vector after applying the first `n - clusters` merges.
    ///
    /// Cluster labels are numbered by first appearance.
    pub fn cut(&self, clusters: usize) -> Result<Vec<usize>, DendrogramError> {
        let n = self.node_count;
        if clusters == 0 || clusters > n || n - clusters > self.merges.len() {
            return Err(DendrogramError::InvalidCut { clusters, nodes: n, merges: self.merges.len() });
        }
        Ok(self.membership_after(n - clusters))
    }

    fn membership_after(&self, steps: usize) -> Vec<usize> {
        let n = self.node_count;
        let mut uf = Clusters::new(n + steps);
        for (i, &(a, b)) in self.merges.iter().take(steps).enumerate() {
            let ra = uf.find(a);
            let rb = uf.find(b);
            uf.parent[ra] = n + i;
            uf.parent[rb] = n + i;
        }

        let mut labels = std::collections::HashMap::new();
        (0..n)
            .map(|i| {
                let root = uf.find(i);
                let next = labels.len();
                *labels.entry(root).or_insert(next)
            })
            .collect()
    }

    fn best_count(&self, view: &GraphView) -> usize {
        let n = self.node_count;
        let mut best = (f64::NEG_INFINITY, n);
        for steps in 0..=self.merges.len() {
            let q = modularity(view, &self.membership_after(steps));
            // strict: on ties prefer more clusters
            if q > best.0 + 1e-12 {
                best = (q, n - steps);
            }
        }
        best.1
    }
}

/// Newman modularity of `membership` over the undirected, unweighted reading of `view`.
pub fn modularity(view: &GraphView, membership: &[usize]) -> f64 {
    let clusters = membership.iter().copied().max().map_or(0, |m| m + 1);
    let mut inside = vec![0.0f64; clusters];
    let mut degree = vec![0.0f64; clusters];
    let mut m2 = 0.0f64;

    for u in 0..view.node_count {
        for &v in view.successors(u) {
            m2 += 1.0;
            degree[membership[u]] += 1.0;
            if membership[u] == membership[v] {
                inside[membership[u]] += 1.0;
            }
        }
    }
    if m2 == 0.0 {
        return 0.0;
    }

    (0..clusters).map(|c| inside[c] / m2 - (degree[c] / m2).powi(2)).sum()
}

//! Shared utilities for graph algorithms
//!
//! Provides a read-only, optimized view of the graph topology for algorithm execution.

use std::collections::{HashMap, HashSet};

/// Node Identifier type: the vertex index in the graph the view was built from
pub type NodeId = usize;

/// A dense, integer-indexed view of the graph topology using Compressed Sparse Row (CSR) format.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,

    /// Outgoing edges CSR structure
    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Contiguous array of target node indices
    pub out_targets: Vec<usize>,

    /// Incoming edges CSR structure (Compressed Sparse Column effectively)
    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Contiguous array of source node indices
    pub in_sources: Vec<usize>,

    /// Edge weights: aligned with `out_targets`
    pub weights: Option<Vec<f64>>,
    /// Incoming edge weights: aligned with `in_sources`
    pub in_weights: Option<Vec<f64>>,
}

impl GraphView {
    /// Get the out-degree of a node (by index)
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get the in-degree of a node (by index)
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Get outgoing neighbors (successors) of a node
    pub fn successors(&self, idx: usize) -> &[usize] {
        let start = self.out_offsets[idx];
        let end = self.out_offsets[idx + 1];
        &self.out_targets[start..end]
    }

    /// Get incoming neighbors (predecessors) of a node
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        let start = self.in_offsets[idx];
        let end = self.in_offsets[idx + 1];
        &self.in_sources[start..end]
    }

    /// Get weights for outgoing edges of a node
    pub fn weights(&self, idx: usize) -> Option<&[f64]> {
        self.weights.as_ref().map(|w| {
            let start = self.out_offsets[idx];
            let end = self.out_offsets[idx + 1];
            &w[start..end]
        })
    }

    /// Get weights for incoming edges of a node
    pub fn in_weights(&self, idx: usize) -> Option<&[f64]> {
        self.in_weights.as_ref().map(|w| {
            let start = self.in_offsets[idx];
            let end = self.in_offsets[idx + 1];
            &w[start..end]
        })
    }

    /// Total number of arcs
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Build a view over nodes `0..node_count` from an arc list.
    ///
    /// Arcs keep their input order within each source row.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)], weights: Option<&[f64]>) -> Self {
        let mut outgoing = vec![Vec::new(); node_count];
        let mut incoming = vec![Vec::new(); node_count];
        let mut out_w = weights.map(|_| vec![Vec::new(); node_count]);
        let mut in_w = weights.map(|_| vec![Vec::new(); node_count]);

        for (i, &(s, t)) in edges.iter().enumerate() {
            outgoing[s].push(t);
            incoming[t].push(s);
            if let (Some(w), Some(ow), Some(iw)) = (weights, out_w.as_mut(), in_w.as_mut()) {
                ow[s].push(w[i]);
                iw[t].push(w[i]);
            }
        }

        let index_to_node: Vec<NodeId> = (0..node_count).collect();
        let node_to_index = index_to_node.iter().map(|&n| (n, n)).collect();
        let mut view = Self::from_adjacency_list(node_count, index_to_node, node_to_index, outgoing, incoming, out_w);
        view.in_weights = in_w.map(|rows| rows.into_iter().flatten().collect());
        view
    }

    /// Helper to create GraphView from adjacency lists (legacy/test support)
    pub fn from_adjacency_list(
        node_count: usize,
        index_to_node: Vec<NodeId>,
        node_to_index: HashMap<NodeId, usize>,
        outgoing: Vec<Vec<usize>>,
        incoming: Vec<Vec<usize>>,
        weights: Option<Vec<Vec<f64>>>,
    ) -> Self {
        let mut out_offsets = Vec::with_capacity(node_count + 1);
        let mut out_targets = Vec::new();
        let mut in_offsets = Vec::with_capacity(node_count + 1);
        let mut in_sources = Vec::new();
        let mut flat_weights = if weights.is_some() { Some(Vec::new()) } else { None };

        out_offsets.push(0);
        for (i, neighbors) in outgoing.into_iter().enumerate() {
            out_targets.extend(neighbors);
            out_offsets.push(out_targets.len());

            if let Some(ref mut w_flat) = flat_weights {
                if let Some(w_row) = weights.as_ref().map(|w| &w[i]) {
                    w_flat.extend(w_row.iter());
                }
            }
        }

        in_offsets.push(0);
        for sources in incoming {
            in_sources.extend(sources);
            in_offsets.push(in_sources.len());
        }

        GraphView {
            node_count,
            index_to_node,
            node_to_index,
            out_offsets,
            out_targets,
            in_offsets,
            in_sources,
            weights: flat_weights,
            in_weights: None,
        }
    }

    /// Undirected projection without self-loops or parallel arcs.
    ///
    /// Every undirected edge appears in both endpoint rows, neighbours sorted.
    /// Weights are dropped.
    pub fn undirected_simple(&self) -> GraphView {
        let n = self.node_count;
        let mut adj: Vec<HashSet<usize>> = vec![HashSet::new(); n];
        for u in 0..n {
            for &v in self.successors(u) {
                if u != v {
                    adj[u].insert(v);
                    adj[v].insert(u);
                }
            }
        }
        let rows: Vec<Vec<usize>> = adj
            .into_iter()
            .map(|s| {
                let mut row: Vec<usize> = s.into_iter().collect();
                row.sort_unstable();
                row
            })
            .collect();
        GraphView::from_adjacency_list(
            n,
            self.index_to_node.clone(),
            self.node_to_index.clone(),
            rows.clone(),
            rows,
            None,
        )
    }

    /// Each undirected edge once, as `(u, v)` with `u < v`.
    ///
    /// Only meaningful on a symmetric view such as [`GraphView::undirected_simple`].
    pub fn undirected_edges(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for u in 0..self.node_count {
            for &v in self.successors(u) {
                if u < v {
                    out.push((u, v));
                }
            }
        }
        out
    }

    /// Sub-view without zero-degree nodes.
    ///
    /// `index_to_node` of the result still refers to the NodeIds of `self`.
    pub fn without_isolated(&self) -> GraphView {
        let keep: Vec<usize> = (0..self.node_count)
            .filter(|&i| self.out_degree(i) + self.in_degree(i) > 0)
            .collect();
        let mut remap = vec![usize::MAX; self.node_count];
        for (new, &old) in keep.iter().enumerate() {
            remap[old] = new;
        }

        let mut outgoing = vec![Vec::new(); keep.len()];
        let mut incoming = vec![Vec::new(); keep.len()];
        for (new, &old) in keep.iter().enumerate() {
            outgoing[new] = self.successors(old).iter().map(|&t| remap[t]).collect();
            incoming[new] = self.predecessors(old).iter().map(|&s| remap[s]).collect();
        }

        let index_to_node: Vec<NodeId> = keep.iter().map(|&i| self.index_to_node[i]).collect();
        let node_to_index = index_to_node.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        GraphView::from_adjacency_list(keep.len(), index_to_node, node_to_index, outgoing, incoming, None)
    }
}

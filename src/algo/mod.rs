//! Graph algorithms module
//!
//! Algorithms are implemented in the `tagsample-graph-algorithms` crate.
//! This module provides the integration/adapter layer between attributed
//! graphs and the algorithm views, plus the community ensemble.

pub mod community;

use crate::graph::AttrGraph;
use tagsample_graph_algorithms::GraphView;

// Re-export algorithms
pub use tagsample_graph_algorithms::{
    dijkstra_distances, edge_betweenness_clustering, fast_greedy, label_propagation, shortest_path_tree, walktrap,
    Dendrogram, DendrogramError, Direction, ShortestPathTree,
};

pub use community::select_communities;

/// Undirected view without loops or parallel arcs, for community detection
pub fn undirected_view(g: &AttrGraph) -> GraphView {
    g.view().undirected_simple()
}

/// View whose edge weights are the additive distances `-ln(w)` of the arc
/// probabilities, floored at 0. Arcs of weight 0 become unreachable.
pub fn distance_view(g: &AttrGraph) -> GraphView {
    g.view_with(|e| if e.weight > 0.0 { (-e.weight.ln()).max(0.0) } else { f64::INFINITY })
}

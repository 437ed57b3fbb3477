pub mod common;
pub mod pathfinding;
pub mod dendrogram;
pub mod community;
pub mod betweenness;
pub mod walktrap;

pub use common::{GraphView, NodeId};
pub use pathfinding::{dijkstra_distances, shortest_path_tree, Direction, ShortestPathTree};
pub use dendrogram::{modularity, Dendrogram, DendrogramError};
pub use community::{fast_greedy, label_propagation, normalize_membership};
pub use betweenness::edge_betweenness_clustering;
pub use walktrap::{walktrap, DEFAULT_STEPS as WALKTRAP_STEPS};

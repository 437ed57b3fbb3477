//! Attributed graph model
//!
//! This module implements the graphs every pipeline stage produces:
//! - Vertices addressed by dense index, with string ids and relevance attributes
//! - Directed weighted arcs, multiple arcs between the same vertices allowed
//! - A one-shot node sample builder for bipartite and general graphs
//! - Compressed node-link files for persistence

pub mod io;
pub mod sample;
pub mod store;
pub mod types;

// Re-export main types
pub use io::{load_json, read_graph, read_json_gz, save_json, write_graph, write_json_gz, GRAPH_EXT};
pub use sample::{BuildOptions, DanglingAttr, Node, NodeSample};
pub use store::{AttrGraph, GraphError, GraphResult};
pub use types::{DegreeMode, Edge, Vertex, VertexId};

//! tagsample
//!
//! Builds a data sample for evaluating tag-based addressing schemes from
//! scraped producer, document and tag data.
//!
//! # Architecture
//!
//! - [`graph`]: attributed graphs, the node sample builder and graph files
//! - [`store`]: the key-value stores every stage reads and writes
//! - [`producer`]: a producer's doc-tag graph, scores and representatives
//! - [`algo`]: path finding and the community ensemble over producer graphs
//! - [`sample`]: generation, materialization and evaluation of the sample
//! - [`eval`]: the resumable rounds over a base directory
//!
//! ## Example Usage
//!
//! ```rust
//! use tagsample::config::ConvergeConfig;
//! use tagsample::producer::{Producer, ProducerState};
//! use tagsample::store::MemoryStore;
//!
//! let dtdb: MemoryStore<Vec<String>> = [
//!     ("d1", vec!["t1".to_string(), "t2".to_string()]),
//!     ("d2", vec!["t2".to_string(), "t3".to_string()]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let mut prod = Producer::new("A");
//! prod.init_content(["d1", "d2"], &dtdb).unwrap();
//! prod.infer_scores(&ConvergeConfig::default()).unwrap();
//! assert_eq!(prod.state(), ProducerState::Scores);
//! assert_eq!(prod.trange().len(), 3);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod config;
pub mod eval;
pub mod graph;
pub mod producer;
pub mod sample;
pub mod store;
pub mod util;

// Re-export main types for convenience
pub use graph::{AttrGraph, BuildOptions, GraphError, GraphResult, Node, NodeSample, Vertex, VertexId};

pub use producer::{Producer, ProducerError, ProducerResult, ProducerState, StateError};

pub use sample::{SampleError, SampleGenerator, SampleResult, SampleStats, SampleWriter};

pub use store::{KvStore, MemoryStore, StoreError, StoreResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

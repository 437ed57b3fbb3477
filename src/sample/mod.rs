//! Sample generation, materialization and evaluation
//!
//! - [`SampleGenerator`] builds producers, their relations, the producer
//!   graph, communities, tgraphs and the routing tables
//! - [`SampleWriter`] writes per-producer graphs and splits them into buckets
//! - [`SampleStats`] computes closeness and address-scheme metrics
//! - [`invert_store`] derives the inverse lookup stores

pub mod generator;
pub mod invert;
pub mod stats;
pub mod taginfo;
pub mod writer;

pub use generator::{ProducerDbs, SampleGenerator, SourceDbs};
pub use invert::invert_store;
pub use stats::{Closeness, ReportOptions, SampleStats, WorldDbs};
pub use taginfo::{AddrSchemeEval, IdInfo, QueryReport, RankBy, StepResult, TagInfo};
pub use writer::SampleWriter;

use crate::graph::GraphError;
use crate::producer::ProducerError;
use crate::store::{KvStore, StoreError};
use crate::util::ExecError;
use thiserror::Error;

/// Owned, type-erased store handle
pub type DynStore<V> = Box<dyn KvStore<V>>;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{0} not generated yet")]
    MissingStage(&'static str),

    #[error("unknown identity: {0}")]
    UnknownId(String),

    #[error("address scheme has no scored vertices")]
    EmptyScheme,

    #[error("not a directory: {}", .0.display())]
    NotADirectory(std::path::PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SampleResult<T> = Result<T, SampleError>;

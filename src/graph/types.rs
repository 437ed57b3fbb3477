//! Core type definitions for attributed graphs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense vertex index within one graph
pub type VertexId = usize;

/// Vertex of an attributed graph
///
/// `naa` and `nat` are the two relevance attributes every generated graph
/// carries: relevance with respect to the owning entity, and with respect to
/// the whole world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub label: Option<String>,
    /// Node attribute, "absolute" (relative to the owner)
    pub naa: Option<f64>,
    /// Node attribute, "total" (relative to the world)
    pub nat: Option<f64>,
}

impl Vertex {
    pub fn new(id: impl Into<String>) -> Self {
        Vertex { id: id.into(), label: None, naa: None, nat: None }
    }

    pub fn with_naa(mut self, naa: Option<f64>) -> Self {
        self.naa = naa;
        self
    }

    pub fn with_nat(mut self, nat: Option<f64>) -> Self {
        self.nat = nat;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vertex({})", self.id)
    }
}

/// Directed weighted arc
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub weight: f64,
}

/// Which arcs count towards a vertex degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegreeMode {
    Out,
    In,
    All,
}

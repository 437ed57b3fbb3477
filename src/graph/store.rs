//! In-memory attributed graph storage
//!
//! Vertices live in an arena addressed by dense index; arcs keep their
//! insertion order. Vertex ids are looked up through a hash index that is
//! rebuilt whenever a graph is deserialized.

use super::types::{DegreeMode, Edge, Vertex, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use tagsample_graph_algorithms::GraphView;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Sample already built")]
    AlreadyBuilt,

    #[error("Arc between explicit nodes in a bipartite sample: {0} -> {1}")]
    NotBipartite(String, String),

    #[error("Vertex {0} out of range ({1} vertices)")]
    VertexOutOfRange(VertexId, usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Directed weighted graph with per-vertex relevance attributes and integer
/// graph attributes (range bases such as `base_t`, `base_h`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphRecord", into = "GraphRecord")]
pub struct AttrGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    attrs: BTreeMap<String, i64>,

    /// Outgoing arc indices for each vertex
    outgoing: Vec<Vec<usize>>,
    /// Incoming arc indices for each vertex
    incoming: Vec<Vec<usize>>,
    /// Vertex id -> indices carrying that id, ascending
    index: HashMap<String, Vec<VertexId>>,
}

/// Node-link record, the persisted form of an [`AttrGraph`]
#[derive(Serialize, Deserialize)]
struct GraphRecord {
    directed: bool,
    attrs: BTreeMap<String, i64>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl From<GraphRecord> for AttrGraph {
    fn from(rec: GraphRecord) -> Self {
        let mut g = AttrGraph::from_vertices(rec.vertices);
        g.attrs = rec.attrs;
        let n = g.vertices.len();
        for e in rec.edges {
            // arcs to unknown vertices cannot come from a graph we wrote
            if e.source < n && e.target < n {
                g.push_edge(e);
            }
        }
        g
    }
}

impl From<AttrGraph> for GraphRecord {
    fn from(g: AttrGraph) -> Self {
        GraphRecord { directed: true, attrs: g.attrs, vertices: g.vertices, edges: g.edges }
    }
}

impl AttrGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph holding the given vertices and no arcs
    pub fn from_vertices(vertices: impl IntoIterator<Item = Vertex>) -> Self {
        let mut g = AttrGraph::new();
        for v in vertices {
            g.add_vertex(v);
        }
        g
    }

    /// Append a vertex, returning its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        let vid = self.vertices.len();
        self.index.entry(vertex.id.clone()).or_default().push(vid);
        self.vertices.push(vertex);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        vid
    }

    /// Append an arc, returning its index
    pub fn add_edge(&mut self, source: VertexId, target: VertexId, weight: f64) -> GraphResult<usize> {
        let n = self.vertices.len();
        for vid in [source, target] {
            if vid >= n {
                return Err(GraphError::VertexOutOfRange(vid, n));
            }
        }
        Ok(self.push_edge(Edge { source, target, weight }))
    }

    fn push_edge(&mut self, edge: Edge) -> usize {
        let eid = self.edges.len();
        self.outgoing[edge.source].push(eid);
        self.incoming[edge.target].push(eid);
        self.edges.push(edge);
        eid
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex(&self, vid: VertexId) -> Option<&Vertex> {
        self.vertices.get(vid)
    }

    pub fn vertex_mut(&mut self, vid: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(vid)
    }

    /// Get a vertex, failing if the index is out of range
    pub fn try_vertex(&self, vid: VertexId) -> GraphResult<&Vertex> {
        self.vertices.get(vid).ok_or(GraphError::VertexOutOfRange(vid, self.vertices.len()))
    }

    pub fn edge_mut(&mut self, eid: usize) -> Option<&mut Edge> {
        self.edges.get_mut(eid)
    }

    /// Outgoing arcs of a vertex, in insertion order
    pub fn out_edges(&self, vid: VertexId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing.get(vid).into_iter().flatten().map(move |&eid| &self.edges[eid])
    }

    /// Incoming arcs of a vertex, in insertion order
    pub fn in_edges(&self, vid: VertexId) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming.get(vid).into_iter().flatten().map(move |&eid| &self.edges[eid])
    }

    pub fn successors(&self, vid: VertexId) -> Vec<VertexId> {
        self.out_edges(vid).map(|e| e.target).collect()
    }

    pub fn predecessors(&self, vid: VertexId) -> Vec<VertexId> {
        self.in_edges(vid).map(|e| e.source).collect()
    }

    pub fn degree(&self, vid: VertexId, mode: DegreeMode) -> usize {
        let out = self.outgoing.get(vid).map_or(0, Vec::len);
        let inc = self.incoming.get(vid).map_or(0, Vec::len);
        match mode {
            DegreeMode::Out => out,
            DegreeMode::In => inc,
            DegreeMode::All => out + inc,
        }
    }

    /// Index of the first arc `source -> target`
    pub fn find_edge(&self, source: VertexId, target: VertexId) -> Option<usize> {
        self.outgoing.get(source)?.iter().copied().find(|&eid| self.edges[eid].target == target)
    }

    /// Lowest index of a vertex with the given id
    pub fn find(&self, id: &str) -> Option<VertexId> {
        self.index.get(id).and_then(|vids| vids.first().copied())
    }

    /// Lowest index within `range` of a vertex with the given id
    pub fn find_in(&self, id: &str, range: Range<VertexId>) -> Option<VertexId> {
        self.index.get(id)?.iter().copied().find(|vid| range.contains(vid))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn attr(&self, name: &str) -> Option<i64> {
        self.attrs.get(name).copied()
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: i64) {
        self.attrs.insert(name.into(), value);
    }

    pub fn attrs(&self) -> &BTreeMap<String, i64> {
        &self.attrs
    }

    /// Range base stored as a graph attribute, as a vertex index
    pub fn base(&self, name: &str) -> Option<VertexId> {
        self.attr(name).and_then(|b| usize::try_from(b).ok())
    }

    /// Copy of the graph keeping only the vertices accepted by `keep`,
    /// together with the arcs between them. Graph attributes are dropped.
    pub fn retain_vertices(&self, keep: impl Fn(&Vertex) -> bool) -> AttrGraph {
        let mut remap = vec![None; self.vertices.len()];
        let mut g = AttrGraph::new();
        for (vid, v) in self.vertices.iter().enumerate() {
            if keep(v) {
                remap[vid] = Some(g.add_vertex(v.clone()));
            }
        }
        for e in &self.edges {
            if let (Some(s), Some(t)) = (remap[e.source], remap[e.target]) {
                g.push_edge(Edge { source: s, target: t, weight: e.weight });
            }
        }
        g
    }

    /// Algorithm view with the arc weights as edge weights
    pub fn view(&self) -> GraphView {
        self.view_with(|e| e.weight)
    }

    /// Algorithm view with edge weights computed from each arc
    pub fn view_with(&self, weight: impl Fn(&Edge) -> f64) -> GraphView {
        let pairs: Vec<(usize, usize)> = self.edges.iter().map(|e| (e.source, e.target)).collect();
        let weights: Vec<f64> = self.edges.iter().map(weight).collect();
        GraphView::from_edges(self.vertices.len(), &pairs, Some(&weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> AttrGraph {
        let mut g = AttrGraph::from_vertices(["a", "b", "c"].into_iter().map(Vertex::new));
        g.add_edge(0, 1, 0.5).unwrap();
        g.add_edge(1, 2, 0.25).unwrap();
        g.add_edge(2, 0, 1.0).unwrap();
        g
    }

    #[test]
    fn test_add_and_traverse() {
        let g = triangle();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.successors(0), vec![1]);
        assert_eq!(g.predecessors(0), vec![2]);
        assert_eq!(g.degree(1, DegreeMode::All), 2);
        assert_eq!(g.find("c"), Some(2));
        assert_eq!(g.find_edge(1, 2), Some(1));
        assert_eq!(g.find_edge(2, 1), None);
    }

    #[test]
    fn test_edge_out_of_range() {
        let mut g = triangle();
        assert!(matches!(g.add_edge(0, 3, 1.0), Err(GraphError::VertexOutOfRange(3, 3))));
    }

    #[test]
    fn test_duplicate_ids_resolved_by_range() {
        let mut g = AttrGraph::from_vertices(["x", "x"].into_iter().map(Vertex::new));
        g.add_vertex(Vertex::new("y"));
        assert_eq!(g.find("x"), Some(0));
        assert_eq!(g.find_in("x", 1..3), Some(1));
        assert_eq!(g.find_in("y", 0..2), None);
    }

    #[test]
    fn test_retain_vertices() {
        let mut g = triangle();
        g.vertex_mut(1).unwrap().naa = Some(0.5);
        let kept = g.retain_vertices(|v| v.naa.is_none());
        assert_eq!(kept.vertex_count(), 2);
        assert_eq!(kept.edge_count(), 1);
        assert_eq!(kept.vertex(kept.edges()[0].source).unwrap().id, "c");
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let mut g = triangle();
        g.set_attr("base_t", 2);
        let json = serde_json::to_string(&g).unwrap();
        let back: AttrGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.find("b"), Some(1));
        assert_eq!(back.base("base_t"), Some(2));
    }

    #[test]
    fn test_view_weights() {
        let view = triangle().view_with(|e| -e.weight.ln());
        assert_eq!(view.successors(0), &[1]);
        assert!((view.weights(0).unwrap()[0] - 2f64.ln()).abs() < 1e-12);
    }
}

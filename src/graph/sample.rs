//! Staging area for building graphs from node adjacency maps
//!
//! A [`NodeSample`] collects [`Node`]s and materializes them once into an
//! [`AttrGraph`]. Explicit nodes take the first indices in insertion order;
//! neighbours that were never added as nodes ("dangling" nodes) follow.

use super::store::{AttrGraph, GraphError, GraphResult};
use super::types::Vertex;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// A labelled vertex with weighted out-arcs, immutable once constructed
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: String,
    out: IndexMap<String, f64>,
    attr: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, out: impl IntoIterator<Item = (String, f64)>, attr: Option<f64>) -> Self {
        Node { id: id.into(), out: out.into_iter().collect(), attr }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn out(&self) -> &IndexMap<String, f64> {
        &self.out
    }

    pub fn attr(&self) -> Option<f64> {
        self.attr
    }
}

/// Attribute given to dangling vertices
#[derive(Default)]
pub enum DanglingAttr {
    #[default]
    None,
    Const(f64),
    Map(HashMap<String, f64>),
    Func(Box<dyn Fn(&str) -> Option<f64> + Send + Sync>),
}

impl DanglingAttr {
    fn get(&self, id: &str) -> Option<f64> {
        match self {
            DanglingAttr::None => None,
            DanglingAttr::Const(v) => Some(*v),
            DanglingAttr::Map(m) => m.get(id).copied(),
            DanglingAttr::Func(f) => f(id),
        }
    }
}

impl fmt::Debug for DanglingAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DanglingAttr::None => write!(f, "None"),
            DanglingAttr::Const(v) => write!(f, "Const({})", v),
            DanglingAttr::Map(m) => write!(f, "Map({} entries)", m.len()),
            DanglingAttr::Func(_) => write!(f, "Func"),
        }
    }
}

/// Options for [`NodeSample::build`]
#[derive(Debug)]
pub struct BuildOptions {
    /// Keep neighbours that are not explicit nodes, as extra vertices
    pub keep_dangle: bool,
    /// Reject arcs between two explicit nodes
    pub bipartite: bool,
    /// Attribute of the dangling vertices
    pub node_attr: DanglingAttr,
    /// Store every arc reversed
    pub inverse: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { keep_dangle: true, bipartite: false, node_attr: DanglingAttr::None, inverse: false }
    }
}

impl BuildOptions {
    /// Drop arcs to neighbours that are not explicit nodes
    pub fn incomplete() -> Self {
        BuildOptions { keep_dangle: false, ..Self::default() }
    }
}

#[derive(Debug, Default)]
pub struct NodeSample {
    nodes: IndexMap<String, Node>,
    built: Option<AttrGraph>,
    order: usize,
    extra: usize,
}

impl NodeSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; fails on a duplicate id or after [`NodeSample::build`]
    pub fn add_node(&mut self, node: Node) -> GraphResult<()> {
        if self.built.is_some() {
            return Err(GraphError::AlreadyBuilt);
        }
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateId(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of an explicit node, which is also its vertex index once built
    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Number of explicit vertices in the built graph
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of dangling vertices in the built graph
    pub fn extra(&self) -> usize {
        self.extra
    }

    /// Materialize the graph.
    ///
    /// Only the first call builds; later calls return the same graph and
    /// ignore `opts`.
    pub fn build(&mut self, opts: &BuildOptions) -> GraphResult<&AttrGraph> {
        if self.built.is_none() {
            let g = self.materialize(opts)?;
            self.order = self.nodes.len();
            self.extra = g.vertex_count() - self.order;
            self.built = Some(g);
        }
        Ok(self.built.get_or_insert_with(AttrGraph::new))
    }

    fn materialize(&self, opts: &BuildOptions) -> GraphResult<AttrGraph> {
        let mut g = AttrGraph::from_vertices(
            self.nodes.values().map(|n| Vertex::new(n.id.clone()).with_nat(n.attr)),
        );

        let mut dangling: IndexMap<&str, usize> = IndexMap::new();
        let mut arcs = Vec::new();
        for (sid, node) in self.nodes.values().enumerate() {
            for (nbr, &w) in &node.out {
                let tid = match self.nodes.get_index_of(nbr.as_str()) {
                    Some(tid) => {
                        if opts.bipartite {
                            return Err(GraphError::NotBipartite(node.id.clone(), nbr.clone()));
                        }
                        tid
                    }
                    None if opts.keep_dangle => {
                        let next = self.nodes.len() + dangling.len();
                        *dangling.entry(nbr.as_str()).or_insert(next)
                    }
                    None => continue,
                };
                arcs.push(if opts.inverse { (tid, sid, w) } else { (sid, tid, w) });
            }
        }

        for &id in dangling.keys() {
            g.add_vertex(Vertex::new(id).with_nat(opts.node_attr.get(id)));
        }
        for (s, t, w) in arcs {
            g.add_edge(s, t, w)?;
        }
        Ok(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, tags: &[&str]) -> Node {
        let w = (tags.len() as f64).powf(-0.5);
        Node::new(id, tags.iter().map(|t| (t.to_string(), w)), None)
    }

    #[test]
    fn test_duplicate_id() {
        let mut ss = NodeSample::new();
        ss.add_node(doc("d1", &["t1"])).unwrap();
        assert!(matches!(ss.add_node(doc("d1", &["t2"])), Err(GraphError::DuplicateId(_))));
    }

    #[test]
    fn test_build_dangling_and_inverse() {
        let mut ss = NodeSample::new();
        ss.add_node(doc("d1", &["t1", "t2"])).unwrap();
        ss.add_node(doc("d2", &["t2", "t3"])).unwrap();
        let opts = BuildOptions { bipartite: true, inverse: true, node_attr: DanglingAttr::Const(0.5), ..Default::default() };
        let g = ss.build(&opts).unwrap();

        let ids: Vec<&str> = g.vertices().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "t1", "t2", "t3"]);
        assert_eq!(g.vertex(3).unwrap().nat, Some(0.5));
        // t2 -> d1, t2 -> d2
        assert_eq!(g.successors(3), vec![0, 1]);
        assert!(g.successors(0).is_empty());
        assert_eq!(ss.order(), 2);
        assert_eq!(ss.extra(), 3);
    }

    #[test]
    fn test_build_is_final() {
        let mut ss = NodeSample::new();
        ss.add_node(doc("a", &["b"])).unwrap();
        let first = ss.build(&BuildOptions::default()).unwrap().clone();
        let second = ss.build(&BuildOptions::incomplete()).unwrap().clone();
        assert_eq!(first, second);
        assert!(matches!(ss.add_node(doc("c", &[])), Err(GraphError::AlreadyBuilt)));
    }

    #[test]
    fn test_bipartite_violation() {
        let mut ss = NodeSample::new();
        ss.add_node(doc("a", &["b"])).unwrap();
        ss.add_node(doc("b", &[])).unwrap();
        let opts = BuildOptions { bipartite: true, ..Default::default() };
        assert!(matches!(ss.build(&opts), Err(GraphError::NotBipartite(_, _))));
        assert!(!ss.is_built());
    }

    #[test]
    fn test_incomplete_drops_dangling() {
        let mut ss = NodeSample::new();
        ss.add_node(Node::new("a", [("b".to_string(), 0.5), ("z".to_string(), 0.1)], Some(0.2))).unwrap();
        ss.add_node(Node::new("b", [], Some(0.4))).unwrap();
        let g = ss.build(&BuildOptions::incomplete()).unwrap();
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.vertex(0).unwrap().nat, Some(0.2));
    }
}

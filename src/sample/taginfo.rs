//! Read-only aggregates used by the statistics

use crate::graph::{load_json, AttrGraph, GraphResult, Node};
use crate::util::{f1_score, sort_v};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// What related tags are ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    /// Share of the related tag's documents that carry this tag
    Precision,
    /// Share of this tag's documents that carry the related tag
    Recall,
    /// Number of shared documents
    Intersection,
    F1,
}

/// The extent of one tag in the world
#[derive(Debug, Clone, PartialEq)]
pub struct TagInfo {
    pub tag: String,
    pub docs: Vec<String>,
    /// related tag -> (shared documents, documents of the related tag)
    pub rel: IndexMap<String, (usize, usize)>,
    /// producer -> (shared documents, documents of the producer)
    pub prod: IndexMap<String, (usize, usize)>,
    /// Number of documents in the world
    pub totalsize: usize,
}

impl TagInfo {
    /// Node with an arc to every related tag, weighted by the share of its
    /// documents that carry this tag, and the tag's share of the world as
    /// attribute
    pub fn build_node(&self) -> Node {
        let out = self
            .rel
            .iter()
            .filter(|(rtag, _)| **rtag != self.tag)
            .map(|(rtag, &(shared, total))| (rtag.clone(), shared as f64 / total.max(1) as f64));
        Node::new(self.tag.clone(), out, Some(self.docs.len() as f64 / self.totalsize.max(1) as f64))
    }

    /// Precision and recall of a result list against this tag's documents
    pub fn precision_recall(&self, results: &[String]) -> (f64, f64) {
        let relevant: HashSet<&str> = self.docs.iter().map(String::as_str).collect();
        let returned: HashSet<&str> = results.iter().map(String::as_str).collect();
        let hits = returned.intersection(&relevant).count() as f64;
        let precision = if returned.is_empty() { 0.0 } else { hits / returned.len() as f64 };
        let recall = if relevant.is_empty() { 0.0 } else { hits / relevant.len() as f64 };
        (precision, recall)
    }

    /// Precision, recall and F1 score of a result list
    pub fn score_triple(&self, results: &[String]) -> (f64, f64, f64) {
        let (p, r) = self.precision_recall(results);
        (p, r, f1_score(p, r))
    }

    /// Related tags, best first
    pub fn rank_rel(&self, by: RankBy) -> Vec<(String, f64)> {
        let n = self.docs.len().max(1) as f64;
        sort_v(
            self.rel.iter().filter(|(rtag, _)| **rtag != self.tag).map(|(rtag, &(shared, total))| {
                let precision = shared as f64 / total.max(1) as f64;
                let recall = shared as f64 / n;
                let rating = match by {
                    RankBy::Precision => precision,
                    RankBy::Recall => recall,
                    RankBy::Intersection => shared as f64,
                    RankBy::F1 => f1_score(precision, recall),
                };
                (rtag.clone(), rating)
            }),
            true,
        )
    }
}

/// Where an identity's routing table points
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdInfo {
    pub id: String,
    /// Social contacts, including the identity itself
    pub soc: Vec<String>,
    pub tgr: Vec<String>,
    pub idx: Vec<String>,
    /// Producers related to the indexes
    pub rel: Vec<String>,
}

/// A local address scheme next to the one grown from world data
#[derive(Debug, Clone)]
pub struct AddrSchemeEval {
    /// Input scheme without unscored vertices
    pub prune: AttrGraph,
    pub local: AttrGraph,
    pub world: AttrGraph,
}

impl AddrSchemeEval {
    fn arc_ids(g: &AttrGraph) -> BTreeSet<(&str, &str)> {
        g.edges().iter().map(|e| (g.vertices()[e.source].id.as_str(), g.vertices()[e.target].id.as_str())).collect()
    }

    /// Jaccard index of the arc sets of the two schemes, 1 when both are empty
    pub fn score_world(&self) -> f64 {
        let local = Self::arc_ids(&self.local);
        let world = Self::arc_ids(&self.world);
        let union = local.union(&world).count();
        if union == 0 {
            return 1.0;
        }
        local.intersection(&world).count() as f64 / union as f64
    }
}

/// Results of one query step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub results: Vec<String>,
    #[serde(default)]
    pub scheme: Option<AttrGraph>,
}

/// Log of one query for a tag, issued by an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub id: String,
    pub tag: String,
    pub steps: BTreeMap<usize, StepResult>,
}

impl QueryReport {
    pub fn load(path: impl AsRef<Path>) -> GraphResult<Self> {
        load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Vertex;

    fn info() -> TagInfo {
        TagInfo {
            tag: "t2".to_string(),
            docs: vec!["d1".to_string(), "d2".to_string()],
            rel: [("t1", (1, 1)), ("t2", (2, 2)), ("t3", (1, 4))].into_iter().map(|(t, c)| (t.to_string(), c)).collect(),
            prod: IndexMap::new(),
            totalsize: 8,
        }
    }

    #[test]
    fn test_build_node() {
        let node = info().build_node();
        assert_eq!(node.id(), "t2");
        assert_eq!(node.attr(), Some(0.25));
        assert_eq!(node.out().len(), 2);
        assert_eq!(node.out()["t3"], 0.25);
    }

    #[test]
    fn test_score_triple() {
        let ti = info();
        let (p, r, f) = ti.score_triple(&["d1".to_string(), "d9".to_string()]);
        assert_eq!((p, r), (0.5, 0.5));
        assert!((f - 0.5).abs() < 1e-12);
        assert_eq!(ti.score_triple(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_rank_rel() {
        let ti = info();
        let by_p: Vec<String> = ti.rank_rel(RankBy::Precision).into_iter().map(|(t, _)| t).collect();
        assert_eq!(by_p, vec!["t1", "t3"]);
        let by_i = ti.rank_rel(RankBy::Intersection);
        assert_eq!(by_i[0], ("t1".to_string(), 1.0));
        assert_eq!(by_i[1], ("t3".to_string(), 1.0));
    }

    #[test]
    fn test_score_world() {
        let mut a = AttrGraph::from_vertices(["x", "y", "z"].into_iter().map(Vertex::new));
        a.add_edge(0, 1, 1.0).unwrap();
        a.add_edge(0, 2, 1.0).unwrap();
        let mut b = AttrGraph::from_vertices(["x", "z", "y"].into_iter().map(Vertex::new));
        b.add_edge(0, 2, 1.0).unwrap();
        let eval = AddrSchemeEval { prune: a.clone(), local: a, world: b };
        assert_eq!(eval.score_world(), 0.5);
    }

    #[test]
    fn test_load_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        std::fs::write(&path, r#"{"id": "u1", "tag": "t2", "steps": {"8": {"results": ["d1"]}}}"#).unwrap();
        let rep = QueryReport::load(&path).unwrap();
        assert_eq!(rep.steps[&8].results, vec!["d1"]);
        assert!(rep.steps[&8].scheme.is_none());
    }
}

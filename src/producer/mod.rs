//! Producers: per-entity content models
//!
//! A producer (user, group or synthetic community) owns one doc-tag graph.
//! Its vertices fall into four contiguous ranges, always in this order:
//! - documents `0..base_t`
//! - tags referenced by the documents `base_t..base_s`
//! - tags added by relation arcs `base_s..base_p`
//! - related producers `base_p..`
//!
//! Callers think of arcs as doc -> tag with weight `|tags(doc)|^-0.5`; the
//! graph stores them reversed (tag -> doc). Relation arcs run from tag
//! vertices to producer vertices.

pub mod export;
pub mod repr;
pub mod state;

pub use repr::{representatives, RepConfig, RepInfo};
pub use state::{ProducerState, StateError};

use crate::config::ConvergeConfig;
use crate::graph::{AttrGraph, BuildOptions, GraphError, Node, NodeSample, Vertex, VertexId};
use crate::store::{KvStore, StoreError};
use crate::util::{iterconverge, union_ind, ConvergenceError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use state::require;
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("score of document {doc}: {source}")]
    Convergence {
        doc: String,
        #[source]
        source: ConvergenceError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ProducerResult<T> = Result<T, ProducerError>;

/// Why a producer relates to another one, as passed to
/// [`Producer::init_prod_arcs`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerRelation {
    /// Aggregate relevance; the union of the arc weights when absent
    pub attr: Option<f64>,
    /// Tag -> arc weight
    pub arcs: IndexMap<String, f64>,
    /// Tag -> own tags that triggered it, for scoring tags new to this producer
    pub tags: Option<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    nsid: String,
    state: ProducerState,
    docgr: AttrGraph,
    base_t: usize,
    base_s: usize,
    base_p: usize,
    rep_d: Vec<String>,
    rep_t: Vec<String>,
}

impl Producer {
    pub fn new(nsid: impl Into<String>) -> Self {
        Producer {
            nsid: nsid.into(),
            state: ProducerState::New,
            docgr: AttrGraph::new(),
            base_t: 0,
            base_s: 0,
            base_p: 0,
            rep_d: Vec::new(),
            rep_t: Vec::new(),
        }
    }

    pub fn nsid(&self) -> &str {
        &self.nsid
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn docgr(&self) -> &AttrGraph {
        &self.docgr
    }

    /// Number of documents
    pub fn size(&self) -> usize {
        self.base_t
    }

    pub fn drange(&self) -> Range<VertexId> {
        0..self.base_t
    }

    pub fn trange(&self) -> Range<VertexId> {
        self.base_t..self.base_s
    }

    pub fn srange(&self) -> Range<VertexId> {
        self.base_s..self.base_p
    }

    pub fn prange(&self) -> Range<VertexId> {
        self.base_p..self.docgr.vertex_count()
    }

    /// Representative documents, best first
    pub fn rep_d(&self) -> &[String] {
        &self.rep_d
    }

    /// Representative tags, best first
    pub fn rep_t(&self) -> &[String] {
        &self.rep_t
    }

    fn ids(&self, range: Range<VertexId>) -> Vec<&str> {
        self.docgr.vertices()[range].iter().map(|v| v.id.as_str()).collect()
    }

    pub fn docs(&self) -> Vec<&str> {
        self.ids(self.drange())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.ids(self.trange())
    }

    pub fn new_tags(&self) -> Vec<&str> {
        self.ids(self.srange())
    }

    /// Ids of the related producers
    pub fn related(&self) -> Vec<&str> {
        self.ids(self.prange())
    }

    /// Documents carrying `tag`
    pub fn docs_for_tag(&self, tag: &str) -> Vec<&str> {
        match self.docgr.find_in(tag, self.trange()) {
            Some(vid) => self.docgr.out_edges(vid).filter(|e| e.target < self.base_t).map(|e| self.docgr.vertices()[e.target].id.as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Tags of `doc`
    pub fn tags_for_doc(&self, doc: &str) -> Vec<&str> {
        match self.docgr.find_in(doc, self.drange()) {
            Some(vid) => self.docgr.in_edges(vid).map(|e| self.docgr.vertices()[e.source].id.as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Score of one of this producer's own tags
    pub fn tag_score(&self, tag: &str) -> Option<f64> {
        self.docgr.find_in(tag, self.trange()).and_then(|vid| self.docgr.vertices()[vid].naa)
    }

    /// Score of one of this producer's documents
    pub fn doc_score(&self, doc: &str) -> Option<f64> {
        self.docgr.find_in(doc, self.drange()).and_then(|vid| self.docgr.vertices()[vid].naa)
    }

    /// Vertex label used in the producer graph
    pub fn label(&self) -> String {
        let top: Vec<&str> = self.rep_t.iter().take(4).map(String::as_str).collect();
        format!("{} ({})\n{}", self.nsid, self.size(), top.join("\n"))
    }

    /// Build the doc-tag graph from `docs` and their tags in `dtdb`.
    ///
    /// Duplicate documents are ignored. Fails unless the producer is new, or
    /// if a document is missing from `dtdb`.
    pub fn init_content<I>(&mut self, docs: I, dtdb: &dyn KvStore<Vec<String>>) -> ProducerResult<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        require(self.state, &[ProducerState::New], "content already initialised")?;

        let mut sample = NodeSample::new();
        for doc in docs {
            let doc = doc.as_ref();
            if sample.contains(doc) {
                continue;
            }
            let mut seen = HashSet::new();
            let tags: Vec<String> = dtdb.fetch(doc)?.into_iter().filter(|t| seen.insert(t.clone())).collect();
            let w = (tags.len() as f64).powf(-0.5);
            sample.add_node(Node::new(doc, tags.into_iter().map(|t| (t, w)), None))?;
        }

        let opts = BuildOptions { keep_dangle: true, bipartite: true, inverse: true, ..Default::default() };
        let docgr = sample.build(&opts)?.clone();

        self.base_t = sample.order();
        self.base_s = docgr.vertex_count();
        self.base_p = self.base_s;
        self.docgr = docgr;
        self.state = ProducerState::Content;
        debug!("producer {}: {} docs, {} tags", self.nsid, self.base_t, self.base_s - self.base_t);
        Ok(())
    }

    /// Infer tag and document scores.
    ///
    /// A tag scores the union of its arc weights: the chance that at least
    /// one of its documents evidences it. A document scores the fixed point
    /// of `k = union(k * w(doc, tag) / score(tag))` over its tags, treating
    /// tags as independent.
    pub fn infer_scores(&mut self, cfg: &ConvergeConfig) -> ProducerResult<()> {
        require(self.state, &[ProducerState::Content, ProducerState::Scores], "content not initialised or arcs already attached")?;

        let g = &self.docgr;
        let sc_t: Vec<f64> = self.trange().map(|t| union_ind(g.out_edges(t).map(|e| e.weight))).collect();

        let mut sc_d = Vec::with_capacity(self.base_t);
        for d in self.drange() {
            let arcs: Vec<(f64, f64)> = g.in_edges(d).map(|e| (e.weight, sc_t[e.source - self.base_t])).collect();
            let score = iterconverge(|k| union_ind(arcs.iter().map(|&(w, s)| k * w / s)), cfg.init, cfg.maxsteps)
                .map_err(|source| ProducerError::Convergence { doc: g.vertices()[d].id.clone(), source })?;
            sc_d.push(score);
        }

        for (d, score) in sc_d.into_iter().enumerate() {
            if let Some(v) = self.docgr.vertex_mut(d) {
                v.naa = Some(score);
            }
        }
        for (i, score) in sc_t.into_iter().enumerate() {
            if let Some(v) = self.docgr.vertex_mut(self.base_t + i) {
                v.naa = Some(score);
            }
        }
        self.state = ProducerState::Scores;
        Ok(())
    }

    /// Select representative documents, covering the tags
    pub fn rep_doc(&mut self, cfg: &RepConfig) -> ProducerResult<RepInfo> {
        require(self.state, &[ProducerState::Scores], "scores not inferred")?;
        let g = &self.docgr;
        let candidates = self
            .drange()
            .map(|d| {
                let v = &g.vertices()[d];
                let touched = g.in_edges(d).map(|e| e.source - self.base_t).collect();
                (v.id.clone(), v.naa.unwrap_or(0.0), touched)
            })
            .collect();
        let (rep, info) = representatives(candidates, self.base_s - self.base_t, cfg);
        self.rep_d = rep;
        Ok(info)
    }

    /// Select representative tags, covering the documents
    pub fn rep_tag(&mut self, cfg: &RepConfig) -> ProducerResult<RepInfo> {
        require(self.state, &[ProducerState::Scores], "scores not inferred")?;
        let g = &self.docgr;
        let candidates = self
            .trange()
            .map(|t| {
                let v = &g.vertices()[t];
                let touched = g.out_edges(t).map(|e| e.target).collect();
                (v.id.clone(), v.naa.unwrap_or(0.0), touched)
            })
            .collect();
        let (rep, info) = representatives(candidates, self.base_t, cfg);
        self.rep_t = rep;
        Ok(info)
    }

    /// Attach relation vertices and arcs; the producer becomes final.
    ///
    /// Arc tags this producer does not have become new tag vertices, scored
    /// from the own tags that triggered them when the relation says which.
    /// Then every related producer gets one vertex, with an arc from each of
    /// its tags.
    pub fn init_prod_arcs(&mut self, pmap: IndexMap<String, ProducerRelation>) -> ProducerResult<()> {
        require(self.state, &[ProducerState::Scores], "scores not inferred, or arcs already attached")?;

        let mut new_tags: IndexMap<&str, Option<f64>> = IndexMap::new();
        for rel in pmap.values() {
            for tag in rel.arcs.keys() {
                if self.docgr.find_in(tag, self.trange()).is_some() || new_tags.contains_key(tag.as_str()) {
                    continue;
                }
                let naa = rel.tags.as_ref().and_then(|tags| tags.get(tag)).map(|srcs| {
                    union_ind(srcs.iter().map(|s| self.tag_score(s).unwrap_or(0.0)))
                });
                new_tags.insert(tag, naa);
            }
        }

        let mut docgr = self.docgr.clone();
        for (&tag, &naa) in &new_tags {
            docgr.add_vertex(Vertex::new(tag).with_naa(naa));
        }
        let base_p = docgr.vertex_count();

        for (rnsid, rel) in &pmap {
            let naa = rel.attr.unwrap_or_else(|| union_ind(rel.arcs.values().copied()));
            let pvid = docgr.add_vertex(Vertex::new(rnsid.as_str()).with_naa(Some(naa)));
            for (tag, &w) in &rel.arcs {
                if let Some(tvid) = docgr.find_in(tag, self.base_t..base_p) {
                    docgr.add_edge(tvid, pvid, w)?;
                }
            }
        }

        self.docgr = docgr;
        self.base_p = base_p;
        self.state = ProducerState::Arc;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn dtdb() -> MemoryStore<Vec<String>> {
        [("d1", &["t1", "t2"][..]), ("d2", &["t2", "t3"][..]), ("d3", &["t3", "t4"][..]), ("d4", &["t5"][..])]
            .into_iter()
            .map(|(d, ts)| (d, ts.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    fn scored(docs: &[&str]) -> Producer {
        let mut prod = Producer::new("A");
        prod.init_content(docs, &dtdb()).unwrap();
        prod.infer_scores(&ConvergeConfig::default()).unwrap();
        prod
    }

    #[test]
    fn test_init_content_ranges() {
        let mut prod = Producer::new("A");
        prod.init_content(["d1", "d2", "d1"], &dtdb()).unwrap();
        assert_eq!(prod.state(), ProducerState::Content);
        assert_eq!(prod.docs(), vec!["d1", "d2"]);
        assert_eq!(prod.tags(), vec!["t1", "t2", "t3"]);
        assert_eq!(prod.drange(), 0..2);
        assert_eq!(prod.trange(), 2..5);
        assert!(prod.srange().is_empty());
        assert!(prod.prange().is_empty());
        assert_eq!(prod.docs_for_tag("t2"), vec!["d1", "d2"]);
        assert_eq!(prod.tags_for_doc("d2"), vec!["t2", "t3"]);
    }

    #[test]
    fn test_init_content_twice_fails() {
        let mut prod = Producer::new("A");
        prod.init_content(["d1"], &dtdb()).unwrap();
        let err = prod.init_content(["d2"], &dtdb()).unwrap_err();
        assert!(matches!(err, ProducerError::State(StateError { state: ProducerState::Content, .. })));
        assert_eq!(prod.docs(), vec!["d1"]);
    }

    #[test]
    fn test_missing_document() {
        let mut prod = Producer::new("A");
        let err = prod.init_content(["d9"], &dtdb()).unwrap_err();
        assert!(matches!(err, ProducerError::Store(StoreError::NotFound(_))));
        assert_eq!(prod.state(), ProducerState::New);
    }

    #[test]
    fn test_tag_scores() {
        let prod = scored(&["d1", "d2"]);
        let w = 0.5f64.sqrt();
        assert!((prod.tag_score("t2").unwrap() - union_ind([w, w])).abs() < 1e-12);
        assert!((prod.tag_score("t1").unwrap() - w).abs() < 1e-12);
        for d in prod.docs() {
            let s = prod.doc_score(d).unwrap();
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_single_tag_document_keeps_init() {
        let prod = scored(&["d4"]);
        assert_eq!(prod.doc_score("d4"), Some(0.5));
        assert_eq!(prod.tag_score("t5"), Some(1.0));
    }

    #[test]
    fn test_representatives_cover() {
        let mut prod = scored(&["d1", "d2", "d3"]);
        prod.rep_doc(&RepConfig::docs()).unwrap();
        prod.rep_tag(&RepConfig::tags()).unwrap();

        let covered: HashSet<&str> = prod.rep_d().iter().flat_map(|d| prod.tags_for_doc(d)).collect();
        assert_eq!(covered.len(), prod.tags().len());
        let covered: HashSet<&str> = prod.rep_t().iter().flat_map(|t| prod.docs_for_tag(t)).collect();
        assert_eq!(covered.len(), prod.docs().len());
        assert_eq!(prod.state(), ProducerState::Scores);
    }

    #[test]
    fn test_init_prod_arcs() {
        let mut prod = scored(&["d1", "d2"]);
        let mut tags = IndexMap::new();
        tags.insert("tx".to_string(), vec!["t1".to_string()]);
        let rel = ProducerRelation {
            attr: None,
            arcs: [("t3".to_string(), 0.5), ("tx".to_string(), 0.5)].into_iter().collect(),
            tags: Some(tags),
        };
        prod.init_prod_arcs([("B".to_string(), rel)].into_iter().collect()).unwrap();

        assert_eq!(prod.state(), ProducerState::Arc);
        assert_eq!(prod.new_tags(), vec!["tx"]);
        assert_eq!(prod.related(), vec!["B"]);
        let g = prod.docgr();
        let pvid = prod.prange().start;
        assert_eq!(g.vertex(pvid).unwrap().naa, Some(0.75));
        assert_eq!(g.vertex(prod.srange().start).unwrap().naa, prod.tag_score("t1"));
        assert_eq!(g.predecessors(pvid).len(), 2);

        let err = prod.init_prod_arcs(IndexMap::new()).unwrap_err();
        assert!(matches!(err, ProducerError::State(_)));
        assert!(matches!(prod.infer_scores(&ConvergeConfig::default()), Err(ProducerError::State(_))));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut prod = scored(&["d1", "d2"]);
        prod.rep_tag(&RepConfig::tags()).unwrap();
        let bytes = bincode::serialize(&prod).unwrap();
        let back: Producer = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, prod);
        assert_eq!(back.tag_score("t3"), prod.tag_score("t3"));
    }
}

//! Per-producer graphs materialized by the writer

use super::state::{require, ProducerState};
use super::{Producer, ProducerResult};
use crate::graph::{AttrGraph, BuildOptions, Node, NodeSample};
use crate::store::KvStore;
use rustc_hash::FxHashSet;
use std::collections::HashMap;

impl Producer {
    /// The index graph of a base producer: its doc-tag graph with the range
    /// bases stored as graph attributes. Tags are `base_t..base_h`, relation
    /// vertices `base_h..`.
    pub fn create_index(&self) -> AttrGraph {
        let mut g = self.docgr.clone();
        g.set_attr("base_d", 0);
        g.set_attr("base_t", self.base_t as i64);
        g.set_attr("base_s", self.base_s as i64);
        g.set_attr("base_h", self.base_p as i64);
        g
    }

    /// The tgraph of a community producer.
    ///
    /// One vertex per tag (own and new), then one per related tgraph. A tag
    /// points at the representative tags it co-occurs with, weighted by the
    /// share of the representative's documents it shares, and at the related
    /// tgraphs its relation arcs reach. Tags carry their share of the world's
    /// `totalsize` documents, or their score when they have no documents here;
    /// related tgraphs carry theirs. Only final producers have one.
    pub fn create_tgraph(&self, totalsize: usize, pgdb: &dyn KvStore<Producer>) -> ProducerResult<AttrGraph> {
        require(self.state, &[ProducerState::Arc], "relation arcs not attached")?;
        let g = &self.docgr;
        let world = totalsize.max(1) as f64;
        let tag_end = self.base_p;

        let docs_of = |t: usize| -> FxHashSet<usize> { g.out_edges(t).filter(|e| e.target < self.base_t).map(|e| e.target).collect() };
        let rep: Vec<(usize, FxHashSet<usize>)> = self
            .rep_t
            .iter()
            .filter_map(|t| g.find_in(t, self.trange()))
            .map(|t| (t, docs_of(t)))
            .collect();

        let mut sample = NodeSample::new();
        for t in self.base_t..tag_end {
            let v = &g.vertices()[t];
            let docs = docs_of(t);
            let mut out: Vec<(String, f64)> = Vec::new();
            if !docs.is_empty() {
                for (u, udocs) in &rep {
                    if *u == t {
                        continue;
                    }
                    let shared = docs.intersection(udocs).count();
                    if shared > 0 {
                        out.push((g.vertices()[*u].id.clone(), shared as f64 / udocs.len() as f64));
                    }
                }
            }
            out.extend(g.out_edges(t).filter(|e| e.target >= tag_end).map(|e| (g.vertices()[e.target].id.clone(), e.weight)));
            let nat = if docs.is_empty() { v.naa } else { Some(docs.len() as f64 / world) };
            sample.add_node(Node::new(v.id.clone(), out, nat))?;
        }

        let mut sizes: HashMap<&str, f64> = HashMap::new();
        for p in self.prange() {
            let id = g.vertices()[p].id.as_str();
            if let Some(other) = pgdb.get(id)? {
                sizes.insert(id, other.size() as f64 / world);
            }
        }
        for p in self.prange() {
            let id = g.vertices()[p].id.as_str();
            sample.add_node(Node::new(id, Vec::new(), sizes.get(id).copied()))?;
        }

        let mut tg = sample.build(&BuildOptions::incomplete())?.clone();
        tg.set_attr("base_t", 0);
        tg.set_attr("base_p", (tag_end - self.base_t) as i64);
        Ok(tg)
    }
}

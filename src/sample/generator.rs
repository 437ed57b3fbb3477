//! Producer generation pipeline
//!
//! Stages run in order, each resumable through the producer state stores:
//! 1. indexes: one producer per base producer (user or group), then their
//!    relation arcs, then the producer graph
//! 2. communities over the producer graph
//! 3. tgraphs: one producer per community, then their relation arcs
//! 4. ptables: the routing graph linking users to indexes and tgraphs

use super::{DynStore, SampleError, SampleResult};
use crate::algo::select_communities;
use crate::config::{ClusterConfig, SampleConfig};
use crate::graph::{AttrGraph, Vertex, VertexId};
use crate::producer::{Producer, ProducerRelation, ProducerState};
use crate::store::{KvStore, StoreResult};
use crate::util::{exec_unique, infer_arcs, invert_multimap, pending_unique, union_ind};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Id of the tgraph made from community `i`
pub fn tgraph_id(i: usize) -> String {
    format!("{:04}", i)
}

/// Read-only source data of the pipeline
pub struct SourceDbs {
    /// producer -> documents
    pub pddb: DynStore<Vec<String>>,
    /// document -> producers
    pub dppb: DynStore<Vec<String>>,
    /// document -> tags
    pub dtdb: DynStore<Vec<String>>,
    /// tag -> clusters, each an ordered tag list
    pub tcdb: DynStore<Vec<Vec<String>>>,
}

impl SourceDbs {
    /// Producers holding the representative documents of `prod`, with the
    /// share of their documents that are among them.
    pub fn infer_rel_prods(&self, prod: &Producer) -> SampleResult<IndexMap<String, f64>> {
        let holders = prod
            .rep_d()
            .iter()
            .map(|doc| Ok((doc.as_str(), self.dppb.fetch(doc)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        let mut rel = invert_multimap(holders);
        rel.shift_remove(prod.nsid());

        let mut out = IndexMap::with_capacity(rel.len());
        for (nsid, docs) in rel {
            let total = self.pddb.fetch(&nsid)?.len().max(1);
            out.insert(nsid, docs.len() as f64 / total as f64);
        }
        Ok(out)
    }

    /// Tag-level arcs from `source` to `target`: every target tag implicated
    /// through a cluster, weighted by its score in `target`, updated with the
    /// high-level cluster tags. Also returns the implicating source tags.
    pub fn infer_prod_arc(
        &self,
        source: &Producer,
        target: &Producer,
        cfg: &ClusterConfig,
    ) -> SampleResult<(IndexMap<String, f64>, IndexMap<String, Vec<String>>)> {
        let (rtags, htags) = self.select_tags_from_clusters(source.rep_t(), target.rep_t(), cfg)?;
        let mut arcs: IndexMap<String, f64> =
            rtags.keys().map(|rtag| (rtag.clone(), target.tag_score(rtag).unwrap_or(0.0))).collect();
        arcs.extend(htags);
        Ok((arcs, rtags))
    }

    /// Intersect every cluster of every source tag with the target tags.
    ///
    /// Returns `(rtags, htags)`: `rtags` maps each implicated tag to the
    /// source tags that led to it; `htags` maps the leading tags of every
    /// cluster covered well enough (`overlap_factor * |x| > |cluster|`) to the
    /// union of the covered fractions. High-level tags are implicated too.
    /// Tags without clusters contribute nothing.
    pub fn select_tags_from_clusters(
        &self,
        tset_s: &[String],
        tset_t: &[String],
        cfg: &ClusterConfig,
    ) -> SampleResult<(IndexMap<String, Vec<String>>, IndexMap<String, f64>)> {
        let target: HashSet<&str> = tset_t.iter().map(String::as_str).collect();
        let mut rtags: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut htags: IndexMap<String, Vec<f64>> = IndexMap::new();

        for tag in tset_s {
            let clusters = self.tcdb.get(tag)?.unwrap_or_default();
            for cluster in &clusters {
                let mut seen = HashSet::new();
                let tset_x: Vec<&str> =
                    cluster.iter().map(String::as_str).filter(|t| target.contains(t) && seen.insert(*t)).collect();

                for &rtag in &tset_x {
                    rtags.entry(rtag.to_string()).or_default().push(tag.clone());
                }

                if cfg.overlap_factor * tset_x.len() > cluster.len() {
                    let attr = tset_x.len() as f64 / cluster.len() as f64;
                    for htag in cluster.iter().take(cfg.representatives) {
                        htags.entry(htag.clone()).or_default().push(attr);
                        rtags.entry(htag.clone()).or_default().push(tag.clone());
                    }
                }
            }
        }

        let htags = htags.into_iter().map(|(htag, attrs)| (htag, union_ind(attrs))).collect();
        Ok((rtags, htags))
    }
}

/// A producer store with its lifecycle-state companion
pub struct ProducerDbs {
    pub prods: DynStore<Producer>,
    pub states: DynStore<ProducerState>,
}

impl ProducerDbs {
    /// The state is written last: an id is only marked once its producer is stored
    fn save(&mut self, prod: Producer) -> SampleResult<()> {
        let nsid = prod.nsid().to_string();
        let state = prod.state();
        self.prods.set(&nsid, prod)?;
        self.states.set(&nsid, state)?;
        Ok(())
    }

    fn reached(&self, nsid: &str, state: ProducerState) -> StoreResult<bool> {
        Ok(self.states.get(nsid)?.is_some_and(|s| s >= state))
    }

    fn sync(&mut self) -> SampleResult<()> {
        self.prods.sync()?;
        self.states.sync()?;
        Ok(())
    }
}

pub struct SampleGenerator {
    config: SampleConfig,
    socgr: AttrGraph,
    /// group -> member users
    gumap: IndexMap<String, Vec<String>>,
    src: SourceDbs,
    idx: ProducerDbs,
    tgr: ProducerDbs,

    pub prodgr: Option<AttrGraph>,
    pub comm: Option<Vec<Vec<usize>>>,
    pub sprdgr: Option<AttrGraph>,
    pub ptabgr: Option<AttrGraph>,
    /// user -> groups and tgraphs reachable through its ptable
    pub ptbmap: Option<BTreeMap<String, BTreeSet<String>>>,
}

impl SampleGenerator {
    pub fn new(
        config: SampleConfig,
        socgr: AttrGraph,
        gumap: IndexMap<String, Vec<String>>,
        src: SourceDbs,
        idx: ProducerDbs,
        tgr: ProducerDbs,
    ) -> Self {
        SampleGenerator { config, socgr, gumap, src, idx, tgr, prodgr: None, comm: None, sprdgr: None, ptabgr: None, ptbmap: None }
    }

    pub fn sources(&self) -> &SourceDbs {
        &self.src
    }

    /// Base producers
    pub fn indexes(&self) -> &dyn KvStore<Producer> {
        &*self.idx.prods
    }

    /// Community producers
    pub fn tgraphs(&self) -> &dyn KvStore<Producer> {
        &*self.tgr.prods
    }

    pub fn infer_rel_prods(&self, prod: &Producer) -> SampleResult<IndexMap<String, f64>> {
        self.src.infer_rel_prods(prod)
    }

    pub fn infer_prod_arc(
        &self,
        source: &Producer,
        target: &Producer,
    ) -> SampleResult<(IndexMap<String, f64>, IndexMap<String, Vec<String>>)> {
        self.src.infer_prod_arc(source, target, &self.config.cluster)
    }

    pub fn select_tags_from_clusters(
        &self,
        tset_s: &[String],
        tset_t: &[String],
    ) -> SampleResult<(IndexMap<String, Vec<String>>, IndexMap<String, f64>)> {
        self.src.select_tags_from_clusters(tset_s, tset_t, &self.config.cluster)
    }

    /// Build every base producer, then their relation arcs, then the
    /// producer graph. Producers already past a step are not redone.
    pub fn generate_indexes(&mut self) -> SampleResult<()> {
        let cfg = &self.config;
        let src = &self.src;
        let idx = &mut self.idx;

        let pending = pending_unique(src.pddb.keys()?, |nsid| idx.states.contains(nsid))?;
        exec_unique(
            "indexes db: producers",
            &pending,
            cfg.progress_steps,
            |nsid| -> SampleResult<()> {
                let mut prod = Producer::new(nsid.as_str());
                prod.init_content(src.pddb.fetch(nsid)?, &*src.dtdb)?;
                prod.infer_scores(&cfg.converge)?;
                prod.rep_doc(&cfg.rep_doc)?;
                prod.rep_tag(&cfg.rep_tag)?;
                idx.save(prod)
            },
            |_, _, ()| {},
        )?;

        let pending = pending_unique(idx.prods.keys()?, |nsid| idx.reached(nsid, ProducerState::Arc))?;
        exec_unique(
            "indexes db: relations",
            &pending,
            cfg.relation_progress_steps,
            |nsid| -> SampleResult<()> {
                let mut prod = idx.prods.fetch(nsid)?;
                if prod.state() != ProducerState::Arc {
                    let mut pmap = IndexMap::new();
                    for (rnsid, rattr) in src.infer_rel_prods(&prod)? {
                        let target = idx.prods.fetch(&rnsid)?;
                        let (arcs, _) = src.infer_prod_arc(&prod, &target, &cfg.cluster)?;
                        pmap.insert(rnsid, ProducerRelation { attr: Some(rattr), arcs, tags: None });
                    }
                    prod.init_prod_arcs(pmap)?;
                }
                idx.save(prod)
            },
            |_, _, ()| {},
        )?;
        idx.sync()?;

        let prodgr = producer_graph(&*idx.prods)?;
        info!("indexes db: generated producer graph ({} producers, {} arcs)", prodgr.vertex_count(), prodgr.edge_count());
        self.prodgr = Some(prodgr);
        Ok(())
    }

    /// Select communities of the producer graph
    pub fn generate_communities(&mut self) -> SampleResult<&[Vec<usize>]> {
        let prodgr = self.prodgr.as_ref().ok_or(SampleError::MissingStage("producer graph"))?;
        let sizes = prodgr
            .vertices()
            .iter()
            .map(|v| -> SampleResult<usize> { Ok(self.idx.prods.fetch(&v.id)?.size()) })
            .collect::<SampleResult<Vec<usize>>>()?;
        let comm = select_communities(prodgr, &sizes, &self.config.community, self.config.seed);
        Ok(self.comm.insert(comm).as_slice())
    }

    /// Build one producer per community, the graph between them, and their
    /// relation arcs along that graph.
    pub fn generate_tgraphs(&mut self) -> SampleResult<()> {
        let prodgr = self.prodgr.as_ref().ok_or(SampleError::MissingStage("producer graph"))?;
        let comm = self.comm.as_ref().ok_or(SampleError::MissingStage("communities"))?;
        let cfg = &self.config;
        let src = &self.src;
        let tgr = &mut self.tgr;

        let ids: HashMap<String, usize> = (0..comm.len()).map(|i| (tgraph_id(i), i)).collect();
        let pending = pending_unique((0..comm.len()).map(tgraph_id), |nsid| tgr.states.contains(nsid))?;
        exec_unique(
            "tgraphs db: producers",
            &pending,
            cfg.progress_steps,
            |nsid| -> SampleResult<()> {
                let members = ids.get(nsid).map(|&i| comm[i].as_slice()).unwrap_or_default();
                let mut docs = Vec::new();
                for &p in members {
                    docs.extend(src.pddb.fetch(&prodgr.try_vertex(p)?.id)?);
                }
                let mut prod = Producer::new(nsid.as_str());
                prod.init_content(docs, &*src.dtdb)?;
                prod.infer_scores(&cfg.converge)?;
                prod.rep_tag(&cfg.rep_tgraph_tag)?;
                tgr.save(prod)
            },
            |_, _, ()| {},
        )?;

        // aggregates overlap more than single producers do
        let tot_p = prodgr.vertex_count();
        let ratio = 2.0 * (1.0 + tot_p as f64).ln();
        let mut sprdgr = AttrGraph::from_vertices(
            comm.iter().enumerate().map(|(i, c)| Vertex::new(tgraph_id(i)).with_label(c.len().to_string())),
        );
        for (s, t, w) in infer_arcs(comm, tot_p, Some(ratio)) {
            sprdgr.add_edge(s, t, w)?;
        }
        info!("tgraphs db: generated producer graph ({} tgraphs, {} arcs)", sprdgr.vertex_count(), sprdgr.edge_count());

        let pending = pending_unique(tgr.prods.keys()?, |nsid| tgr.reached(nsid, ProducerState::Arc))?;
        exec_unique(
            "tgraphs db: relations",
            &pending,
            cfg.relation_progress_steps,
            |nsid| -> SampleResult<()> {
                let mut prod = tgr.prods.fetch(nsid)?;
                if prod.state() != ProducerState::Arc {
                    let vid = sprdgr.find(nsid).ok_or_else(|| SampleError::UnknownId(nsid.clone()))?;
                    let mut pmap = IndexMap::new();
                    for r in sprdgr.successors(vid) {
                        let rnsid = &sprdgr.vertices()[r].id;
                        let target = tgr.prods.fetch(rnsid)?;
                        let (arcs, rtags) = src.infer_prod_arc(&prod, &target, &cfg.cluster)?;
                        pmap.insert(rnsid.clone(), ProducerRelation { attr: None, arcs, tags: Some(rtags) });
                    }
                    prod.init_prod_arcs(pmap)?;
                }
                tgr.save(prod)
            },
            |_, _, ()| {},
        )?;
        tgr.sync()?;

        self.sprdgr = Some(sprdgr);
        Ok(())
    }

    /// Build the routing graph and its reverse map.
    ///
    /// The social graph is extended with one vertex per group (from
    /// `base_h`) and one per tgraph (from `base_g`). Users get a self loop
    /// and an arc to each of their groups. A user reached by a community
    /// through its groups is linked to `floor(sqrt(n))` of its `n` candidate
    /// tgraphs, picked at random.
    pub fn generate_ptables(&mut self) -> SampleResult<()> {
        let prodgr = self.prodgr.as_ref().ok_or(SampleError::MissingStage("producer graph"))?;
        let comm = self.comm.as_ref().ok_or(SampleError::MissingStage("communities"))?;
        let sprdgr = self.sprdgr.as_ref().ok_or(SampleError::MissingStage("tgraph graph"))?;
        let socgr = &self.socgr;
        let gumap = &self.gumap;
        let pcfg = &self.config.ptable;

        let id_u: HashMap<&str, VertexId> = socgr.vertices().iter().enumerate().map(|(i, v)| (v.id.as_str(), i)).collect();
        let base_h = socgr.vertex_count();
        let base_g = base_h + gumap.len();

        let mut ptabgr = socgr.clone();
        for group in gumap.keys() {
            ptabgr.add_vertex(Vertex::new(group.as_str()));
        }
        for v in sprdgr.vertices() {
            ptabgr.add_vertex(Vertex::new(v.id.as_str()));
        }

        let mut edges: BTreeSet<(VertexId, VertexId)> = (0..base_h).map(|v| (v, v)).collect();
        for (j, (group, users)) in gumap.iter().enumerate() {
            for user in users {
                match id_u.get(user.as_str()) {
                    Some(&u) => {
                        edges.insert((u, base_h + j));
                    }
                    None => debug!("ptables: member {} of {} is not in the social graph", user, group),
                }
            }
        }

        let mut phmap: BTreeMap<&str, BTreeSet<VertexId>> = BTreeMap::new();
        for (i, members) in comm.iter().enumerate() {
            for &p in members {
                let hid = prodgr.try_vertex(p)?.id.as_str();
                if id_u.contains_key(hid) {
                    continue;
                }
                for user in gumap.get(hid).into_iter().flatten() {
                    phmap.entry(user.as_str()).or_default().insert(base_g + i);
                }
            }
        }

        // only some of them, so no user links to hundreds of tgraphs
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        for (user, gvids) in &phmap {
            let Some(&u) = id_u.get(user) else { continue };
            let gvids: Vec<VertexId> = gvids.iter().copied().collect();
            let k = (gvids.len() as f64).sqrt() as usize;
            for &gvid in gvids.choose_multiple(&mut rng, k) {
                edges.insert((u, gvid));
            }
        }

        for (s, t) in edges {
            let w = if s == t { pcfg.self_weight } else { pcfg.member_weight };
            ptabgr.add_edge(s, t, w)?;
        }
        ptabgr.set_attr("base_z", 0);
        ptabgr.set_attr("base_h", base_h as i64);
        ptabgr.set_attr("base_g", base_g as i64);

        let mut ugmap: BTreeMap<String, BTreeSet<String>> =
            socgr.vertices().iter().map(|v| (v.id.clone(), BTreeSet::new())).collect();
        for (group, users) in gumap {
            for user in users {
                ugmap.entry(user.clone()).or_default().insert(group.clone());
            }
        }
        for (i, members) in comm.iter().enumerate() {
            let spid = &sprdgr.try_vertex(i)?.id;
            for &p in members {
                let nsid = prodgr.try_vertex(p)?.id.as_str();
                if ugmap.contains_key(nsid) {
                    continue;
                }
                for user in gumap.get(nsid).into_iter().flatten() {
                    ugmap.entry(user.clone()).or_default().insert(spid.clone());
                }
            }
        }

        info!("ptables: {} vertices, {} arcs", ptabgr.vertex_count(), ptabgr.edge_count());
        self.ptabgr = Some(ptabgr);
        self.ptbmap = Some(ugmap);
        Ok(())
    }
}

/// Graph over all producers in `prods`, in key order: arcs follow the
/// relation vertices, weighted by their relevance.
fn producer_graph(prods: &dyn KvStore<Producer>) -> SampleResult<AttrGraph> {
    let keys = prods.keys()?;
    let mut g = AttrGraph::new();
    let mut rels = Vec::with_capacity(keys.len());
    for nsid in &keys {
        let prod = prods.fetch(nsid)?;
        let size = prod.size() as f64;
        g.add_vertex(Vertex::new(nsid.as_str()).with_label(prod.label()).with_nat(Some((1.0 + size).ln())));
        let docgr = prod.docgr();
        let arcs: Vec<(String, f64)> =
            prod.prange().map(|p| (docgr.vertices()[p].id.clone(), docgr.vertices()[p].naa.unwrap_or(0.0))).collect();
        rels.push(arcs);
    }

    for (i, arcs) in rels.into_iter().enumerate() {
        for (rnsid, w) in arcs {
            match g.find(&rnsid) {
                Some(t) => {
                    g.add_edge(i, t, w)?;
                }
                None => warn!("producer graph: {} relates to unknown producer {}", keys[i], rnsid),
            }
        }
    }
    Ok(g)
}

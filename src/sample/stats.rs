//! Statistics over a generated sample
//!
//! Arc weights of the producer graph are probabilities; distances are their
//! negative logarithms, so a path's distance is the negative log of the
//! product of its weights and `exp(-d)` turns it back into a probability.

use super::taginfo::{AddrSchemeEval, IdInfo, QueryReport, TagInfo};
use super::{DynStore, SampleError, SampleResult};
use crate::algo::{dijkstra_distances, distance_view, shortest_path_tree, Direction};
use crate::config::ClosenessAggregate;
use crate::graph::{AttrGraph, BuildOptions, DegreeMode, Edge, GraphResult, Node, NodeSample, VertexId};
use crate::store::StoreResult;
use crate::util::{freq, invert_multimap, split_asc, BulkExecutor};
use comfy_table::{ContentArrangement, Table};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Write;
use tagsample_graph_algorithms::GraphView;
use tracing::info;

/// Lookup stores describing the world
pub struct WorldDbs {
    /// producer -> documents
    pub pddb: DynStore<Vec<String>>,
    /// document -> producers
    pub dppb: DynStore<Vec<String>>,
    /// document -> tags
    pub dtdb: DynStore<Vec<String>>,
    /// tag -> documents
    pub tddb: DynStore<Vec<String>>,
}

/// Closeness of an identity's routing neighbourhood to a set of targets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Closeness {
    /// Producers reachable in one step from the sources
    pub srcout: usize,
    /// Producers reaching the targets in one step
    pub dstin: usize,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    /// Mean over the sources of `exp(-distance)`, per target
    pub per_target: Vec<f64>,
}

impl Closeness {
    pub fn score(&self, aggregate: ClosenessAggregate) -> f64 {
        match aggregate {
            ClosenessAggregate::Max => self.max,
            ClosenessAggregate::Sum => self.sum,
            ClosenessAggregate::Mean => self.mean,
        }
    }
}

/// Options of [`SampleStats::print_reports`]
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Also score each step's address scheme
    pub eaddr: bool,
    /// Aligned table instead of space-separated columns
    pub pretty: bool,
    /// Skip steps below this
    pub steplo: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions { eaddr: false, pretty: false, steplo: 0x08 }
    }
}

pub struct SampleStats {
    dbs: WorldDbs,
    totalsize: usize,
    ptabgr: AttrGraph,
    prodgr: AttrGraph,
    sprdgr: AttrGraph,
    aggregate: ClosenessAggregate,
    id_p: HashMap<String, VertexId>,
    id_h: HashMap<String, VertexId>,
    dist: GraphView,
}

impl SampleStats {
    pub fn new(
        dbs: WorldDbs,
        totalsize: usize,
        ptabgr: AttrGraph,
        prodgr: AttrGraph,
        sprdgr: AttrGraph,
        aggregate: ClosenessAggregate,
    ) -> Self {
        let id_p = ptabgr.vertices().iter().enumerate().map(|(i, v)| (v.id.clone(), i)).collect();
        let id_h = prodgr.vertices().iter().enumerate().map(|(i, v)| (v.id.clone(), i)).collect();
        let dist = distance_view(&prodgr);
        SampleStats { dbs, totalsize, ptabgr, prodgr, sprdgr, aggregate, id_p, id_h, dist }
    }

    pub fn ptabgr(&self) -> &AttrGraph {
        &self.ptabgr
    }

    pub fn prodgr(&self) -> &AttrGraph {
        &self.prodgr
    }

    pub fn sprdgr(&self) -> &AttrGraph {
        &self.sprdgr
    }

    /// Sorted `(degree, count)` table of `g`
    pub fn degree_distribution(g: &AttrGraph, mode: DegreeMode) -> BTreeMap<usize, usize> {
        freq((0..g.vertex_count()).map(|v| g.degree(v, mode)))
    }

    pub fn tag_info(&self, tag: &str) -> SampleResult<TagInfo> {
        let docs = self.dbs.tddb.fetch(tag)?;

        let tagged = docs.iter().map(|d| Ok((d.as_str(), self.dbs.dtdb.fetch(d)?))).collect::<StoreResult<Vec<_>>>()?;
        let mut rel = IndexMap::new();
        for (rtag, shared) in invert_multimap(tagged) {
            let total = self.dbs.tddb.fetch(&rtag)?.len();
            rel.insert(rtag, (shared.len(), total));
        }

        let held = docs.iter().map(|d| Ok((d.as_str(), self.dbs.dppb.fetch(d)?))).collect::<StoreResult<Vec<_>>>()?;
        let mut prod = IndexMap::new();
        for (nsid, shared) in invert_multimap(held) {
            let total = self.dbs.pddb.fetch(&nsid)?.len();
            prod.insert(nsid, (shared.len(), total));
        }

        Ok(TagInfo { tag: tag.to_string(), docs, rel, prod, totalsize: self.totalsize })
    }

    pub fn id_info(&self, id: &str) -> SampleResult<IdInfo> {
        let p = &self.ptabgr;
        let vid = *self.id_p.get(id).ok_or_else(|| SampleError::UnknownId(id.to_string()))?;
        let mut out = p.successors(vid);
        out.sort_unstable();
        out.dedup();

        let end = p.vertex_count();
        let bounds = [p.base("base_z").unwrap_or(0), p.base("base_h").unwrap_or(end), p.base("base_g").unwrap_or(end)];
        let bands = split_asc(&out, &bounds);
        let ids = |vids: &[VertexId]| -> Vec<String> { vids.iter().map(|&v| p.vertices()[v].id.clone()).collect() };

        let idx = ids(&bands[1]);
        let rel: BTreeSet<VertexId> = idx
            .iter()
            .filter_map(|nsid| self.id_h.get(nsid))
            .flat_map(|&h| self.prodgr.successors(h))
            .collect();
        let rel = rel.into_iter().map(|v| self.prodgr.vertices()[v].id.clone()).collect();

        Ok(IdInfo { id: id.to_string(), soc: ids(&bands[0]), tgr: ids(&bands[2]), idx, rel })
    }

    /// Closeness between the producers an identity's routing table points at
    /// (its indexes and social contacts) and the producers holding `tag`, or
    /// every producer when `tag` is `None`.
    pub fn closeness(&self, id: &str, tag: Option<&str>) -> SampleResult<Closeness> {
        let g = &self.prodgr;
        let idi = self.id_info(id)?;
        let src: BTreeSet<VertexId> = idi.idx.iter().chain(&idi.soc).filter_map(|nsid| self.id_h.get(nsid).copied()).collect();
        let dst: Vec<VertexId> = match tag {
            None => (0..g.vertex_count()).collect(),
            Some(tag) => {
                let mut dst: Vec<VertexId> = self.tag_info(tag)?.prod.keys().filter_map(|nsid| self.id_h.get(nsid).copied()).collect();
                dst.sort_unstable();
                dst
            }
        };

        let srcout = src.iter().flat_map(|&v| g.successors(v)).collect::<HashSet<_>>().len();
        let dstin = dst.iter().flat_map(|&v| g.predecessors(v)).collect::<HashSet<_>>().len();
        if src.is_empty() {
            return Ok(Closeness { srcout, dstin, ..Default::default() });
        }

        let per_target: Vec<f64> = dst
            .iter()
            .map(|&t| {
                let d = dijkstra_distances(&self.dist, t, Direction::Incoming);
                src.iter().map(|&s| (-d[s]).exp()).sum::<f64>() / src.len() as f64
            })
            .collect();
        let sum: f64 = per_target.iter().sum();
        let max = per_target.iter().copied().fold(0.0, f64::max);
        let mean = if per_target.is_empty() { 0.0 } else { sum / per_target.len() as f64 };
        Ok(Closeness { srcout, dstin, max, sum, mean, per_target })
    }

    /// Closeness to the whole producer graph for every user, in parallel
    pub fn all_closeness<E: BulkExecutor>(&self, exec: &E) -> SampleResult<BTreeMap<String, Closeness>> {
        let users = self.ptabgr.base("base_h").unwrap_or(self.ptabgr.vertex_count());
        let ids: Vec<String> = self.ptabgr.vertices()[..users].iter().map(|v| v.id.clone()).collect();
        exec.run_all(ids, |id| self.closeness(id, None)).into_iter().map(|(id, c)| Ok((id, c?))).collect()
    }

    /// Compare an address scheme against the one grown from world data.
    ///
    /// The local scheme is the shortest-path tree over the scheme's scored
    /// tags, rooted at the first. The world scheme starts from the same root
    /// and repeatedly adds the nearest unvisited tag of the world graph
    /// around the tags visited so far, as many times as the local scheme has
    /// tags.
    pub fn evaluate_scheme(&self, scheme: &AttrGraph) -> SampleResult<AddrSchemeEval> {
        let prune = scheme.retain_vertices(|v| v.naa.is_some());
        let Some(root) = prune.vertices().first() else {
            return Err(SampleError::EmptyScheme);
        };

        let mut nodes: Vec<Node> = Vec::new();
        let mut pos: HashMap<String, usize> = HashMap::new();
        for v in prune.vertices() {
            if !pos.contains_key(&v.id) {
                pos.insert(v.id.clone(), nodes.len());
                nodes.push(self.tag_info(&v.id)?.build_node());
            }
        }

        let g = build_incomplete(&nodes)?;
        let tree = shortest_path_tree(&g.view_with(|e| arc_distance(&g, e)), 0, Direction::Outgoing);
        let trail: Vec<(VertexId, f64)> = tree.order().into_iter().map(|v| (v, tree.dist[v])).collect();
        let local = prune_to_tree(&g, &trail)?;

        let mut tinfo = self.tag_info(&root.id)?;
        let mut wnodes = vec![tinfo.build_node()];
        let mut wpos: HashMap<String, usize> = HashMap::from([(tinfo.tag.clone(), 0)]);
        let mut visit: HashSet<usize> = HashSet::from([0]);
        let mut trail: Vec<(VertexId, f64)> = vec![(0, 0.0)];
        for _ in 1..prune.vertex_count() {
            for rtag in tinfo.rel.keys() {
                if !wpos.contains_key(rtag) {
                    wpos.insert(rtag.clone(), wnodes.len());
                    wnodes.push(self.tag_info(rtag)?.build_node());
                }
            }
            // rebuilt every round; the world graph only grows
            let world = build_incomplete(&wnodes)?;
            let dist = dijkstra_distances(&world.view_with(|e| arc_distance(&world, e)), 0, Direction::Outgoing);
            let next = dist
                .iter()
                .enumerate()
                .filter(|(i, d)| !visit.contains(i) && d.is_finite())
                .min_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(&b.0)));
            let Some((index, &d)) = next else { break };
            visit.insert(index);

            tinfo = self.tag_info(&world.vertices()[index].id)?;
            match pos.get(&tinfo.tag) {
                Some(&p) => trail.push((p, d)),
                None => {
                    pos.insert(tinfo.tag.clone(), nodes.len());
                    trail.push((nodes.len(), d));
                    nodes.push(tinfo.build_node());
                }
            }
        }
        let world = prune_to_tree(&build_incomplete(&nodes)?, &trail)?;

        Ok(AddrSchemeEval { prune, local, world })
    }

    /// Print precision, recall and F1 of every report step at or above
    /// `steplo`, next to the closeness of the query's identity to its tag.
    pub fn print_reports(&self, reports: &[QueryReport], opts: ReportOptions, out: &mut dyn Write) -> SampleResult<()> {
        let mut header: Vec<String> = ["close", "steps", "precision", "recall", "f1_score"].iter().map(|s| s.to_string()).collect();
        if opts.eaddr {
            header.push("addr_scheme_score".to_string());
        }

        let mut tincache: HashMap<&str, TagInfo> = HashMap::new();
        let mut lines: Vec<Vec<String>> = Vec::new();
        let total = reports.len();
        for (i, rep) in reports.iter().enumerate() {
            let close = self.closeness(&rep.id, Some(&rep.tag))?.score(self.aggregate);
            if !tincache.contains_key(rep.tag.as_str()) {
                tincache.insert(&rep.tag, self.tag_info(&rep.tag)?);
            }
            let tinfo = &tincache[rep.tag.as_str()];

            for (&s, step) in rep.steps.range(opts.steplo..) {
                let (p, r, f) = tinfo.score_triple(&step.results);
                let mut line = vec![close.to_string(), s.to_string(), p.to_string(), r.to_string(), f.to_string()];
                if opts.eaddr {
                    line.push(match &step.scheme {
                        Some(scheme) => self.evaluate_scheme(scheme)?.score_world().to_string(),
                        None => "-".to_string(),
                    });
                }
                lines.push(line);
            }
            info!("{}/{} reports processed", i + 1, total);
        }

        if opts.pretty {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(header);
            for line in lines {
                table.add_row(line);
            }
            writeln!(out, "{}", table)?;
        } else {
            writeln!(out, "# {}", header.join(" "))?;
            for line in lines {
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        Ok(())
    }
}

/// `-ln(w * nat(target) / nat(source))`, floored at 0; unreachable when a
/// tag has no documents
fn arc_distance(g: &AttrGraph, e: &Edge) -> f64 {
    let nat = |v: VertexId| g.vertices()[v].nat.unwrap_or(0.0);
    let (ns, nt) = (nat(e.source), nat(e.target));
    if ns <= 0.0 || nt <= 0.0 || e.weight <= 0.0 {
        return f64::INFINITY;
    }
    (-(e.weight * nt / ns).ln()).max(0.0)
}

fn build_incomplete(nodes: &[Node]) -> GraphResult<AttrGraph> {
    let mut sample = NodeSample::new();
    for node in nodes {
        sample.add_node(node.clone())?;
    }
    Ok(sample.build(&BuildOptions::incomplete())?.clone())
}

/// Keep one arc into every trail vertex: the one from an earlier trail
/// vertex that minimizes its distance. Trail vertices are scored
/// `exp(-distance)`, every other vertex is left unscored.
fn prune_to_tree(g: &AttrGraph, trail: &[(VertexId, f64)]) -> GraphResult<AttrGraph> {
    let mut tree = AttrGraph::from_vertices(g.vertices().iter().cloned().map(|v| v.with_naa(None)));
    let mut placed: HashMap<VertexId, f64> = HashMap::new();
    for &(v, d) in trail {
        let parent = g
            .in_edges(v)
            .filter(|e| e.source != v)
            .filter_map(|e| placed.get(&e.source).map(|&ds| (e, ds + arc_distance(g, e))))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((e, _)) = parent {
            tree.add_edge(e.source, v, e.weight)?;
        }
        placed.insert(v, d);
        if let Some(vx) = tree.vertex_mut(v) {
            vx.naa = Some((-d).exp());
        }
    }
    Ok(tree)
}

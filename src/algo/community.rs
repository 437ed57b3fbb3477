//! Community ensemble over the producer graph
//!
//! No single partitioning is trusted. Label propagation runs are aggregated
//! into one labelling, then several dendrograms are cut at a geometric range
//! of cluster counts around their best-modularity cut. Every group any of
//! them yields is collected once, and only mid-sized groups are kept.

use super::undirected_view;
use crate::config::CommunityConfig;
use crate::graph::AttrGraph;
use crate::util::{geo_prog_range, int_unique, invert_seq, power_law_fit};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use tagsample_graph_algorithms::{
    edge_betweenness_clustering, fast_greedy, label_propagation, walktrap, Dendrogram, GraphView,
};
use tracing::{debug, info};

/// Discover communities of `prodgr`, as ascending vertex index lists.
///
/// `sizes` are the document counts of the producers; their power-law exponent
/// sets the spacing of the dendrogram cuts. Communities come out in
/// ascending order and satisfy `ln(1+N) <= |c| <= N / ln(1+N)`.
pub fn select_communities(prodgr: &AttrGraph, sizes: &[usize], cfg: &CommunityConfig, seed: u64) -> Vec<Vec<usize>> {
    let total = prodgr.vertex_count();
    let und = undirected_view(prodgr);
    let mut comm: BTreeSet<Vec<usize>> = BTreeSet::new();

    let mut rng = StdRng::seed_from_u64(seed);
    if cfg.label_propagation_runs > 0 && total > 0 {
        let runs: Vec<Vec<usize>> = (0..cfg.label_propagation_runs).map(|_| label_propagation(&und, None, &mut rng)).collect();
        // runs that agree on a vertex pair keep it together
        let mut ids: HashMap<Vec<usize>, usize> = HashMap::new();
        let initial: Vec<usize> = (0..total)
            .map(|v| {
                let tuple: Vec<usize> = runs.iter().map(|run| run[v]).collect();
                let next = ids.len();
                *ids.entry(tuple).or_insert(next)
            })
            .collect();
        let mem = label_propagation(&und, Some(&initial), &mut rng);
        add_groups(&mut comm, &mem, |i| i);
        debug!("label propagation: {} groups so far", comm.len());
    }

    let gg = und.without_isolated();
    let mut dgrams: Vec<(&str, Dendrogram, &GraphView)> = vec![("fast greedy", fast_greedy(&und), &und)];
    if cfg.edge_betweenness {
        dgrams.push(("edge betweenness", edge_betweenness_clustering(&und), &und));
    }
    dgrams.push(("walktrap", walktrap(&gg, cfg.walktrap_steps), &gg));

    let ratio = power_law_fit(sizes, cfg.xmin).unwrap_or(1.0);
    let upper = (gg.node_count / 4) as f64;
    for (name, dg, view) in &dgrams {
        let cuts = int_unique(&geo_prog_range(2.0, upper, ratio, dg.optimal_count as f64));
        for n in cuts {
            let mem = match dg.cut(n) {
                Ok(mem) => mem,
                Err(e) => {
                    debug!("{}: {}", name, e);
                    continue;
                }
            };
            add_groups(&mut comm, &mem, |i| view.index_to_node[i]);
        }
        debug!("{}: {} groups so far", name, comm.len());
    }

    let lo = (1.0 + total as f64).ln();
    let hi = total as f64 / lo;
    let kept: Vec<Vec<usize>> = comm.into_iter().filter(|c| lo <= c.len() as f64 && c.len() as f64 <= hi).collect();
    info!("communities: {} selected", kept.len());
    kept
}

fn add_groups(comm: &mut BTreeSet<Vec<usize>>, membership: &[usize], node: impl Fn(usize) -> usize) {
    for group in invert_seq(membership).into_values() {
        let mut ids: Vec<usize> = group.into_iter().map(&node).collect();
        ids.sort_unstable();
        comm.insert(ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Vertex;

    /// Four 5-cliques joined in a ring by single arcs, plus two isolated vertices
    fn ring_of_cliques() -> AttrGraph {
        let mut g = AttrGraph::from_vertices((0..22).map(|i| Vertex::new(format!("p{}", i))));
        for c in 0..4 {
            let base = c * 5;
            for a in 0..5 {
                for b in a + 1..5 {
                    g.add_edge(base + a, base + b, 0.5).unwrap();
                }
            }
            g.add_edge(base, (base + 5) % 20, 0.1).unwrap();
        }
        g
    }

    #[test]
    fn test_size_filter() {
        let g = ring_of_cliques();
        let sizes: Vec<usize> = (0..22).map(|i| 6 + i % 7).collect();
        let comm = select_communities(&g, &sizes, &CommunityConfig::default(), 7);
        let n = g.vertex_count() as f64;
        let lo = (1.0 + n).ln();
        assert!(!comm.is_empty());
        for c in &comm {
            assert!(lo <= c.len() as f64 && c.len() as f64 <= n / lo, "bad size {}", c.len());
            assert!(c.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(comm.contains(&(0..5).collect::<Vec<_>>()));
    }

    #[test]
    fn test_deterministic() {
        let g = ring_of_cliques();
        let sizes = vec![8; 22];
        let cfg = CommunityConfig { edge_betweenness: false, ..Default::default() };
        assert_eq!(select_communities(&g, &sizes, &cfg, 3), select_communities(&g, &sizes, &cfg, 3));
    }

    #[test]
    fn test_empty_graph() {
        let g = AttrGraph::new();
        assert!(select_communities(&g, &[], &CommunityConfig::default(), 0).is_empty());
    }
}

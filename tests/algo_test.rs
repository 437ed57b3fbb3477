use tagsample::algo::{
    dijkstra_distances, distance_view, edge_betweenness_clustering, fast_greedy, select_communities, undirected_view,
    walktrap, Dendrogram, Direction,
};
use tagsample::config::CommunityConfig;
use tagsample::graph::Vertex;
use tagsample::AttrGraph;

/// Two 4-cliques {0..4} and {4..8} joined by a single arc 3 -> 4, plus
/// `isolated` vertices after them
fn two_cliques(isolated: usize) -> AttrGraph {
    let mut g = AttrGraph::from_vertices((0..8 + isolated).map(|i| Vertex::new(format!("p{}", i))));
    for base in [0, 4] {
        for a in 0..4 {
            for b in a + 1..4 {
                g.add_edge(base + a, base + b, 0.5).unwrap();
            }
        }
    }
    g.add_edge(3, 4, 0.1).unwrap();
    g
}

fn assert_splits_cliques(name: &str, dg: &Dendrogram) {
    let mem = dg.cut(2).unwrap();
    for v in 1..4 {
        assert_eq!(mem[v], mem[0], "{}: {} left its clique", name, v);
        assert_eq!(mem[4 + v], mem[4], "{}: {} left its clique", name, 4 + v);
    }
    assert_ne!(mem[0], mem[4], "{}: cliques merged", name);
}

#[test]
fn test_dendrograms_split_cliques() {
    let g = two_cliques(0);
    let und = undirected_view(&g);

    let fg = fast_greedy(&und);
    assert_eq!(fg.optimal_count, 2);
    assert_splits_cliques("fast greedy", &fg);
    assert_splits_cliques("edge betweenness", &edge_betweenness_clustering(&und));
    assert_splits_cliques("walktrap", &walktrap(&und, 4));
}

#[test]
fn test_cut_out_of_range() {
    let g = two_cliques(0);
    let dg = fast_greedy(&undirected_view(&g));
    assert!(dg.cut(0).is_err());
    assert!(dg.cut(9).is_err());
    assert_eq!(dg.cut(8).unwrap().len(), 8);
}

#[test]
fn test_distances_across_bridge() {
    let g = two_cliques(1);
    let view = distance_view(&g);
    let dist = dijkstra_distances(&view, 0, Direction::Outgoing);
    let expected = 2f64.ln() + 10f64.ln();
    assert!((dist[4] - expected).abs() < 1e-12);
    assert!(dist[8].is_infinite());

    let back = dijkstra_distances(&view, 4, Direction::Incoming);
    assert!((back[0] - expected).abs() < 1e-12);
}

#[test]
fn test_ensemble_keeps_cliques() {
    let g = two_cliques(2);
    let sizes = vec![10; g.vertex_count()];
    let cfg = CommunityConfig { edge_betweenness: false, ..Default::default() };
    let comm = select_communities(&g, &sizes, &cfg, 11);

    let n = g.vertex_count() as f64;
    let lo = (1.0 + n).ln();
    for c in &comm {
        assert!(lo <= c.len() as f64 && c.len() as f64 <= n / lo, "bad size {}", c.len());
    }
    assert!(comm.contains(&vec![0, 1, 2, 3]));
    assert!(comm.contains(&vec![4, 5, 6, 7]));
    assert!(comm.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_ensemble_seeded() {
    let g = two_cliques(2);
    let sizes: Vec<usize> = (0..g.vertex_count()).map(|i| 3 + i).collect();
    let a = select_communities(&g, &sizes, &CommunityConfig::default(), 5);
    let b = select_communities(&g, &sizes, &CommunityConfig::default(), 5);
    assert_eq!(a, b);
}

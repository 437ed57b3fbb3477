//! Girvan-Newman divisive clustering
//!
//! Repeatedly removes the edge of highest betweenness; the removal order read
//! backwards yields the merge dendrogram. Betweenness is recomputed after every
//! removal, with the per-source BFS passes spread over the rayon pool.

use super::common::GraphView;
use super::dendrogram::Dendrogram;
use rayon::prelude::*;
use std::collections::VecDeque;

/// Brandes edge betweenness over the active edges, unweighted.
fn edge_betweenness(n: usize, adj: &[Vec<(usize, usize)>], active: &[bool]) -> Vec<f64> {
    let m = active.len();
    (0..n)
        .into_par_iter()
        .map(|s| {
            let mut eb = vec![0.0f64; m];
            let mut sigma = vec![0.0f64; n];
            let mut dist = vec![usize::MAX; n];
            let mut preds: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
            let mut stack = Vec::with_capacity(n);
            let mut queue = VecDeque::new();

            sigma[s] = 1.0;
            dist[s] = 0;
            queue.push_back(s);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &(w, e) in &adj[v] {
                    if !active[e] {
                        continue;
                    }
                    if dist[w] == usize::MAX {
                        dist[w] = dist[v] + 1;
                        queue.push_back(w);
                    }
                    if dist[w] == dist[v] + 1 {
                        sigma[w] += sigma[v];
                        preds[w].push((v, e));
                    }
                }
            }

            let mut delta = vec![0.0f64; n];
            while let Some(w) = stack.pop() {
                for &(v, e) in &preds[w] {
                    let c = sigma[v] / sigma[w] * (1.0 + delta[w]);
                    eb[e] += c;
                    delta[v] += c;
                }
            }
            eb
        })
        .reduce(
            || vec![0.0; m],
            |mut acc, part| {
                for (a, p) in acc.iter_mut().zip(part) {
                    *a += p;
                }
                acc
            },
        )
}

/// Edge-betweenness hierarchical clustering on an undirected view.
pub fn edge_betweenness_clustering(view: &GraphView) -> Dendrogram {
    let n = view.node_count;
    let edges = view.undirected_edges();
    let mut adj: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (e, &(u, v)) in edges.iter().enumerate() {
        adj[u].push((v, e));
        adj[v].push((u, e));
    }

    let mut active = vec![true; edges.len()];
    let mut removed = Vec::with_capacity(edges.len());
    for _ in 0..edges.len() {
        let eb = edge_betweenness(n, &adj, &active);
        let mut best: Option<(f64, usize)> = None;
        for (e, &score) in eb.iter().enumerate() {
            if active[e] && best.map_or(true, |(b, _)| score > b + 1e-9) {
                best = Some((score, e));
            }
        }
        let Some((_, e)) = best else { break };
        active[e] = false;
        removed.push(e);
    }

    // Replay removals backwards: an edge joining two clusters is a merge.
    let mut root: Vec<usize> = (0..n).collect();
    let mut cluster_id: Vec<usize> = (0..n).collect();
    let mut merges = Vec::new();
    fn find(root: &mut [usize], i: usize) -> usize {
        if root[i] != i {
            root[i] = find(root, root[i]);
        }
        root[i]
    }
    for &e in removed.iter().rev() {
        let (u, v) = edges[e];
        let (ru, rv) = (find(&mut root, u), find(&mut root, v));
        if ru == rv {
            continue;
        }
        merges.push((cluster_id[ru], cluster_id[rv]));
        root[rv] = ru;
        cluster_id[ru] = n + merges.len() - 1;
    }

    Dendrogram::from_merges(view, merges)
}

//! Pathfinding algorithms
//!
//! Single-source Dijkstra over weighted views, following arcs forwards or backwards.

use super::common::GraphView;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Which arcs to follow from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow arcs source -> target (distances *from* the source)
    Outgoing,
    /// Follow arcs target -> source (distances *to* the source)
    Incoming,
}

/// Shortest-path tree rooted at a single node
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    pub root: usize,
    /// Distance of every node from the root; `f64::INFINITY` if unreachable
    pub dist: Vec<f64>,
    /// Predecessor on the shortest path, `None` for the root and unreachable nodes
    pub parent: Vec<Option<usize>>,
}

impl ShortestPathTree {
    /// Reachable nodes ordered by ascending distance, ties by index.
    pub fn order(&self) -> Vec<usize> {
        let mut reached: Vec<usize> = (0..self.dist.len()).filter(|&i| self.dist[i].is_finite()).collect();
        reached.sort_by(|&a, &b| self.dist[a].partial_cmp(&self.dist[b]).unwrap_or(Ordering::Equal).then(a.cmp(&b)));
        reached
    }
}

/// State for Dijkstra priority queue
#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node_idx: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare costs reversed for min-heap, ties go to the lower index
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_idx.cmp(&self.node_idx))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra's Algorithm (Weighted Shortest Paths) from one node to every node.
///
/// Uses edge weights from GraphView if available, otherwise assumes 1.0.
/// Negative and non-finite weights are treated as missing arcs.
pub fn shortest_path_tree(view: &GraphView, root: usize, direction: Direction) -> ShortestPathTree {
    let n = view.node_count;
    let mut dist = vec![f64::INFINITY; n];
    let mut parent = vec![None; n];
    let mut heap = BinaryHeap::new();

    if root < n {
        dist[root] = 0.0;
        heap.push(State { cost: 0.0, node_idx: root });
    }

    while let Some(State { cost, node_idx }) = heap.pop() {
        if cost > dist[node_idx] {
            continue;
        }

        let (edges, weights) = match direction {
            Direction::Outgoing => (view.successors(node_idx), view.weights(node_idx)),
            Direction::Incoming => (view.predecessors(node_idx), view.in_weights(node_idx)),
        };

        for (i, &next_idx) in edges.iter().enumerate() {
            let weight = weights.map_or(1.0, |w| w[i]);
            if weight < 0.0 || !weight.is_finite() {
                continue;
            }

            let next_cost = cost + weight;
            if next_cost < dist[next_idx] {
                dist[next_idx] = next_cost;
                parent[next_idx] = Some(node_idx);
                heap.push(State { cost: next_cost, node_idx: next_idx });
            }
        }
    }

    ShortestPathTree { root, dist, parent }
}

/// Distances from `source` to every node (or to `source` from every node, for
/// [`Direction::Incoming`]).
pub fn dijkstra_distances(view: &GraphView, source: usize, direction: Direction) -> Vec<f64> {
    shortest_path_tree(view, source, direction).dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> GraphView {
        // 0->1 (10.0), 1->2 (5.0), 0->2 (50.0)
        GraphView::from_edges(3, &[(0, 1), (1, 2), (0, 2)], Some(&[10.0, 5.0, 50.0]))
    }

    #[test]
    fn test_dijkstra_outgoing() {
        let tree = shortest_path_tree(&sample_view(), 0, Direction::Outgoing);
        assert_eq!(tree.dist, vec![0.0, 10.0, 15.0]);
        assert_eq!(tree.parent, vec![None, Some(0), Some(1)]);
        assert_eq!(tree.order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dijkstra_incoming() {
        let dist = dijkstra_distances(&sample_view(), 2, Direction::Incoming);
        assert_eq!(dist, vec![15.0, 5.0, 0.0]);
    }

    #[test]
    fn test_unreachable_is_infinite() {
        let view = GraphView::from_edges(3, &[(0, 1)], None);
        let dist = dijkstra_distances(&view, 1, Direction::Outgoing);
        assert_eq!(dist[1], 0.0);
        assert!(dist[0].is_infinite());
        assert!(dist[2].is_infinite());
    }
}

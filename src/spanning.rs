//! Per-cluster maximum-similarity spanning trees.
//!
//! Prim's algorithm over the complete intra-cluster graph with cost
//! `1 − similarity`, so the tree keeps the strongest links. Each cluster of
//! `M ≥ 2` members yields exactly `M − 1` edges; emitted edges carry the
//! similarity, not the cost.
//!
//! Growth starts at the first (lowest-row) member of each cluster. Equal-cost
//! frontier entries are popped in `(tree node, new node)` order, which makes
//! the tree independent of heap internals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::core::{ClusterPartition, EmbeddingMatrix};
use crate::graph::Edge;

/// Frontier entry, indices local to the cluster member list.
#[derive(Clone, Copy, Debug)]
struct FrontierEdge {
    cost: f64,
    sim: f64,
    from: usize,
    to: usize,
}

// Reversed so BinaryHeap pops the cheapest entry first
impl Ord for FrontierEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.from.cmp(&self.from))
            .then_with(|| other.to.cmp(&self.to))
    }
}

impl PartialOrd for FrontierEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEdge {}

/// Spanning tree over `members` (global row indices), as global edges.
pub fn cluster_spanning_tree(matrix: &EmbeddingMatrix, members: &[usize]) -> Vec<Edge> {
    let m = members.len();
    if m < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; m];
    let mut heap = BinaryHeap::with_capacity(m);
    let mut tree = Vec::with_capacity(m - 1);

    let push_from = |heap: &mut BinaryHeap<FrontierEdge>, in_tree: &[bool], u: usize| {
        for v in 0..m {
            if in_tree[v] {
                continue;
            }
            let sim = matrix.dot(members[u], members[v]);
            heap.push(FrontierEdge {
                cost: 1.0 - sim,
                sim,
                from: u,
                to: v,
            });
        }
    };

    in_tree[0] = true;
    push_from(&mut heap, &in_tree, 0);

    while tree.len() < m - 1 {
        let Some(FrontierEdge { sim, from, to, .. }) = heap.pop() else {
            break;
        };
        // stale entry: target already reached through a cheaper edge
        if in_tree[to] {
            continue;
        }
        in_tree[to] = true;
        trace!("tree edge {} - {} (sim {:.4})", members[from], members[to], sim);
        tree.push(Edge::new(members[from], members[to], sim));
        push_from(&mut heap, &in_tree, to);
    }

    tree
}

/// Adds a spanning tree per cluster so every cluster is internally connected.
pub struct ConnectivityAugmenter<'a> {
    matrix: &'a EmbeddingMatrix,
    partition: &'a ClusterPartition,
}

impl<'a> ConnectivityAugmenter<'a> {
    pub fn new(matrix: &'a EmbeddingMatrix, partition: &'a ClusterPartition) -> Self {
        Self { matrix, partition }
    }

    /// Tree edges for every cluster, clusters in ascending id order.
    pub fn augment(&self) -> Vec<Edge> {
        let clusters: Vec<_> = self
            .partition
            .iter()
            .filter(|(_, members)| members.len() >= 2)
            .collect();
        info!(
            "Building spanning trees for {} of {} clusters",
            clusters.len(),
            self.partition.len()
        );

        let trees: Vec<Vec<Edge>> = clusters
            .par_iter()
            .map(|(_, members)| cluster_spanning_tree(self.matrix, members))
            .collect();

        for ((cid, members), tree) in clusters.iter().zip(&trees) {
            debug!("Cluster {}: {} members → {} tree edges", cid, members.len(), tree.len());
        }
        trees.into_iter().flatten().collect()
    }
}

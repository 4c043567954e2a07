//! Undirected similarity edges, edge merging and the sparse adjacency view.
//!
//! Two edge sources feed the graph: per-row neighbour lists from
//! [`crate::neighbors`] and per-cluster spanning trees from [`crate::spanning`].
//! [`EdgeDeduplicator`] merges them into a single list keyed by the canonical
//! pair `(a, b)` with `a < b`; the first weight seen for a pair wins.

use std::collections::HashSet;

use log::{debug, info, trace};
use sprs::{CsMat, TriMat};

use crate::neighbors::NeighborLists;

/// Undirected weighted edge between two row indices, stored with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

impl Edge {
    /// Build an edge in canonical order.
    #[inline]
    pub fn new(u: usize, v: usize, weight: f64) -> Self {
        let (a, b) = if u < v { (u, v) } else { (v, u) };
        Self { a, b, weight }
    }

    #[inline]
    pub fn key(&self) -> (usize, usize) {
        (self.a, self.b)
    }
}

/// Fraction of the similarity floor a spanning-tree edge must reach to be kept.
pub const TREE_EDGE_FLOOR_RATIO: f64 = 0.5;

/// Order-preserving merge of edge sources with a global seen-set.
#[derive(Debug, Default)]
pub struct EdgeDeduplicator {
    seen: HashSet<(usize, usize)>,
    edges: Vec<Edge>,
}

impl EdgeDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `(u, v)` unless the unordered pair is already present or `u == v`.
    /// Returns whether the edge was added.
    pub fn emit(&mut self, u: usize, v: usize, weight: f64) -> bool {
        if u == v {
            return false;
        }
        let edge = Edge::new(u, v, weight);
        if !self.seen.insert(edge.key()) {
            trace!("Skipping duplicate edge ({}, {})", edge.a, edge.b);
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Neighbour lists, in row order then list order.
    pub fn extend_neighbors(&mut self, neighbors: &NeighborLists) -> usize {
        let mut added = 0;
        for (i, row) in neighbors.iter().enumerate() {
            for &(j, sim) in row {
                if self.emit(i, j, sim) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Spanning-tree edges whose similarity reaches `min_sim * 0.5`.
    pub fn extend_tree(&mut self, tree: &[Edge], min_sim: f64) -> usize {
        let floor = min_sim * TREE_EDGE_FLOOR_RATIO;
        let mut added = 0;
        for e in tree {
            if e.weight >= floor && self.emit(e.a, e.b, e.weight) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn into_edges(self) -> Vec<Edge> {
        self.edges
    }

    /// Merge neighbour edges first, then the filtered spanning-tree edges.
    pub fn merge(neighbors: &NeighborLists, tree: &[Edge], min_sim: f64) -> Vec<Edge> {
        let mut dedup = Self::new();
        let from_neighbors = dedup.extend_neighbors(neighbors);
        let from_tree = dedup.extend_tree(tree, min_sim);
        info!(
            "Merged edges: {} from neighbour lists, {} of {} spanning-tree edges fill gaps",
            from_neighbors,
            from_tree,
            tree.len()
        );
        dedup.into_edges()
    }
}

/// Symmetric CSR adjacency over `n` nodes.
///
/// Edges with non-positive weight and self loops are dropped; the remaining
/// weights are written in both directions.
pub fn adjacency_matrix(n: usize, edges: &[Edge]) -> CsMat<f64> {
    let mut triplets = TriMat::new((n, n));
    let mut kept = 0usize;
    for e in edges {
        if e.a == e.b || e.weight <= 0.0 || e.b >= n {
            continue;
        }
        triplets.add_triplet(e.a, e.b, e.weight);
        triplets.add_triplet(e.b, e.a, e.weight);
        kept += 1;
    }
    let adjacency: CsMat<f64> = triplets.to_csr();
    debug!(
        "Adjacency {}×{}: {} undirected edges, {} non-zeros",
        n,
        n,
        kept,
        adjacency.nnz()
    );
    adjacency
}

/// Number of connected components of the graph over `n` nodes.
pub fn connected_components(n: usize, edges: &[Edge]) -> usize {
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut components = n;
    for e in edges {
        if e.b >= n {
            continue;
        }
        let (ra, rb) = (find(&mut parent, e.a), find(&mut parent, e.b));
        if ra != rb {
            parent[ra] = rb;
            components -= 1;
        }
    }
    components
}

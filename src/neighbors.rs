//! # Top-K cosine neighbour lists over unit-norm embeddings
//!
//! ## Algorithm
//!
//! 1. **Batching**: rows are processed in batches so that the similarity block
//!    held in memory never exceeds [`MAX_BLOCK_ELEMS`] values, whatever N is.
//! 2. **Similarity block**: for each batch the full `batch × candidates` block of
//!    dot products is computed (cosine, since rows are unit-norm). Candidates are
//!    all rows, or only the rows of the same cluster when restricted.
//! 3. **Partial selection**: each row keeps its best K candidates with a bounded
//!    min-heap (`O(M log K)` per row instead of a full sort), after dropping the
//!    self pair and anything below the similarity floor.
//! 4. **Ordering**: only the K survivors are sorted, similarity descending, ties
//!    broken by row index ascending.
//!
//! Rows within a batch are independent, so selection runs on rayon; each row is
//! computed in a fixed order and the output is identical for any thread count.
//!
//! ## Edge cases
//!
//! - `N ≤ 1` yields empty lists.
//! - Fewer than K candidates above the floor yields a shorter list; lists are
//!   never padded.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{ClusterPartition, EmbeddingMatrix};

/// Per-row neighbour lists: `lists[i]` holds `(j, similarity)` pairs.
pub type NeighborLists = Vec<Vec<(usize, f64)>>;

/// Above this many rows the nominal batch shrinks.
pub const LARGE_CORPUS_ROWS: usize = 20_000;

/// Ceiling on the number of similarity values held per batch (128 MiB of f64).
pub const MAX_BLOCK_ELEMS: usize = 1 << 24;

/// Neighbour-search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborParams {
    /// Maximum neighbours kept per row.
    pub top_k: usize,
    /// Similarity floor; candidates below it are dropped.
    pub min_sim: f64,
    /// Restrict candidates to the row's own cluster.
    pub same_cluster_only: bool,
}

impl Default for NeighborParams {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_sim: 0.85,
            same_cluster_only: false,
        }
    }
}

/// Rows per batch for a corpus of `n` rows scored against `m` candidates.
pub fn batch_size_for(n: usize, m: usize) -> usize {
    let nominal = if n > LARGE_CORPUS_ROWS { 1024 } else { 4096 };
    let budget = (MAX_BLOCK_ELEMS / m.max(1)).max(1);
    nominal.min(budget)
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    sim: f64,
    idx: usize,
}

// Greater means better: higher similarity, then lower index
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sim
            .total_cmp(&other.sim)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Best `k` entries of `(candidates[c], sims[c])` for row `i`.
///
/// Skips the self pair, non-finite values and anything below `min_sim`.
/// Output is sorted by similarity descending, then index ascending.
pub fn select_top_k(
    i: usize,
    candidates: &[usize],
    sims: &[f64],
    k: usize,
    min_sim: f64,
) -> Vec<(usize, f64)> {
    debug_assert_eq!(candidates.len(), sims.len());
    if k == 0 {
        return Vec::new();
    }

    // min-heap of the current best k; the root is the weakest survivor
    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);
    for (&idx, &sim) in candidates.iter().zip(sims) {
        if idx == i || !sim.is_finite() || sim < min_sim {
            continue;
        }
        let cand = Candidate { sim, idx };
        if heap.len() < k {
            heap.push(Reverse(cand));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if cand > *worst {
                heap.pop();
                heap.push(Reverse(cand));
            }
        }
    }

    // ascending order of Reverse(..) is best-first
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(c)| (c.idx, c.sim))
        .collect()
}

/// Dot products of each row in `rows` against each of `candidates`,
/// laid out row-major as `rows.len() × candidates.len()`.
fn similarity_block(matrix: &EmbeddingMatrix, rows: &[usize], candidates: &[usize]) -> Vec<f64> {
    let m = candidates.len();
    let mut block = vec![0.0; rows.len() * m];
    if m == 0 {
        return block;
    }
    block
        .par_chunks_mut(m)
        .zip(rows.par_iter())
        .for_each(|(dst, &i)| {
            let ri = matrix.row(i);
            for (d, &j) in dst.iter_mut().zip(candidates) {
                *d = ri.iter().zip(matrix.row(j)).map(|(a, b)| a * b).sum();
            }
        });
    block
}

/// Computes top-K neighbour lists for every row of an embedding matrix.
pub struct NeighborGraphBuilder<'a> {
    matrix: &'a EmbeddingMatrix,
    params: NeighborParams,
    partition: Option<&'a ClusterPartition>,
    batch_size: Option<usize>,
}

impl<'a> NeighborGraphBuilder<'a> {
    pub fn new(matrix: &'a EmbeddingMatrix, params: NeighborParams) -> Self {
        Self {
            matrix,
            params,
            partition: None,
            batch_size: None,
        }
    }

    /// Cluster partition used when `same_cluster_only` is set.
    pub fn with_partition(mut self, partition: &'a ClusterPartition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Override the automatic batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    pub fn build(&self) -> NeighborLists {
        let n = self.matrix.nrows();
        info!(
            "Computing neighbour lists: N={}, top_k={}, min_sim={}, same_cluster_only={}",
            n, self.params.top_k, self.params.min_sim, self.params.same_cluster_only
        );
        if n <= 1 {
            debug!("N={} → no neighbour edges", n);
            return vec![Vec::new(); n];
        }

        let lists = match (self.params.same_cluster_only, self.partition) {
            (true, Some(partition)) => self.build_per_cluster(partition),
            (true, None) => {
                warn!("same_cluster_only requested without a partition; searching globally");
                self.build_global()
            }
            (false, _) => self.build_global(),
        };

        let total: usize = lists.iter().map(|l| l.len()).sum();
        let empty = lists.iter().filter(|l| l.is_empty()).count();
        debug!(
            "Neighbour lists built: {} directed pairs, {} rows without neighbours",
            total, empty
        );
        lists
    }

    fn build_global(&self) -> NeighborLists {
        let n = self.matrix.nrows();
        let candidates: Vec<usize> = (0..n).collect();
        let batch = self.batch_size.unwrap_or_else(|| batch_size_for(n, n));
        debug!("Global search in batches of {} rows", batch);

        let mut lists: NeighborLists = Vec::with_capacity(n);
        for (b, rows) in candidates.chunks(batch).enumerate() {
            trace!("Batch {}: rows {}..{}", b, rows[0], rows[rows.len() - 1] + 1);
            lists.extend(self.select_batch(rows, &candidates));
        }
        lists
    }

    fn build_per_cluster(&self, partition: &ClusterPartition) -> NeighborLists {
        let n = self.matrix.nrows();
        let mut lists: NeighborLists = vec![Vec::new(); n];
        for (cid, members) in partition.iter() {
            if members.len() < 2 {
                continue;
            }
            let batch = self
                .batch_size
                .unwrap_or_else(|| batch_size_for(n, members.len()));
            trace!("Cluster {}: {} members, batch {}", cid, members.len(), batch);
            for rows in members.chunks(batch) {
                for (&i, list) in rows.iter().zip(self.select_batch(rows, members)) {
                    lists[i] = list;
                }
            }
        }
        lists
    }

    fn select_batch(&self, rows: &[usize], candidates: &[usize]) -> NeighborLists {
        let block = similarity_block(self.matrix, rows, candidates);
        let m = candidates.len();
        let (k, min_sim) = (self.params.top_k, self.params.min_sim);
        rows.par_iter()
            .enumerate()
            .map(|(r, &i)| select_top_k(i, candidates, &block[r * m..(r + 1) * m], k, min_sim))
            .collect()
    }
}

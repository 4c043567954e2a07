//! Optional cluster assignment for corpora that arrive without cluster ids.
//!
//! The graph pipeline consumes cluster ids as given; this helper only exists
//! so callers can derive a partition from the embeddings themselves.
//!
//! **DETERMINISTIC**: k-means is seeded by the caller (default [`KMEANS_SEED`]).

use log::{debug, info};
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::core::{ClusterId, EmbeddingMatrix};
use crate::error::{GraphError, GraphResult};

/// Default number of clusters.
pub const DEFAULT_K: usize = 8;

/// Default seed for deterministic assignment.
pub const KMEANS_SEED: u64 = 42;

/// Assign every row of `matrix` to one of `k` clusters with Lloyd's k-means.
///
/// `k` is capped at the number of rows. Returned ids are `0..k`, one per row
/// in row order.
pub fn kmeans_assign(
    matrix: &EmbeddingMatrix,
    k: usize,
    max_iter: usize,
    seed: u64,
) -> GraphResult<Vec<ClusterId>> {
    if matrix.is_empty() {
        return Err(GraphError::EmptyInput);
    }
    if k == 0 || max_iter == 0 {
        return Err(GraphError::InvalidParameter(format!(
            "k-means needs k ≥ 1 and max_iter ≥ 1 (got k={k}, max_iter={max_iter})"
        )));
    }

    let (n, d) = matrix.shape();
    let k = k.min(n);
    info!("k-means over {}×{} embeddings: k={}, max_iter={}", n, d, k, max_iter);

    let x = matrix.to_dense();
    let params = KMeansParameters {
        k,
        max_iter,
        seed: Some(seed),
    };

    let km: KMeans<f64, usize, DenseMatrix<f64>, Vec<usize>> =
        KMeans::fit(&x, params).map_err(|e| GraphError::Clustering(e.to_string()))?;
    let labels = km
        .predict(&x)
        .map_err(|e| GraphError::Clustering(e.to_string()))?;

    let assignments: Vec<ClusterId> = labels.into_iter().map(|l| l as ClusterId).collect();
    debug!(
        "k-means produced {} distinct clusters",
        assignments
            .iter()
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );
    Ok(assignments)
}

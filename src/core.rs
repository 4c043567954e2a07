//! Items, the dense embedding matrix and the cluster partition.
//!
//! These are the inputs every stage of the pipeline reads:
//!
//! - [`Item`]: an opaque id, an upstream cluster id and optional display metadata.
//! - [`EmbeddingMatrix`]: the dense, row-major stack of unit-norm vectors. The row
//!   index is the only join key used internally; the item id is carried alongside
//!   for output.
//! - [`ClusterPartition`]: cluster id → row indices, derived once and read-only
//!   afterwards.
//!
//! # Examples
//!
//! ```
//! use simgraph::core::{ClusterPartition, EmbeddingMatrix};
//!
//! let m = EmbeddingMatrix::from_rows(
//!     vec!["a".into(), "b".into()],
//!     vec![vec![3.0, 4.0], vec![0.0, 2.0]],
//! ).unwrap();
//!
//! assert_eq!(m.shape(), (2, 2));
//! assert!((m.dot(0, 1) - 0.8).abs() < 1e-9);
//!
//! let p = ClusterPartition::from_assignments(&[0, 0]);
//! assert_eq!(p.members(0), Some(&[0usize, 1][..]));
//! ```
//!
//! # Invariants
//!
//! - Every row of an `EmbeddingMatrix` has the same length and unit L2 norm
//!   (up to the `1e-12` guard used for zero vectors).
//! - Row order is fixed for the lifetime of the matrix.

use std::collections::BTreeMap;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{GraphError, GraphResult};
use crate::store::VectorStore;

/// Cluster identifier assigned upstream. Negative ids (noise) are legal.
pub type ClusterId = i64;

/// Guard added to the norm before dividing, so zero vectors stay zero.
pub const NORM_EPS: f64 = 1e-12;

/// Display metadata carried through to the output nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub published: Option<String>,
    pub domain: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
}

/// One corpus entry as seen by the graph pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub cluster_id: ClusterId,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl Item {
    pub fn new(id: impl Into<String>, cluster_id: ClusterId) -> Self {
        Self {
            id: id.into(),
            cluster_id,
            metadata: ItemMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Scale `v` in place to unit L2 norm.
#[inline]
pub fn l2_normalise(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let inv = 1.0 / (norm + NORM_EPS);
    v.iter_mut().for_each(|x| *x *= inv);
}

/// Dense row-major matrix of unit-norm embeddings, one row per item.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingMatrix {
    nrows: usize,
    dim: usize,
    data: Vec<f64>,
    ids: Vec<String>,
}

impl EmbeddingMatrix {
    /// Stack the vectors for `ids` out of `store`, in the given order.
    ///
    /// Fails if `ids` is empty, if the store is empty, if any id has no vector,
    /// or if a vector does not match the store dimension. Rows are copied and
    /// re-normalised; the store is never mutated.
    pub fn stack<S: VectorStore + ?Sized>(store: &S, ids: &[String]) -> GraphResult<Self> {
        if ids.is_empty() {
            return Err(GraphError::EmptyInput);
        }
        let dim = match store.dim() {
            Some(d) if !store.is_empty() => d,
            _ => return Err(GraphError::NoEmbeddings),
        };

        let missing = ids.iter().filter(|id| store.get(id).is_none()).count();
        if missing > 0 {
            return Err(GraphError::MissingEmbeddings {
                missing,
                total: ids.len(),
            });
        }

        info!("Stacking {} embeddings of dimension {}", ids.len(), dim);
        let mut data = Vec::with_capacity(ids.len() * dim);
        for id in ids {
            // presence checked above
            let v = store.get(id).unwrap_or(&[]);
            if v.len() != dim {
                return Err(GraphError::DimensionMismatch {
                    id: id.clone(),
                    expected: dim,
                    found: v.len(),
                });
            }
            let start = data.len();
            data.extend_from_slice(v);
            l2_normalise(&mut data[start..]);
        }

        Ok(Self {
            nrows: ids.len(),
            dim,
            data,
            ids: ids.to_vec(),
        })
    }

    /// Build directly from owned rows. The first row fixes the dimension.
    pub fn from_rows(ids: Vec<String>, rows: Vec<Vec<f64>>) -> GraphResult<Self> {
        if rows.is_empty() {
            return Err(GraphError::EmptyInput);
        }
        if ids.len() != rows.len() {
            return Err(GraphError::InvalidParameter(format!(
                "{} ids for {} rows",
                ids.len(),
                rows.len()
            )));
        }
        let dim = rows[0].len();
        if dim == 0 {
            return Err(GraphError::NoEmbeddings);
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for (id, row) in ids.iter().zip(rows.iter()) {
            if row.len() != dim {
                return Err(GraphError::DimensionMismatch {
                    id: id.clone(),
                    expected: dim,
                    found: row.len(),
                });
            }
            let start = data.len();
            data.extend_from_slice(row);
            l2_normalise(&mut data[start..]);
        }
        debug!("EmbeddingMatrix built from {} rows × {}", rows.len(), dim);

        Ok(Self {
            nrows: rows.len(),
            dim,
            data,
            ids,
        })
    }

    /// (rows, dimension)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.dim)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Zero-copy view of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Cosine similarity of rows `i` and `j` (plain dot product on unit rows).
    #[inline]
    pub fn dot(&self, i: usize, j: usize) -> f64 {
        self.row(i)
            .iter()
            .zip(self.row(j))
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Dot product of row `i` against every row in `candidates`, in order.
    pub fn dot_many(&self, i: usize, candidates: &[usize]) -> Vec<f64> {
        candidates.iter().map(|&j| self.dot(i, j)).collect()
    }

    /// Copy into a smartcore dense matrix (N × dim).
    pub fn to_dense(&self) -> DenseMatrix<f64> {
        trace!("Copying {}×{} embeddings into DenseMatrix", self.nrows, self.dim);
        DenseMatrix::from_iterator(self.data.iter().copied(), self.nrows, self.dim, 0)
    }
}

/// Cluster id → ascending row indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterPartition {
    clusters: BTreeMap<ClusterId, Vec<usize>>,
    assignments: Vec<ClusterId>,
}

impl ClusterPartition {
    /// Derive the partition from per-row cluster ids.
    pub fn from_assignments(assignments: &[ClusterId]) -> Self {
        let mut clusters: BTreeMap<ClusterId, Vec<usize>> = BTreeMap::new();
        for (row, &cid) in assignments.iter().enumerate() {
            clusters.entry(cid).or_default().push(row);
        }
        debug!(
            "ClusterPartition: {} rows in {} clusters",
            assignments.len(),
            clusters.len()
        );
        Self {
            clusters,
            assignments: assignments.to_vec(),
        }
    }

    pub fn from_items(items: &[Item]) -> Self {
        let ids: Vec<ClusterId> = items.iter().map(|it| it.cluster_id).collect();
        Self::from_assignments(&ids)
    }

    /// Number of distinct clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Row indices of cluster `cid`, ascending.
    pub fn members(&self, cid: ClusterId) -> Option<&[usize]> {
        self.clusters.get(&cid).map(|v| v.as_slice())
    }

    /// Cluster id of `row`.
    pub fn cluster_of(&self, row: usize) -> ClusterId {
        self.assignments[row]
    }

    pub fn size(&self, cid: ClusterId) -> usize {
        self.clusters.get(&cid).map_or(0, |v| v.len())
    }

    /// Clusters in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &[usize])> {
        self.clusters.iter().map(|(&cid, rows)| (cid, rows.as_slice()))
    }
}

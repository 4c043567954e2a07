//! Vector store seam.
//!
//! The pipeline only needs O(1) lookup by item id and a fixed dimension;
//! where the vectors come from (a database, an inference service) is the
//! caller's business. [`InMemoryVectorStore`] is the reference implementation.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::core::l2_normalise;
use crate::error::{GraphError, GraphResult};

/// Read-only access to one unit-norm embedding per item id.
pub trait VectorStore {
    /// Embedding dimension, `None` while the store is empty.
    fn dim(&self) -> Option<usize>;

    /// Vector for `id`, if present.
    fn get(&self, id: &str) -> Option<&[f64]>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// HashMap-backed store; vectors are L2-normalised on insert.
#[derive(Clone, Debug, Default)]
pub struct InMemoryVectorStore {
    dim: Option<usize>,
    vectors: HashMap<String, Vec<f64>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vector for `id`.
    ///
    /// The first insert fixes the dimension; later vectors of a different
    /// length are rejected.
    pub fn insert(&mut self, id: impl Into<String>, mut vector: Vec<f64>) -> GraphResult<()> {
        let id = id.into();
        match self.dim {
            Some(d) if d != vector.len() => {
                return Err(GraphError::DimensionMismatch {
                    id,
                    expected: d,
                    found: vector.len(),
                });
            }
            None => {
                if vector.is_empty() {
                    return Err(GraphError::InvalidParameter(format!(
                        "empty embedding for {id}"
                    )));
                }
                debug!("InMemoryVectorStore dimension fixed at {}", vector.len());
                self.dim = Some(vector.len());
            }
            _ => {}
        }
        l2_normalise(&mut vector);
        trace!("Upserting embedding for {}", id);
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Ids present in `ids` that have no vector.
    pub fn missing<'a>(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .filter(|id| !self.vectors.contains_key(id.as_str()))
            .map(|id| id.as_str())
            .collect()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn dim(&self) -> Option<usize> {
        self.dim
    }

    fn get(&self, id: &str) -> Option<&[f64]> {
        self.vectors.get(id).map(|v| v.as_slice())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

impl<I: Into<String>> FromIterator<(I, Vec<f64>)> for InMemoryVectorStore {
    /// Collects pairs, skipping (with a warning) vectors whose dimension
    /// disagrees with the first.
    fn from_iter<T: IntoIterator<Item = (I, Vec<f64>)>>(iter: T) -> Self {
        let mut store = Self::new();
        for (id, v) in iter {
            let id: String = id.into();
            if let Err(e) = store.insert(id.clone(), v) {
                warn!("Skipping vector {:?}: {}", id, e);
            }
        }
        store
    }
}

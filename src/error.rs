//! Error types for graph construction, layout and export.
//!
//! Precondition failures abort before any partial output is produced.
//! Layout back-end failures are not errors at this level: they surface as
//! [`LayoutError`] and the layout engine falls through to the next strategy.

use thiserror::Error;

/// Result type alias for fallible pipeline operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Fatal errors raised by the pipeline.
#[derive(Error, Debug)]
pub enum GraphError {
    // ========== Precondition Errors ==========
    /// No items were supplied.
    #[error("empty item set: nothing to build a graph from")]
    EmptyInput,

    /// The vector store holds no embeddings at all.
    #[error("no items carry embeddings")]
    NoEmbeddings,

    /// Some items have no embedding in the store.
    #[error("{missing} of {total} items are missing embeddings")]
    MissingEmbeddings { missing: usize, total: usize },

    /// A vector does not match the dimension of the others.
    #[error("dimension mismatch for item {id}: expected {expected}, found {found}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested layout strategy name is not recognised.
    #[error("unknown layout strategy: {0:?} (expected fa2, fr, umap, pca or none)")]
    UnknownLayout(String),

    // ========== Auxiliary Stages ==========
    /// Cluster assignment failed.
    #[error("clustering failed: {0}")]
    Clustering(String),

    // ========== Output & Configuration ==========
    /// Payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the payload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Layered configuration could not be extracted.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for GraphError {
    fn from(err: figment::Error) -> Self {
        GraphError::Config(Box::new(err))
    }
}

/// Non-fatal failure of a single layout back-end.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// The back-end was compiled out or cannot run in this build.
    #[error("layout back-end {0} is unavailable")]
    Unavailable(&'static str),

    /// Not enough items for this back-end to produce a meaningful layout.
    #[error("layout back-end {backend} needs at least {required} items, got {provided}")]
    TooFewItems {
        backend: &'static str,
        required: usize,
        provided: usize,
    },

    /// The simulation diverged.
    #[error("layout back-end {0} produced non-finite coordinates")]
    NonFinite(&'static str),

    /// Any other back-end failure.
    #[error("layout back-end {backend} failed: {reason}")]
    Failed {
        backend: &'static str,
        reason: String,
    },
}

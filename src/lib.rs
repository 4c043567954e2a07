//! # simgraph
//!
//! Similarity-graph construction and 2D layout for corpora of unit-norm
//! embeddings that already carry cluster ids.
//!
//! Pipeline:
//!
//! ```text
//! VectorStore ─► EmbeddingMatrix ─┬─► NeighborGraphBuilder ─┐
//!                                 └─► ConnectivityAugmenter ─┴─► EdgeDeduplicator
//!                                                                     │
//!       GraphAssembler ◄── SpatialDeclutterer ◄── LayoutEngine ◄─────┘
//! ```
//!
//! ```no_run
//! use simgraph::{InMemoryVectorStore, Item, LayoutStrategy, SimGraphBuilder};
//!
//! let mut store = InMemoryVectorStore::new();
//! store.insert("a", vec![1.0, 0.0])?;
//! store.insert("b", vec![0.9, 0.1])?;
//! let items = vec![Item::new("a", 0), Item::new("b", 0)];
//!
//! let graph = SimGraphBuilder::new()
//!     .with_neighbors(8, 0.5, false)
//!     .with_layout(LayoutStrategy::Spring)
//!     .build(&items, &store)?;
//! graph.payload.export("force_graph.json", true)?;
//! # Ok::<(), simgraph::GraphError>(())
//! ```

pub mod builder;
pub mod clustering;
pub mod config;
pub mod core;
pub mod declutter;
pub mod error;
#[cfg(feature = "force-atlas")]
pub mod forceatlas;
pub mod graph;
pub mod layout;
#[cfg(feature = "neighbor-embedding")]
pub mod neighbor_embedding;
pub mod neighbors;
pub mod payload;
pub mod reduction;
pub mod spanning;
pub mod spring;
pub mod store;

pub use crate::builder::{GraphParams, SimGraph, SimGraphBuilder};
pub use crate::config::GraphConfig;
pub use crate::core::{ClusterId, ClusterPartition, EmbeddingMatrix, Item, ItemMetadata};
pub use crate::declutter::{DeclutterParams, SpatialDeclutterer};
pub use crate::error::{GraphError, GraphResult, LayoutError};
pub use crate::graph::{Edge, EdgeDeduplicator};
pub use crate::layout::{LayoutEngine, LayoutParams, LayoutResult, LayoutStrategy};
pub use crate::neighbors::{NeighborGraphBuilder, NeighborLists, NeighborParams};
pub use crate::payload::{Canvas, GraphAssembler, GraphPayload};
pub use crate::spanning::ConnectivityAugmenter;
pub use crate::store::{InMemoryVectorStore, VectorStore};

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::core::{ClusterId, ClusterPartition, EmbeddingMatrix, Item};
use crate::error::{GraphError, GraphResult};
use crate::graph::{Edge, EdgeDeduplicator};
use crate::layout::{LayoutEngine, LayoutParams, LayoutResult, LayoutStrategy};
use crate::neighbors::{NeighborGraphBuilder, NeighborParams};
use crate::payload::{AssemblyOptions, Canvas, GraphAssembler, GraphPayload};
use crate::spanning::ConnectivityAugmenter;
use crate::store::VectorStore;

/// Every tunable of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    pub neighbors: NeighborParams,
    /// Add a spanning tree per cluster.
    pub add_cluster_mst: bool,
    pub layout: LayoutParams,
    pub output: AssemblyOptions,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            neighbors: NeighborParams::default(),
            add_cluster_mst: true,
            layout: LayoutParams::default(),
            output: AssemblyOptions::default(),
        }
    }
}

impl GraphParams {
    /// Reject out-of-range values before any work is done.
    pub fn validate(&self) -> GraphResult<()> {
        let invalid = |msg: String| -> GraphResult<()> { Err(GraphError::InvalidParameter(msg)) };

        let nb = &self.neighbors;
        if nb.top_k == 0 {
            return invalid("top_k must be at least 1".into());
        }
        if !(-1.0..=1.0).contains(&nb.min_sim) {
            return invalid(format!("min_sim must lie in [-1, 1], got {}", nb.min_sim));
        }

        let canvas = &self.output.canvas;
        let min_extent = canvas.pad.saturating_mul(2);
        if canvas.w <= min_extent || canvas.h <= min_extent {
            return invalid(format!(
                "canvas {}×{} too small for padding {}",
                canvas.w, canvas.h, canvas.pad
            ));
        }

        let layout = &self.layout;
        if layout.force_atlas.iterations == 0 || layout.spring.iterations == 0 {
            return invalid("layout iteration counts must be at least 1".into());
        }
        if layout.neighbor_embedding.n_neighbors < 2 {
            return invalid(format!(
                "n_neighbors must be at least 2, got {}",
                layout.neighbor_embedding.n_neighbors
            ));
        }
        if !(layout.neighbor_embedding.min_dist >= 0.0) {
            return invalid(format!(
                "min_dist must be non-negative, got {}",
                layout.neighbor_embedding.min_dist
            ));
        }
        if !(layout.declutter.radius > 0.0) {
            return invalid(format!(
                "declutter radius must be positive, got {}",
                layout.declutter.radius
            ));
        }
        Ok(())
    }
}

/// Result of one pipeline run.
#[derive(Clone, Debug)]
pub struct SimGraph {
    pub matrix: EmbeddingMatrix,
    pub partition: ClusterPartition,
    pub edges: Vec<Edge>,
    pub layout: LayoutResult,
    pub payload: GraphPayload,
}

pub struct SimGraphBuilder {
    params: GraphParams,
    labels: HashMap<ClusterId, String>,
    batch_size: Option<usize>,
}

impl Default for SimGraphBuilder {
    fn default() -> Self {
        debug!("Creating SimGraphBuilder with default parameters");
        Self {
            params: GraphParams::default(),
            labels: HashMap::new(),
            batch_size: None,
        }
    }
}

impl SimGraphBuilder {
    pub fn new() -> Self {
        info!("Initializing new SimGraphBuilder");
        Self::default()
    }

    pub fn from_params(params: GraphParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &GraphParams {
        &self.params
    }

    // -------------------- Neighbour graph --------------------

    /// Top-K neighbours per item above `min_sim`, optionally same-cluster only.
    pub fn with_neighbors(mut self, top_k: usize, min_sim: f64, same_cluster_only: bool) -> Self {
        info!(
            "Configuring neighbours: top_k={}, min_sim={}, same_cluster_only={}",
            top_k, min_sim, same_cluster_only
        );
        self.params.neighbors = NeighborParams {
            top_k,
            min_sim,
            same_cluster_only,
        };
        self
    }

    pub fn with_cluster_mst(mut self, enabled: bool) -> Self {
        info!("Setting per-cluster spanning trees: {}", enabled);
        self.params.add_cluster_mst = enabled;
        self
    }

    /// Force a fixed similarity batch size instead of the size-based default.
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = Some(rows);
        self
    }

    // -------------------- Layout --------------------

    pub fn with_layout(mut self, strategy: LayoutStrategy) -> Self {
        info!("Setting layout strategy: {}", strategy);
        self.params.layout.strategy = strategy;
        self
    }

    pub fn with_layout_params(mut self, layout: LayoutParams) -> Self {
        self.params.layout = layout;
        self
    }

    pub fn with_force_atlas(mut self, iterations: usize, scaling_ratio: f64, gravity: f64) -> Self {
        let fa = &mut self.params.layout.force_atlas;
        fa.iterations = iterations;
        fa.scaling_ratio = scaling_ratio;
        fa.gravity = gravity;
        self
    }

    pub fn with_spring(mut self, iterations: usize, seed: u64) -> Self {
        self.params.layout.spring.iterations = iterations;
        self.params.layout.spring.seed = seed;
        self
    }

    pub fn with_neighbor_embedding(mut self, n_neighbors: usize, min_dist: f64, seed: u64) -> Self {
        let ne = &mut self.params.layout.neighbor_embedding;
        ne.n_neighbors = n_neighbors;
        ne.min_dist = min_dist;
        ne.seed = seed;
        self
    }

    pub fn with_projection_seed(mut self, seed: u64) -> Self {
        self.params.layout.projection.seed = seed;
        self
    }

    pub fn with_declutter(mut self, radius: f64, passes: usize) -> Self {
        self.params.layout.declutter.radius = radius;
        self.params.layout.declutter.passes = passes;
        self
    }

    // -------------------- Output --------------------

    pub fn with_canvas(mut self, w: u32, h: u32, pad: u32) -> Self {
        self.params.output.canvas = Canvas { w, h, pad };
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.params.output.compact = compact;
        self
    }

    pub fn with_summaries(mut self, include: bool, max_len: usize) -> Self {
        self.params.output.include_summaries = include;
        self.params.output.max_summary_len = max_len;
        self
    }

    /// Embedding model name reported in the payload meta.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.params.output.model = Some(model.into());
        self
    }

    pub fn with_labels(mut self, labels: HashMap<ClusterId, String>) -> Self {
        self.labels = labels;
        self
    }

    // -------------------- Build --------------------

    /// Stack embeddings for `items` out of `store` and run the pipeline.
    pub fn build<S: VectorStore + ?Sized>(self, items: &[Item], store: &S) -> GraphResult<SimGraph> {
        self.params.validate()?;
        let ids: Vec<String> = items.iter().map(|it| it.id.clone()).collect();
        let matrix = EmbeddingMatrix::stack(store, &ids)?;
        self.build_from_matrix(items, matrix)
    }

    /// Run the pipeline on an already stacked matrix whose row `i` belongs to
    /// `items[i]`.
    pub fn build_from_matrix(self, items: &[Item], matrix: EmbeddingMatrix) -> GraphResult<SimGraph> {
        self.params.validate()?;
        if items.is_empty() {
            return Err(GraphError::EmptyInput);
        }
        if items.len() != matrix.nrows() {
            return Err(GraphError::InvalidParameter(format!(
                "{} items for {} embedding rows",
                items.len(),
                matrix.nrows()
            )));
        }
        if let Some((row, item)) = items
            .iter()
            .enumerate()
            .find(|(i, it)| matrix.ids()[*i] != it.id)
        {
            return Err(GraphError::InvalidParameter(format!(
                "row {} holds {} but item is {}",
                row,
                matrix.ids()[row],
                item.id
            )));
        }

        let (n, dim) = matrix.shape();
        info!("Building similarity graph: N={}, dim={}", n, dim);
        let partition = ClusterPartition::from_items(items);

        // 1) neighbour lists
        let mut nb = NeighborGraphBuilder::new(&matrix, self.params.neighbors.clone())
            .with_partition(&partition);
        if let Some(rows) = self.batch_size {
            nb = nb.with_batch_size(rows);
        }
        let neighbors = nb.build();

        // 2) per-cluster spanning trees, cluster-local regardless of neighbour scope
        let tree = if self.params.add_cluster_mst {
            ConnectivityAugmenter::new(&matrix, &partition).augment()
        } else {
            Vec::new()
        };
        trace!("{} spanning-tree edges before filtering", tree.len());

        // 3) merge
        let edges = EdgeDeduplicator::merge(&neighbors, &tree, self.params.neighbors.min_sim);

        // 4) layout
        let layout = LayoutEngine::new(self.params.layout.clone()).run(&matrix, &edges);

        // 5) payload
        let payload = GraphAssembler::new(self.params.output.clone(), self.params.neighbors.clone())
            .with_labels(self.labels)
            .assemble(items, &matrix, &partition, &edges, &layout);

        info!(
            "Graph built: {} nodes, {} links, layout {}",
            payload.nodes.len(),
            payload.links.len(),
            layout.method
        );

        Ok(SimGraph {
            matrix,
            partition,
            edges,
            layout,
            payload,
        })
    }
}

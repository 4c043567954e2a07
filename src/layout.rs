//! # Layout strategies and the fallback engine
//!
//! [`LayoutStrategy`] names the interchangeable back-ends:
//!
//! | name   | back-end                                   | input            |
//! |--------|--------------------------------------------|------------------|
//! | `fa2`  | ForceAtlas2 ([`crate::forceatlas`])        | edge graph       |
//! | `fr`   | Fruchterman-Reingold ([`crate::spring`])   | edge graph       |
//! | `umap` | neighbour embedding ([`crate::neighbor_embedding`]) | raw vectors |
//! | `pca`  | linear projection ([`crate::reduction`])   | raw vectors      |
//! | `none` | no coordinates                             |                  |
//!
//! [`LayoutEngine::run`] starts at the requested strategy and walks the fixed
//! priority list `fa2 → fr → umap → pca` until one back-end returns finite
//! coordinates. The strategy actually used is recorded in [`LayoutResult`].
//! Raw coordinates are min-max normalised per axis into `[0, 1]`; force-family
//! output is then decluttered.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sprs::CsMat;

use crate::core::EmbeddingMatrix;
use crate::declutter::{DeclutterParams, SpatialDeclutterer};
use crate::error::{GraphError, LayoutError};
use crate::graph::{adjacency_matrix, Edge};
use crate::reduction::pca_2d;

/// Floor on the per-axis range used during normalisation.
pub const RANGE_EPS: f64 = 1e-9;

/// Selectable layout back-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutStrategy {
    #[serde(rename = "fa2")]
    ForceAtlas2,
    #[default]
    #[serde(rename = "fr")]
    Spring,
    #[serde(rename = "umap")]
    NeighborEmbedding,
    #[serde(rename = "pca")]
    LinearProjection,
    #[serde(rename = "none")]
    None,
}

impl LayoutStrategy {
    /// Priority list walked on failure.
    pub const FALLBACK_ORDER: [LayoutStrategy; 4] = [
        LayoutStrategy::ForceAtlas2,
        LayoutStrategy::Spring,
        LayoutStrategy::NeighborEmbedding,
        LayoutStrategy::LinearProjection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutStrategy::ForceAtlas2 => "fa2",
            LayoutStrategy::Spring => "fr",
            LayoutStrategy::NeighborEmbedding => "umap",
            LayoutStrategy::LinearProjection => "pca",
            LayoutStrategy::None => "none",
        }
    }

    /// Graph-driven simulations, which get decluttered afterwards.
    pub fn is_force_family(&self) -> bool {
        matches!(self, LayoutStrategy::ForceAtlas2 | LayoutStrategy::Spring)
    }

    /// `self` followed by every strategy after it in the priority list.
    pub fn chain(&self) -> &'static [LayoutStrategy] {
        match Self::FALLBACK_ORDER.iter().position(|s| s == self) {
            Some(start) => &Self::FALLBACK_ORDER[start..],
            None => &[],
        }
    }
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutStrategy {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fa2" => Ok(LayoutStrategy::ForceAtlas2),
            "fr" => Ok(LayoutStrategy::Spring),
            "umap" => Ok(LayoutStrategy::NeighborEmbedding),
            "pca" => Ok(LayoutStrategy::LinearProjection),
            "none" => Ok(LayoutStrategy::None),
            _ => Err(GraphError::UnknownLayout(s.to_string())),
        }
    }
}

/// ForceAtlas2 settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceAtlasParams {
    pub iterations: usize,
    pub scaling_ratio: f64,
    pub gravity: f64,
    pub jitter_tolerance: f64,
    pub edge_weight_influence: f64,
    pub lin_log: bool,
    pub outbound_attraction_distribution: bool,
    /// Seed for the initial positions.
    pub seed: u64,
}

impl Default for ForceAtlasParams {
    fn default() -> Self {
        Self {
            iterations: 800,
            scaling_ratio: 2.0,
            gravity: 1.0,
            jitter_tolerance: 1.0,
            edge_weight_influence: 1.0,
            lin_log: true,
            outbound_attraction_distribution: true,
            seed: 42,
        }
    }
}

/// Fruchterman-Reingold settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringParams {
    pub iterations: usize,
    pub seed: u64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            iterations: 300,
            seed: 42,
        }
    }
}

/// Neighbour-embedding settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborEmbeddingParams {
    /// Neighbourhood size, counting the point itself.
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub seed: u64,
    pub negative_sample_rate: usize,
    /// Overrides the size-dependent epoch count.
    pub n_epochs: Option<usize>,
}

impl Default for NeighborEmbeddingParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.10,
            seed: 42,
            negative_sample_rate: 5,
            n_epochs: None,
        }
    }
}

/// Linear projection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionParams {
    pub seed: u64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Everything the layout stage needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub strategy: LayoutStrategy,
    pub force_atlas: ForceAtlasParams,
    pub spring: SpringParams,
    pub neighbor_embedding: NeighborEmbeddingParams,
    pub projection: ProjectionParams,
    pub declutter: DeclutterParams,
}

/// Normalised coordinates plus the strategy that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutResult {
    /// One `[x, y]` per row, or empty when no layout was produced. Points are
    /// normalised to `[0, 1]²`; declutter may push force-family output up to
    /// half its radius past that square.
    pub points: Vec<[f64; 2]>,
    pub method: LayoutStrategy,
    pub requested: LayoutStrategy,
}

impl LayoutResult {
    fn empty(requested: LayoutStrategy) -> Self {
        Self {
            points: Vec::new(),
            method: LayoutStrategy::None,
            requested,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        !self.points.is_empty()
    }

    /// Whether a later strategy replaced the requested one.
    pub fn fell_back(&self) -> bool {
        self.has_coordinates() && self.method != self.requested
    }
}

/// Per-axis min-max rescale into `[0, 1]` with a [`RANGE_EPS`] range floor.
pub fn normalise(points: &mut [[f64; 2]]) {
    for axis in 0..2 {
        let (lo, hi) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            });
        let range = (hi - lo).max(RANGE_EPS);
        for p in points.iter_mut() {
            p[axis] = (p[axis] - lo) / range;
        }
    }
}

/// Inputs shared by every back-end.
struct LayoutInput<'a> {
    matrix: &'a EmbeddingMatrix,
    adjacency: CsMat<f64>,
}

impl LayoutStrategy {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        params: &LayoutParams,
    ) -> Result<Vec<[f64; 2]>, LayoutError> {
        match self {
            LayoutStrategy::ForceAtlas2 => run_force_atlas(&input.adjacency, &params.force_atlas),
            LayoutStrategy::Spring => crate::spring::spring_layout(&input.adjacency, &params.spring),
            LayoutStrategy::NeighborEmbedding => {
                run_neighbor_embedding(input.matrix, &params.neighbor_embedding)
            }
            LayoutStrategy::LinearProjection => {
                let n = input.matrix.nrows();
                if n < 2 {
                    return Err(LayoutError::TooFewItems {
                        backend: "pca",
                        required: 2,
                        provided: n,
                    });
                }
                Ok(pca_2d(input.matrix, params.projection.seed))
            }
            LayoutStrategy::None => Err(LayoutError::Unavailable("none")),
        }
    }
}

#[cfg(feature = "force-atlas")]
fn run_force_atlas(
    adjacency: &CsMat<f64>,
    params: &ForceAtlasParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    crate::forceatlas::force_atlas2(adjacency, params)
}

#[cfg(not(feature = "force-atlas"))]
fn run_force_atlas(
    _adjacency: &CsMat<f64>,
    _params: &ForceAtlasParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    Err(LayoutError::Unavailable("fa2"))
}

#[cfg(feature = "neighbor-embedding")]
fn run_neighbor_embedding(
    matrix: &EmbeddingMatrix,
    params: &NeighborEmbeddingParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    crate::neighbor_embedding::neighbor_embedding(matrix, params)
}

#[cfg(not(feature = "neighbor-embedding"))]
fn run_neighbor_embedding(
    _matrix: &EmbeddingMatrix,
    _params: &NeighborEmbeddingParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    Err(LayoutError::Unavailable("umap"))
}

/// Runs the requested strategy with deterministic fallback.
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    params: LayoutParams,
}

impl LayoutEngine {
    pub fn new(params: LayoutParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Lay out the `matrix.nrows()` items connected by `edges`.
    pub fn run(&self, matrix: &EmbeddingMatrix, edges: &[Edge]) -> LayoutResult {
        let requested = self.params.strategy;
        let n = matrix.nrows();
        info!("Layout: requested {} for {} items", requested, n);

        if requested == LayoutStrategy::None || n == 0 {
            return LayoutResult::empty(requested);
        }
        // No back-end runs for a lone item, so `method` stays `None` even though
        // one point is emitted; `has_coordinates` reflects the point.
        if n == 1 {
            debug!("Single item placed at the origin");
            return LayoutResult {
                points: vec![[0.0, 0.0]],
                method: LayoutStrategy::None,
                requested,
            };
        }

        let input = LayoutInput {
            matrix,
            adjacency: adjacency_matrix(n, edges),
        };

        for strategy in requested.chain() {
            match strategy.compute(&input, &self.params) {
                Ok(mut points) => {
                    if points.len() != n
                        || points.iter().any(|p| !p[0].is_finite() || !p[1].is_finite())
                    {
                        warn!("Layout {} returned unusable coordinates, falling back", strategy);
                        continue;
                    }
                    normalise(&mut points);
                    if strategy.is_force_family() {
                        SpatialDeclutterer::new(self.params.declutter.clone()).apply(&mut points);
                    }
                    if *strategy != requested {
                        warn!("Layout {} used in place of {}", strategy, requested);
                    }
                    info!("Layout complete with {}", strategy);
                    return LayoutResult {
                        points,
                        method: *strategy,
                        requested,
                    };
                }
                Err(e) => warn!("{}; trying next strategy", e),
            }
        }

        warn!("Every layout strategy failed; nodes carry no coordinates");
        LayoutResult::empty(requested)
    }
}

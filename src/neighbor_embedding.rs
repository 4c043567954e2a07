//! # Neighbour-graph embedding (UMAP-style) of the raw embedding space
//!
//! ## Algorithm
//!
//! 1. **k-NN**: cosine neighbours of every row (`k = min(n_neighbors − 1, N − 1)`,
//!    self excluded), distance `1 − similarity`.
//! 2. **Fuzzy simplicial set**: per row, `ρ` is the distance to the nearest
//!    neighbour and `σ` is found by bisection so that
//!    `Σ exp(−max(0, dᵢⱼ − ρ) / σ) = log2(k + 1)`. Directed memberships are
//!    symmetrised with the fuzzy union `a + b − a·b`.
//! 3. **Curve**: the low-dimensional similarity `1 / (1 + a·d^{2b})` is fitted
//!    to the target curve implied by `min_dist` (spread 1).
//! 4. **Initialisation**: the principal-component projection rescaled to
//!    `[0, 10]²` plus 1e-4 Gaussian noise.
//! 5. **SGD**: each edge is sampled proportionally to its membership; every
//!    positive sample pulls both endpoints together and is followed by
//!    `negative_sample_rate` uniformly drawn repulsive samples. Gradients are
//!    clipped to ±4 and the learning rate decays linearly to zero.
//!
//! All randomness comes from one `ChaCha8Rng` seeded by the caller, and the
//! SGD runs sequentially, so the output is reproducible.

use std::collections::BTreeMap;

use log::{debug, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::core::EmbeddingMatrix;
use crate::error::LayoutError;
use crate::layout::NeighborEmbeddingParams;
use crate::neighbors::{NeighborGraphBuilder, NeighborParams};
use crate::reduction::pca_2d;

/// Fewest rows for which a neighbour graph is meaningful.
pub const MIN_ITEMS: usize = 3;

const SIGMA_BISECTION_STEPS: usize = 64;
const SIGMA_TOLERANCE: f64 = 1e-5;
const MIN_SIGMA_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const INITIAL_ALPHA: f64 = 1.0;
const REPULSION_STRENGTH: f64 = 1.0;
const INIT_EXTENT: f64 = 10.0;

/// Weighted edge of the symmetrised membership graph, stored in both
/// directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Membership {
    pub head: usize,
    pub tail: usize,
    pub weight: f64,
}

/// Calibrate `(ρ, σ)` for one row of ascending neighbour distances.
pub fn smooth_knn(distances: &[f64], target: f64) -> (f64, f64) {
    let rho = distances
        .iter()
        .copied()
        .find(|&d| d > 0.0)
        .unwrap_or(0.0);

    let (mut lo, mut hi, mut mid) = (0.0f64, f64::INFINITY, 1.0f64);
    for _ in 0..SIGMA_BISECTION_STEPS {
        let psum: f64 = distances
            .iter()
            .map(|&d| (-(d - rho).max(0.0) / mid).exp())
            .sum();
        if (psum - target).abs() < SIGMA_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let mean = distances.iter().sum::<f64>() / distances.len().max(1) as f64;
    (rho, mid.max(MIN_SIGMA_SCALE * mean).max(f64::MIN_POSITIVE))
}

/// Symmetrised fuzzy membership graph over the k-NN lists of `matrix`.
pub fn fuzzy_graph(matrix: &EmbeddingMatrix, k: usize) -> Vec<Membership> {
    let knn = NeighborGraphBuilder::new(
        matrix,
        NeighborParams {
            top_k: k,
            min_sim: f64::NEG_INFINITY,
            same_cluster_only: false,
        },
    )
    .build();
    let target = ((k + 1) as f64).log2();

    let directed: Vec<Vec<(usize, f64)>> = knn
        .par_iter()
        .map(|row| {
            let distances: Vec<f64> = row.iter().map(|&(_, s)| (1.0 - s).max(0.0)).collect();
            let (rho, sigma) = smooth_knn(&distances, target);
            row.iter()
                .zip(&distances)
                .map(|(&(j, _), &d)| (j, (-(d - rho).max(0.0) / sigma).exp()))
                .collect()
        })
        .collect();

    // (a, b) with a < b → (w_ab, w_ba)
    let mut pairs: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();
    for (i, row) in directed.iter().enumerate() {
        for &(j, w) in row {
            if i == j {
                continue;
            }
            let entry = pairs.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
            if i < j {
                entry.0 = w;
            } else {
                entry.1 = w;
            }
        }
    }

    let mut graph = Vec::with_capacity(pairs.len() * 2);
    for ((a, b), (wab, wba)) in pairs {
        let weight = wab + wba - wab * wba;
        if weight > 0.0 {
            graph.push(Membership { head: a, tail: b, weight });
            graph.push(Membership { head: b, tail: a, weight });
        }
    }
    graph
}

/// Fit `(a, b)` of `1 / (1 + a·x^{2b})` to the offset-exponential target curve
/// by a coarse-to-fine grid search over least squares.
pub fn fit_ab(spread: f64, min_dist: f64) -> (f64, f64) {
    const SAMPLES: usize = 300;
    const GRID: usize = 33;
    const ROUNDS: usize = 6;

    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();
    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    // search ln(a) and b
    let (mut la_lo, mut la_hi) = (0.001f64.ln(), 100.0f64.ln());
    let (mut b_lo, mut b_hi) = (0.05f64, 3.0f64);
    let mut best = (1.0f64.ln(), 1.0f64, f64::INFINITY);

    for round in 0..ROUNDS {
        let la_step = (la_hi - la_lo) / (GRID - 1) as f64;
        let b_step = (b_hi - b_lo) / (GRID - 1) as f64;
        for ia in 0..GRID {
            let la = la_lo + la_step * ia as f64;
            for ib in 0..GRID {
                let b = b_lo + b_step * ib as f64;
                let e = sse(la.exp(), b);
                if e < best.2 {
                    best = (la, b, e);
                }
            }
        }
        trace!("fit_ab round {}: a={:.4}, b={:.4}, sse={:.3e}", round, best.0.exp(), best.1, best.2);
        la_lo = best.0 - 2.0 * la_step;
        la_hi = best.0 + 2.0 * la_step;
        b_lo = (best.1 - 2.0 * b_step).max(1e-3);
        b_hi = best.1 + 2.0 * b_step;
    }
    (best.0.exp(), best.1)
}

/// PCA projection rescaled per axis to `[0, 10]`, with a little noise.
fn initial_positions(matrix: &EmbeddingMatrix, seed: u64, rng: &mut ChaCha8Rng) -> Vec<[f64; 2]> {
    let mut pos = pca_2d(matrix, seed);
    for p in pos.iter_mut() {
        let nx: f64 = StandardNormal.sample(&mut *rng);
        let ny: f64 = StandardNormal.sample(&mut *rng);
        p[0] += 1e-4 * nx;
        p[1] += 1e-4 * ny;
    }
    for axis in 0..2 {
        let (lo, hi) = pos
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            });
        let range = (hi - lo).max(1e-12);
        for p in pos.iter_mut() {
            p[axis] = INIT_EXTENT * (p[axis] - lo) / range;
        }
    }
    pos
}

#[inline]
fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

#[inline]
fn dist2(p: [f64; 2], q: [f64; 2]) -> f64 {
    (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)
}

/// Two-dimensional neighbour-graph embedding of the raw vectors.
pub fn neighbor_embedding(
    matrix: &EmbeddingMatrix,
    params: &NeighborEmbeddingParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    let n = matrix.nrows();
    if n < MIN_ITEMS {
        return Err(LayoutError::TooFewItems {
            backend: "umap",
            required: MIN_ITEMS,
            provided: n,
        });
    }

    let k = params.n_neighbors.saturating_sub(1).min(n - 1).max(1);
    let graph = fuzzy_graph(matrix, k);
    if graph.is_empty() {
        return Err(LayoutError::Failed {
            backend: "umap",
            reason: "membership graph has no edges".into(),
        });
    }
    let (a, b) = fit_ab(1.0, params.min_dist);

    let n_epochs = params
        .n_epochs
        .unwrap_or(if n <= 10_000 { 500 } else { 200 })
        .max(1);
    let max_w = graph.iter().map(|m| m.weight).fold(0.0f64, f64::max);
    let edges: Vec<Membership> = graph
        .into_iter()
        .filter(|m| m.weight >= max_w / n_epochs as f64)
        .collect();
    debug!(
        "Neighbour embedding: N={}, k={}, edges={}, a={:.4}, b={:.4}, epochs={}",
        n,
        k,
        edges.len(),
        a,
        b,
        n_epochs
    );

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut pos = initial_positions(matrix, params.seed, &mut rng);

    let neg_rate = params.negative_sample_rate.max(1) as f64;
    let epochs_per_sample: Vec<f64> = edges.iter().map(|m| max_w / m.weight).collect();
    let epochs_per_negative: Vec<f64> = epochs_per_sample.iter().map(|e| e / neg_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    for epoch in 0..n_epochs {
        let alpha = INITIAL_ALPHA * (1.0 - epoch as f64 / n_epochs as f64);
        let e = epoch as f64;

        for (idx, m) in edges.iter().enumerate() {
            if next_sample[idx] > e {
                continue;
            }
            let (j, t) = (m.head, m.tail);

            let d2 = dist2(pos[j], pos[t]);
            let coeff = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            for axis in 0..2 {
                let g = clip(coeff * (pos[j][axis] - pos[t][axis]));
                pos[j][axis] += g * alpha;
                pos[t][axis] -= g * alpha;
            }
            next_sample[idx] += epochs_per_sample[idx];

            let n_neg = ((e - next_negative[idx]) / epochs_per_negative[idx]).max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.random_range(0..n);
                let d2 = dist2(pos[j], pos[other]);
                let coeff = if d2 > 0.0 {
                    2.0 * REPULSION_STRENGTH * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0))
                } else {
                    // coincident or self: no push
                    0.0
                };
                if coeff <= 0.0 {
                    continue;
                }
                for axis in 0..2 {
                    let g = clip(coeff * (pos[j][axis] - pos[other][axis]));
                    pos[j][axis] += g * alpha;
                }
            }
            next_negative[idx] += n_neg as f64 * epochs_per_negative[idx];
        }

        if epoch % 50 == 0 {
            trace!("epoch {}/{}: alpha {:.3}", epoch, n_epochs, alpha);
        }
    }

    if pos.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(LayoutError::NonFinite("umap"));
    }
    Ok(pos)
}

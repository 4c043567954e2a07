//! Fruchterman-Reingold spring layout.
//!
//! Every pair of nodes repels with `k² / d`, every edge attracts with
//! `w · d² / k`, where `k = √(1/N)` is the optimal distance. Displacements
//! are capped by a temperature that cools linearly from a tenth of the
//! initial span to zero over the iteration budget; the loop stops early when
//! the mean step length drops below [`CONVERGENCE_THRESHOLD`]. The result is
//! centred and scaled so the largest coordinate magnitude is 1.

use log::{debug, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use sprs::CsMat;

use crate::error::LayoutError;
use crate::layout::SpringParams;

/// Mean per-node step below which the simulation stops.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-4;

const MIN_DISTANCE: f64 = 0.01;

/// Uniform `[0, 1)²` starting positions from a seeded generator.
pub(crate) fn random_positions(n: usize, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| [rng.random::<f64>(), rng.random::<f64>()]).collect()
}

/// Centre on the mean and scale so `max |coord| == 1`.
pub(crate) fn rescale_unit(points: &mut [[f64; 2]]) {
    if points.is_empty() {
        return;
    }
    let n = points.len() as f64;
    let mut mean = [0.0; 2];
    for p in points.iter() {
        mean[0] += p[0] / n;
        mean[1] += p[1] / n;
    }
    let mut lim = 0.0f64;
    for p in points.iter_mut() {
        p[0] -= mean[0];
        p[1] -= mean[1];
        lim = lim.max(p[0].abs()).max(p[1].abs());
    }
    if lim > 0.0 {
        for p in points.iter_mut() {
            p[0] /= lim;
            p[1] /= lim;
        }
    }
}

/// Run the spring simulation on a symmetric weighted adjacency.
pub fn spring_layout(
    adjacency: &CsMat<f64>,
    params: &SpringParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    let n = adjacency.rows();
    if n < 2 {
        return Err(LayoutError::TooFewItems {
            backend: "fr",
            required: 2,
            provided: n,
        });
    }

    let k = (1.0 / n as f64).sqrt();
    let mut pos = random_positions(n, params.seed);

    let span = |pos: &[[f64; 2]], axis: usize| {
        let (lo, hi) = pos
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            });
        hi - lo
    };
    let mut t = span(&pos, 0).max(span(&pos, 1)) * 0.1;
    let dt = t / (params.iterations as f64 + 1.0);
    debug!(
        "Spring layout: N={}, nnz={}, k={:.4}, iterations={}, t0={:.4}",
        n,
        adjacency.nnz(),
        k,
        params.iterations,
        t
    );

    for iteration in 0..params.iterations {
        let steps: Vec<[f64; 2]> = (0..n)
            .into_par_iter()
            .map(|i| {
                let pi = pos[i];
                let mut disp = [0.0f64; 2];

                // repulsion against every other node
                for (j, pj) in pos.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let dx = pi[0] - pj[0];
                    let dy = pi[1] - pj[1];
                    let d = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                    let f = k * k / (d * d);
                    disp[0] += dx * f;
                    disp[1] += dy * f;
                }

                // attraction along edges
                if let Some(row) = adjacency.outer_view(i) {
                    for (j, &w) in row.iter() {
                        if j == i {
                            continue;
                        }
                        let dx = pi[0] - pos[j][0];
                        let dy = pi[1] - pos[j][1];
                        let d = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                        let f = w * d / k;
                        disp[0] -= dx * f;
                        disp[1] -= dy * f;
                    }
                }

                let len = (disp[0] * disp[0] + disp[1] * disp[1]).sqrt();
                let len = if len < MIN_DISTANCE { 0.1 } else { len };
                [disp[0] * t / len, disp[1] * t / len]
            })
            .collect();

        let mut sq = 0.0;
        for (p, s) in pos.iter_mut().zip(&steps) {
            p[0] += s[0];
            p[1] += s[1];
            sq += s[0] * s[0] + s[1] * s[1];
        }
        t -= dt;

        let mean_step = sq.sqrt() / n as f64;
        trace!("iteration {}: mean step {:.3e}", iteration, mean_step);
        if !mean_step.is_finite() {
            return Err(LayoutError::NonFinite("fr"));
        }
        if mean_step < CONVERGENCE_THRESHOLD {
            debug!("Spring layout converged after {} iterations", iteration + 1);
            break;
        }
    }

    rescale_unit(&mut pos);
    Ok(pos)
}

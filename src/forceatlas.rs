//! ForceAtlas2 continuous graph layout.
//!
//! Node mass is `1 + degree`. Each iteration accumulates three forces:
//!
//! - repulsion between every pair, `scaling · mᵢ · mⱼ / d²` along the axis;
//! - gravity towards the origin, `mᵢ · gravity / |pᵢ|`;
//! - edge attraction, linear or lin-log (`log(1 + d) / d`), scaled by the edge
//!   weight and, with outbound attraction distribution, by the mean mass over
//!   the mass of the edge's lower-index endpoint.
//!
//! Positions then move by the adaptive speed rule: per-node swinging (change
//! of force between iterations) and global traction set a speed that rises at
//! most 50% per step and falls when the layout oscillates.

use log::{debug, trace};
use rayon::prelude::*;
use sprs::CsMat;

use crate::error::LayoutError;
use crate::layout::ForceAtlasParams;
use crate::spring::random_positions;

const MIN_SPEED_EFFICIENCY: f64 = 0.05;
const MAX_JITTER: f64 = 10.0;
const MAX_RISE: f64 = 0.5;

#[derive(Debug)]
struct AdaptiveSpeed {
    speed: f64,
    efficiency: f64,
}

impl AdaptiveSpeed {
    fn new() -> Self {
        Self {
            speed: 1.0,
            efficiency: 1.0,
        }
    }

    /// Update speed from this iteration's forces and return the per-node
    /// step factors.
    fn step(
        &mut self,
        mass: &[f64],
        old: &[[f64; 2]],
        force: &[[f64; 2]],
        jitter_tolerance: f64,
    ) -> Vec<f64> {
        let n = mass.len() as f64;
        let mut total_swinging = 0.0;
        let mut total_traction = 0.0;
        for ((m, o), f) in mass.iter().zip(old).zip(force) {
            total_swinging += m * ((o[0] - f[0]).powi(2) + (o[1] - f[1]).powi(2)).sqrt();
            total_traction += 0.5 * m * ((o[0] + f[0]).powi(2) + (o[1] + f[1]).powi(2)).sqrt();
        }

        let estimated = 0.05 * n.sqrt();
        let min_jt = estimated.sqrt();
        let mut jt = jitter_tolerance
            * min_jt.max(MAX_JITTER.min(estimated * total_traction / (n * n)));

        if total_traction > 0.0 && total_swinging / total_traction > 2.0 {
            if self.efficiency > MIN_SPEED_EFFICIENCY {
                self.efficiency *= 0.5;
            }
            jt = jt.max(jitter_tolerance);
        }

        let target = if total_swinging == 0.0 {
            f64::INFINITY
        } else {
            jt * self.efficiency * total_traction / total_swinging
        };

        if total_swinging > jt * total_traction {
            if self.efficiency > MIN_SPEED_EFFICIENCY {
                self.efficiency *= 0.7;
            }
        } else if self.speed < 1000.0 {
            self.efficiency *= 1.3;
        }

        self.speed += (target - self.speed).min(MAX_RISE * self.speed);

        mass.iter()
            .zip(old)
            .zip(force)
            .map(|((m, o), f)| {
                let swinging = m * ((o[0] - f[0]).powi(2) + (o[1] - f[1]).powi(2)).sqrt();
                self.speed / (1.0 + (self.speed * swinging).sqrt())
            })
            .collect()
    }
}

/// Run ForceAtlas2 on a symmetric weighted adjacency.
pub fn force_atlas2(
    adjacency: &CsMat<f64>,
    params: &ForceAtlasParams,
) -> Result<Vec<[f64; 2]>, LayoutError> {
    let n = adjacency.rows();
    if n < 2 {
        return Err(LayoutError::TooFewItems {
            backend: "fa2",
            required: 2,
            provided: n,
        });
    }

    let mass: Vec<f64> = (0..n)
        .map(|i| {
            1.0 + adjacency
                .outer_view(i)
                .map_or(0, |row| row.iter().filter(|(j, _)| *j != i).count()) as f64
        })
        .collect();
    let compensation = if params.outbound_attraction_distribution {
        mass.iter().sum::<f64>() / n as f64
    } else {
        1.0
    };
    debug!(
        "ForceAtlas2: N={}, iterations={}, scaling={}, gravity={}, lin_log={}, compensation={:.3}",
        n, params.iterations, params.scaling_ratio, params.gravity, params.lin_log, compensation
    );

    let mut pos = random_positions(n, params.seed);
    let mut force = vec![[0.0f64; 2]; n];
    let mut speed = AdaptiveSpeed::new();

    for iteration in 0..params.iterations {
        let old = std::mem::take(&mut force);

        force = (0..n)
            .into_par_iter()
            .map(|i| {
                let pi = pos[i];
                let mut f = [0.0f64; 2];

                for (j, pj) in pos.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let dx = pi[0] - pj[0];
                    let dy = pi[1] - pj[1];
                    let d2 = dx * dx + dy * dy;
                    if d2 > 0.0 {
                        let factor = params.scaling_ratio * mass[i] * mass[j] / d2;
                        f[0] += dx * factor;
                        f[1] += dy * factor;
                    }
                }

                let dist = (pi[0] * pi[0] + pi[1] * pi[1]).sqrt();
                if dist > 0.0 {
                    let factor = mass[i] * params.gravity / dist;
                    f[0] -= pi[0] * factor;
                    f[1] -= pi[1] * factor;
                }

                if let Some(row) = adjacency.outer_view(i) {
                    for (j, &w) in row.iter() {
                        if j == i {
                            continue;
                        }
                        let dx = pi[0] - pos[j][0];
                        let dy = pi[1] - pos[j][1];
                        let mut factor = -compensation * w.powf(params.edge_weight_influence);
                        if params.lin_log {
                            let d = (dx * dx + dy * dy).sqrt();
                            if d <= 0.0 {
                                continue;
                            }
                            factor *= (1.0 + d).ln() / d;
                        }
                        if params.outbound_attraction_distribution {
                            factor /= mass[i.min(j)];
                        }
                        f[0] += dx * factor;
                        f[1] += dy * factor;
                    }
                }
                f
            })
            .collect();

        let factors = speed.step(&mass, &old, &force, params.jitter_tolerance);
        for ((p, f), s) in pos.iter_mut().zip(&force).zip(&factors) {
            p[0] += f[0] * s;
            p[1] += f[1] * s;
        }

        if pos.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(LayoutError::NonFinite("fa2"));
        }
        trace!(
            "iteration {}: speed {:.4}, efficiency {:.4}",
            iteration,
            speed.speed,
            speed.efficiency
        );
    }

    Ok(pos)
}

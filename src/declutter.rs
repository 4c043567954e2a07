//! Grid-based anti-overlap pass over normalised layout coordinates.
//!
//! Points are bucketed into square cells of side `radius`; any pair closer
//! than `radius` must then sit in the same or adjacent cells, so each point
//! only checks its own cell and the 8 around it. An overlapping pair is pushed
//! apart symmetrically along the line joining them until it is exactly
//! `radius` apart. Coincident points have no joining line and are split along
//! a golden-angle direction derived from their indices.
//!
//! The bucket map is rebuilt at the start of each pass from the current
//! positions; pushes within a pass see the updated coordinates.

use std::collections::HashMap;
use std::f64::consts::TAU;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Squared distance under which two points count as coincident.
const COINCIDENT_EPS2: f64 = 1e-12;

/// Declutter settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclutterParams {
    /// Minimum separation in normalised units.
    pub radius: f64,
    /// Upper bound on relaxation passes; stops early once a pass moves nothing.
    pub passes: usize,
}

impl Default for DeclutterParams {
    fn default() -> Self {
        Self {
            radius: 0.01,
            passes: 8,
        }
    }
}

type CellKey = (i64, i64);

#[inline]
fn cell_of(p: [f64; 2], cell: f64) -> CellKey {
    ((p[0] / cell).floor() as i64, (p[1] / cell).floor() as i64)
}

/// Unit direction for separating coincident points `i < j`.
#[inline]
fn split_direction(i: usize, j: usize) -> [f64; 2] {
    let turns = (i as f64 * 0.618_034 + j as f64 * 0.414_214).fract();
    let theta = turns * TAU;
    [theta.cos(), theta.sin()]
}

/// Pushes apart points closer than a minimum radius.
#[derive(Clone, Debug, Default)]
pub struct SpatialDeclutterer {
    params: DeclutterParams,
}

impl SpatialDeclutterer {
    pub fn new(params: DeclutterParams) -> Self {
        Self { params }
    }

    /// Adjust `points` in place. Returns the number of pushes applied.
    pub fn apply(&self, points: &mut [[f64; 2]]) -> usize {
        let r = self.params.radius;
        if points.len() < 2 || !(r > 0.0) {
            return 0;
        }
        let r2 = r * r;
        let mut total = 0;

        for pass in 0..self.params.passes {
            let keys: Vec<CellKey> = points.iter().map(|&p| cell_of(p, r)).collect();
            let mut buckets: HashMap<CellKey, Vec<usize>> = HashMap::new();
            for (i, &key) in keys.iter().enumerate() {
                buckets.entry(key).or_default().push(i);
            }

            let mut pushes = 0;
            let mut near: Vec<usize> = Vec::new();
            for (ii, &(gx, gy)) in keys.iter().enumerate() {
                near.clear();
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        if let Some(idxs) = buckets.get(&(gx + dx, gy + dy)) {
                            near.extend(idxs.iter().copied().filter(|&jj| jj > ii));
                        }
                    }
                }
                near.sort_unstable();

                for &jj in &near {
                    let dx = points[ii][0] - points[jj][0];
                    let dy = points[ii][1] - points[jj][1];
                    let d2 = dx * dx + dy * dy;
                    if d2 >= r2 {
                        continue;
                    }
                    if d2 > COINCIDENT_EPS2 {
                        let d = d2.sqrt();
                        let push = 0.5 * (r - d) / d;
                        points[ii][0] += dx * push;
                        points[ii][1] += dy * push;
                        points[jj][0] -= dx * push;
                        points[jj][1] -= dy * push;
                    } else {
                        let [ux, uy] = split_direction(ii, jj);
                        let half = 0.5 * r;
                        points[ii][0] += ux * half;
                        points[ii][1] += uy * half;
                        points[jj][0] -= ux * half;
                        points[jj][1] -= uy * half;
                    }
                    pushes += 1;
                }
            }
            trace!("declutter pass {}: {} pushes", pass, pushes);
            total += pushes;
            if pushes == 0 {
                break;
            }
        }

        debug!(
            "Declutter: {} pushes over {} points (radius {})",
            total,
            points.len(),
            r
        );
        total
    }
}

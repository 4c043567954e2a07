//! # Linear projection to two dimensions
//!
//! Randomized PCA (subspace iteration) of the centred embedding matrix.
//!
//! ## Algorithm
//!
//! 1. Centre the N × D matrix `X` on its column means.
//! 2. Draw a Gaussian sketch `Ω` (D × l, `l = min(10, D, N)`) from a seeded
//!    `ChaCha8Rng` and form `Y = X Ω`.
//! 3. Power iterations: orthonormalise `Y`, then `Y ← X (Xᵀ Y)`, four times;
//!    finish with one more orthonormalisation to get `Q` (N × l).
//! 4. `B = Qᵀ X` is l × D. The eigenvectors `u` of the small l × l matrix `B Bᵀ`
//!    (cyclic Jacobi) give the principal scores `Q u √λ`.
//! 5. Each score column is flipped so its largest-magnitude entry is positive.
//!
//! Everything is O(N · D · l) and deterministic for a fixed seed.
//!
//! ## When `l < 2`
//!
//! A one-dimensional input (D = 1) produces a single component; the second
//! coordinate is zero.

use log::{debug, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::core::EmbeddingMatrix;

/// Sketch width cap.
pub const SKETCH_WIDTH: usize = 10;

/// Power iterations applied to the sketch.
pub const POWER_ITERATIONS: usize = 4;

const JACOBI_SWEEPS: usize = 64;

/// Dense column-major block of `cols` vectors of length `len`.
#[derive(Clone, Debug)]
struct Columns {
    len: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Columns {
    fn zeros(len: usize, cols: usize) -> Self {
        Self {
            len,
            cols,
            data: vec![0.0; len * cols],
        }
    }

    fn col(&self, j: usize) -> &[f64] {
        &self.data[j * self.len..(j + 1) * self.len]
    }

    fn col_mut(&mut self, j: usize) -> &mut [f64] {
        &mut self.data[j * self.len..(j + 1) * self.len]
    }

    /// Modified Gram-Schmidt in place. Columns that collapse numerically are
    /// zeroed rather than normalised.
    fn orthonormalise(&mut self) {
        for j in 0..self.cols {
            for p in 0..j {
                let proj: f64 = self.col(p).iter().zip(self.col(j)).map(|(a, b)| a * b).sum();
                let (head, tail) = self.data.split_at_mut(j * self.len);
                let prev = &head[p * self.len..(p + 1) * self.len];
                for (x, q) in tail[..self.len].iter_mut().zip(prev) {
                    *x -= proj * q;
                }
            }
            let norm = self.col(j).iter().map(|x| x * x).sum::<f64>().sqrt();
            let c = self.col_mut(j);
            if norm > 1e-12 {
                c.iter_mut().for_each(|x| *x /= norm);
            } else {
                c.iter_mut().for_each(|x| *x = 0.0);
            }
        }
    }
}

/// Centred copy of the matrix, row-major.
struct Centred {
    n: usize,
    d: usize,
    data: Vec<f64>,
}

impl Centred {
    fn new(matrix: &EmbeddingMatrix) -> Self {
        let (n, d) = matrix.shape();
        let mut mean = vec![0.0; d];
        for i in 0..n {
            for (m, x) in mean.iter_mut().zip(matrix.row(i)) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n.max(1) as f64);

        let mut data = Vec::with_capacity(n * d);
        for i in 0..n {
            data.extend(matrix.row(i).iter().zip(&mean).map(|(x, m)| x - m));
        }
        Self { n, d, data }
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.d..(i + 1) * self.d]
    }

    /// `X · W` for a D × l column block, giving N × l.
    fn times(&self, w: &Columns) -> Columns {
        let mut out = Columns::zeros(self.n, w.cols);
        out.data
            .par_chunks_mut(self.n)
            .enumerate()
            .for_each(|(j, dst)| {
                let wj = w.col(j);
                for (i, y) in dst.iter_mut().enumerate() {
                    *y = self.row(i).iter().zip(wj).map(|(a, b)| a * b).sum();
                }
            });
        out
    }

    /// `Xᵀ · Y` for an N × l column block, giving D × l.
    fn t_times(&self, y: &Columns) -> Columns {
        let mut out = Columns::zeros(self.d, y.cols);
        out.data
            .par_chunks_mut(self.d)
            .enumerate()
            .for_each(|(j, dst)| {
                let yj = y.col(j);
                for i in 0..self.n {
                    let s = yj[i];
                    if s == 0.0 {
                        continue;
                    }
                    for (acc, x) in dst.iter_mut().zip(self.row(i)) {
                        *acc += s * x;
                    }
                }
            });
        out
    }
}

/// Eigen-decomposition of a small symmetric matrix (row-major, `k × k`)
/// by cyclic Jacobi rotations. Returns `(eigenvalues, eigenvectors)` with
/// eigenvectors as columns of a row-major `k × k` matrix, sorted by
/// eigenvalue descending.
pub fn symmetric_eigen(mut a: Vec<f64>, k: usize) -> (Vec<f64>, Vec<f64>) {
    let mut v = vec![0.0; k * k];
    for i in 0..k {
        v[i * k + i] = 1.0;
    }

    for sweep in 0..JACOBI_SWEEPS {
        let off: f64 = (0..k)
            .flat_map(|i| (0..k).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i * k + j] * a[i * k + j])
            .sum();
        if off < 1e-22 {
            trace!("Jacobi converged after {} sweeps", sweep);
            break;
        }
        for p in 0..k {
            for q in (p + 1)..k {
                let apq = a[p * k + q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q * k + q] - a[p * k + p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for r in 0..k {
                    let arp = a[r * k + p];
                    let arq = a[r * k + q];
                    a[r * k + p] = c * arp - s * arq;
                    a[r * k + q] = s * arp + c * arq;
                }
                for r in 0..k {
                    let apr = a[p * k + r];
                    let aqr = a[q * k + r];
                    a[p * k + r] = c * apr - s * aqr;
                    a[q * k + r] = s * apr + c * aqr;
                }
                for r in 0..k {
                    let vrp = v[r * k + p];
                    let vrq = v[r * k + q];
                    v[r * k + p] = c * vrp - s * vrq;
                    v[r * k + q] = s * vrp + c * vrq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&x, &y| a[y * k + y].total_cmp(&a[x * k + x]).then(x.cmp(&y)));

    let values: Vec<f64> = order.iter().map(|&i| a[i * k + i]).collect();
    let mut vectors = vec![0.0; k * k];
    for (new_c, &old_c) in order.iter().enumerate() {
        for r in 0..k {
            vectors[r * k + new_c] = v[r * k + old_c];
        }
    }
    (values, vectors)
}

/// Project the embedding matrix onto its top two principal directions.
///
/// Returns one `[x, y]` per row. Never fails for `N ≥ 1`; a constant matrix
/// maps every row to the origin.
pub fn pca_2d(matrix: &EmbeddingMatrix, seed: u64) -> Vec<[f64; 2]> {
    let (n, d) = matrix.shape();
    if n == 0 {
        return Vec::new();
    }
    let l = SKETCH_WIDTH.min(d).min(n);
    debug!("Randomized PCA: N={}, D={}, sketch width {}", n, d, l);

    let x = Centred::new(matrix);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut omega = Columns::zeros(d, l);
    for v in omega.data.iter_mut() {
        *v = StandardNormal.sample(&mut rng);
    }

    let mut q = x.times(&omega);
    for it in 0..POWER_ITERATIONS {
        q.orthonormalise();
        q = x.times(&x.t_times(&q));
        trace!("power iteration {} done", it + 1);
    }
    q.orthonormalise();

    // B Bᵀ = Qᵀ X Xᵀ Q, built from Z = Xᵀ Q (D × l)
    let z = x.t_times(&q);
    let mut gram = vec![0.0; l * l];
    for a in 0..l {
        for b in a..l {
            let s: f64 = z.col(a).iter().zip(z.col(b)).map(|(p, r)| p * r).sum();
            gram[a * l + b] = s;
            gram[b * l + a] = s;
        }
    }
    let (values, vectors) = symmetric_eigen(gram, l);
    debug!("Leading variances: {:?}", &values[..values.len().min(2)]);

    let mut points = vec![[0.0f64; 2]; n];
    for comp in 0..l.min(2) {
        let scale = values[comp].max(0.0).sqrt();
        let mut scores = vec![0.0; n];
        for (i, s) in scores.iter_mut().enumerate() {
            let mut acc = 0.0;
            for a in 0..l {
                acc += q.col(a)[i] * vectors[a * l + comp];
            }
            *s = acc * scale;
        }

        // largest-magnitude entry positive
        let pivot = scores
            .iter()
            .copied()
            .fold(0.0f64, |best, s| if s.abs() > best.abs() { s } else { best });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for (p, s) in points.iter_mut().zip(&scores) {
            p[comp] = sign * s;
        }
    }
    points
}

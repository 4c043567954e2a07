use approx::assert_relative_eq;

use crate::reduction::{pca_2d, symmetric_eigen};
use crate::tests::init;
use crate::tests::test_data::{blobs, matrix};

fn variance(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let (ma, mb) = (a.iter().sum::<f64>() / n, b.iter().sum::<f64>() / n);
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / n;
    cov / (variance(a).sqrt() * variance(b).sqrt())
}

#[test]
fn test_symmetric_eigen_known_matrix() {
    let (values, vectors) = symmetric_eigen(vec![2.0, 1.0, 1.0, 2.0], 2);
    assert_relative_eq!(values[0], 3.0, epsilon = 1e-12);
    assert_relative_eq!(values[1], 1.0, epsilon = 1e-12);
    // leading eigenvector ∝ (1, 1)
    assert_relative_eq!(vectors[0].abs(), vectors[2].abs(), epsilon = 1e-12);
    assert_relative_eq!(vectors[0] * vectors[0] + vectors[2] * vectors[2], 1.0, epsilon = 1e-12);
}

#[test]
fn test_pca_recovers_dominant_direction() {
    init();
    // arc from -30° to 60° in the first plane: most variance along sin θ
    let angles: Vec<f64> = (0..40).map(|i| (-30.0 + 90.0 * i as f64 / 39.0_f64).to_radians()).collect();
    let rows: Vec<Vec<f64>> = angles.iter().map(|t| vec![t.cos(), t.sin(), 0.0]).collect();
    let m = matrix(rows);

    let pts = pca_2d(&m, 42);
    assert_eq!(pts.len(), 40);

    let xs: Vec<f64> = pts.iter().map(|p| p[0]).collect();
    let ys: Vec<f64> = pts.iter().map(|p| p[1]).collect();
    let sines: Vec<f64> = angles.iter().map(|t| t.sin()).collect();

    assert!(variance(&xs) > variance(&ys));
    assert!(correlation(&xs, &sines).abs() > 0.95);
}

#[test]
fn test_pca_sign_convention_and_determinism() {
    let (rows, _) = blobs(3, 15, 20, 0.4, 8);
    let m = matrix(rows);

    let a = pca_2d(&m, 42);
    let b = pca_2d(&m, 42);
    assert_eq!(a, b);

    for axis in 0..2 {
        let pivot = a
            .iter()
            .map(|p| p[axis])
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        assert!(pivot >= 0.0, "axis {axis} largest entry is negative");
    }
}

#[test]
fn test_pca_scores_are_centred() {
    let (rows, _) = blobs(2, 25, 10, 0.5, 13);
    let m = matrix(rows);
    let pts = pca_2d(&m, 1);
    for axis in 0..2 {
        let mean = pts.iter().map(|p| p[axis]).sum::<f64>() / pts.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_pca_degenerate_inputs() {
    let constant = matrix(vec![vec![1.0, 2.0]; 4]);
    let pts = pca_2d(&constant, 42);
    assert!(pts.iter().all(|p| p[0].abs() < 1e-9 && p[1].abs() < 1e-9));

    let one_dim = matrix(vec![vec![1.0], vec![-1.0], vec![1.0]]);
    let pts = pca_2d(&one_dim, 42);
    assert_eq!(pts.len(), 3);
    assert!(pts.iter().all(|p| p[1] == 0.0));
    // the lone -1 row has the largest centred magnitude
    assert!(pts[1][0] > 0.0);
    assert!(pts[0][0] < 0.0);
}

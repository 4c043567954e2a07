use crate::error::LayoutError;
use crate::graph::{adjacency_matrix, Edge};
use crate::layout::SpringParams;
use crate::spring::spring_layout;
use crate::tests::init;

/// Two 5-cliques (rows 0..5 and 5..10) with no edges between them.
fn two_cliques() -> Vec<Edge> {
    let mut edges = Vec::new();
    for base in [0usize, 5] {
        for a in 0..5 {
            for b in (a + 1)..5 {
                edges.push(Edge::new(base + a, base + b, 0.9));
            }
        }
    }
    edges
}

fn mean_distance(pts: &[[f64; 2]], pairs: impl Iterator<Item = (usize, usize)>) -> f64 {
    let (mut sum, mut count) = (0.0, 0usize);
    for (a, b) in pairs {
        sum += ((pts[a][0] - pts[b][0]).powi(2) + (pts[a][1] - pts[b][1]).powi(2)).sqrt();
        count += 1;
    }
    sum / count as f64
}

fn intra_and_inter(pts: &[[f64; 2]]) -> (f64, f64) {
    let intra = mean_distance(
        pts,
        (0..10).flat_map(|a| ((a + 1)..10).map(move |b| (a, b))).filter(|&(a, b)| (a < 5) == (b < 5)),
    );
    let inter = mean_distance(pts, (0..5).flat_map(|a| (5..10).map(move |b| (a, b))));
    (intra, inter)
}

#[test]
fn test_spring_separates_disconnected_cliques() {
    init();
    let adj = adjacency_matrix(10, &two_cliques());
    let pts = spring_layout(&adj, &SpringParams::default()).unwrap();

    assert_eq!(pts.len(), 10);
    let lim = pts
        .iter()
        .flat_map(|p| [p[0].abs(), p[1].abs()])
        .fold(0.0f64, f64::max);
    approx::assert_relative_eq!(lim, 1.0, epsilon = 1e-12);

    let (intra, inter) = intra_and_inter(&pts);
    assert!(intra < inter, "intra {intra} should be below inter {inter}");
}

#[test]
fn test_spring_is_seeded() {
    let adj = adjacency_matrix(10, &two_cliques());
    let p = SpringParams {
        iterations: 50,
        seed: 7,
    };
    let a = spring_layout(&adj, &p).unwrap();
    let b = spring_layout(&adj, &p).unwrap();
    assert_eq!(a, b);

    let other = spring_layout(&adj, &SpringParams { seed: 8, ..p }).unwrap();
    assert_ne!(a, other);
}

#[test]
fn test_spring_handles_edgeless_graph() {
    let adj = adjacency_matrix(6, &[]);
    let pts = spring_layout(&adj, &SpringParams::default()).unwrap();
    assert!(pts.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
}

#[test]
fn test_spring_needs_two_nodes() {
    let adj = adjacency_matrix(1, &[]);
    assert_eq!(
        spring_layout(&adj, &SpringParams::default()),
        Err(LayoutError::TooFewItems {
            backend: "fr",
            required: 2,
            provided: 1
        })
    );
}

#[cfg(feature = "force-atlas")]
mod force_atlas {
    use super::*;
    use crate::forceatlas::force_atlas2;
    use crate::layout::ForceAtlasParams;

    #[test]
    fn test_force_atlas_separates_disconnected_cliques() {
        init();
        let adj = adjacency_matrix(10, &two_cliques());
        let pts = force_atlas2(&adj, &ForceAtlasParams::default()).unwrap();

        assert_eq!(pts.len(), 10);
        assert!(pts.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
        let (intra, inter) = intra_and_inter(&pts);
        assert!(intra < inter, "intra {intra} should be below inter {inter}");
    }

    #[test]
    fn test_force_atlas_is_seeded() {
        let adj = adjacency_matrix(10, &two_cliques());
        let params = ForceAtlasParams {
            iterations: 100,
            ..ForceAtlasParams::default()
        };
        let a = force_atlas2(&adj, &params).unwrap();
        let b = force_atlas2(&adj, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_force_atlas_linear_mode_runs() {
        let adj = adjacency_matrix(10, &two_cliques());
        let params = ForceAtlasParams {
            iterations: 100,
            lin_log: false,
            outbound_attraction_distribution: false,
            ..ForceAtlasParams::default()
        };
        let pts = force_atlas2(&adj, &params).unwrap();
        assert!(pts.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
    }
}

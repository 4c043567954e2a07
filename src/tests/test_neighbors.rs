use crate::core::ClusterPartition;
use crate::neighbors::{batch_size_for, select_top_k, NeighborGraphBuilder, NeighborParams};
use crate::tests::init;
use crate::tests::test_data::{blobs, chain_rows, matrix};

fn params(top_k: usize, min_sim: f64) -> NeighborParams {
    NeighborParams {
        top_k,
        min_sim,
        same_cluster_only: false,
    }
}

#[test]
fn test_neighbor_lists_respect_k_floor_and_self() {
    init();
    let (rows, _) = blobs(4, 25, 16, 0.3, 7);
    let m = matrix(rows);
    let (k, tau) = (5, 0.6);

    let lists = NeighborGraphBuilder::new(&m, params(k, tau)).build();
    assert_eq!(lists.len(), m.nrows());

    for (i, row) in lists.iter().enumerate() {
        assert!(row.len() <= k);
        for &(j, s) in row {
            assert_ne!(i, j, "self pair returned for row {i}");
            assert!(s >= tau, "similarity {s} below floor");
            approx::assert_relative_eq!(s, m.dot(i, j), epsilon = 1e-12);
        }
        for w in row.windows(2) {
            assert!(w[0].1 > w[1].1 || (w[0].1 == w[1].1 && w[0].0 < w[1].0));
        }
    }
}

#[test]
fn test_neighbor_lists_match_brute_force() {
    let (rows, _) = blobs(3, 20, 8, 0.5, 11);
    let m = matrix(rows);
    let k = 4;
    let lists = NeighborGraphBuilder::new(&m, params(k, -1.0)).build();

    for i in 0..m.nrows() {
        let mut all: Vec<(usize, f64)> = (0..m.nrows())
            .filter(|&j| j != i)
            .map(|j| (j, m.dot(i, j)))
            .collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        all.truncate(k);
        assert_eq!(lists[i], all);
    }
}

#[test]
fn test_ties_break_by_row_index() {
    let m = matrix(vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 0.0],
    ]);
    let lists = NeighborGraphBuilder::new(&m, params(2, 0.5)).build();
    let picked: Vec<usize> = lists[2].iter().map(|&(j, _)| j).collect();
    assert_eq!(picked, vec![0, 1]);
    let picked: Vec<usize> = lists[0].iter().map(|&(j, _)| j).collect();
    assert_eq!(picked, vec![1, 2]);
}

#[test]
fn test_fewer_candidates_than_k_is_not_padded() {
    let m = matrix(chain_rows());
    let lists = NeighborGraphBuilder::new(&m, params(2, 0.5)).build();

    assert_eq!(lists[0].iter().map(|p| p.0).collect::<Vec<_>>(), vec![1]);
    assert_eq!(lists[1].iter().map(|p| p.0).collect::<Vec<_>>(), vec![0]);
    assert_eq!(lists[2].iter().map(|p| p.0).collect::<Vec<_>>(), vec![3]);
    assert_eq!(lists[3].iter().map(|p| p.0).collect::<Vec<_>>(), vec![2]);
    assert!(lists[4].is_empty());
}

#[test]
fn test_single_row_has_no_neighbors() {
    let m = matrix(vec![vec![0.3, 0.4]]);
    let lists = NeighborGraphBuilder::new(&m, params(8, 0.0)).build();
    assert_eq!(lists, vec![Vec::<(usize, f64)>::new()]);
}

#[test]
fn test_same_cluster_only_restricts_candidates() {
    init();
    let (rows, labels) = blobs(3, 10, 6, 2.0, 3);
    let m = matrix(rows);
    let partition = ClusterPartition::from_assignments(&labels);

    let restricted = NeighborParams {
        top_k: 6,
        min_sim: -1.0,
        same_cluster_only: true,
    };
    let lists = NeighborGraphBuilder::new(&m, restricted)
        .with_partition(&partition)
        .build();

    for (i, row) in lists.iter().enumerate() {
        assert_eq!(row.len(), 6);
        for &(j, _) in row {
            assert_eq!(labels[i], labels[j]);
        }
    }
}

#[test]
fn test_batching_does_not_change_results() {
    let (rows, labels) = blobs(2, 15, 5, 0.4, 5);
    let m = matrix(rows);
    let partition = ClusterPartition::from_assignments(&labels);

    let whole = NeighborGraphBuilder::new(&m, params(3, 0.2)).build();
    let batched = NeighborGraphBuilder::new(&m, params(3, 0.2))
        .with_batch_size(4)
        .build();
    assert_eq!(whole, batched);

    let mut p = params(3, 0.2);
    p.same_cluster_only = true;
    let whole = NeighborGraphBuilder::new(&m, p.clone())
        .with_partition(&partition)
        .build();
    let batched = NeighborGraphBuilder::new(&m, p)
        .with_partition(&partition)
        .with_batch_size(1)
        .build();
    assert_eq!(whole, batched);
}

#[test]
fn test_select_top_k_skips_non_finite_and_self() {
    let candidates = [0, 1, 2, 3, 4];
    let sims = [1.0, f64::NAN, 0.7, f64::INFINITY, 0.9];
    let top = select_top_k(0, &candidates, &sims, 3, 0.5);
    assert_eq!(top, vec![(4, 0.9), (2, 0.7)]);

    assert!(select_top_k(0, &candidates, &sims, 0, 0.5).is_empty());
}

#[test]
fn test_batch_size_shrinks_for_large_corpora() {
    assert_eq!(batch_size_for(1_000, 1_000), 4096);
    assert_eq!(batch_size_for(20_000, 100), 4096);
    assert_eq!(batch_size_for(20_001, 100), 1024);
    // memory ceiling dominates for very wide blocks
    assert_eq!(batch_size_for(30_000, 30_000), 559);
    assert!(batch_size_for(usize::MAX / 2, usize::MAX / 2) >= 1);
}

#[test]
fn test_neighbor_params_defaults_and_eq() {
    let p = NeighborParams::default();
    assert_eq!(p.top_k, 8);
    approx::assert_relative_eq!(p.min_sim, 0.85);
    assert!(!p.same_cluster_only);

    let mut q = p.clone();
    assert_eq!(p, q);
    q.top_k = 9;
    assert_ne!(p, q);
    // float fields compare exactly
    let r = NeighborParams {
        min_sim: p.min_sim + 1e-6,
        ..p.clone()
    };
    assert_ne!(p, r);
}

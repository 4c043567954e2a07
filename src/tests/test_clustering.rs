use crate::clustering::{kmeans_assign, KMEANS_SEED};
use crate::core::ClusterPartition;
use crate::error::GraphError;
use crate::tests::init;
use crate::tests::test_data::{blobs, matrix, orthogonal_groups};

#[test]
fn test_kmeans_separates_orthogonal_groups() {
    init();
    let (rows, labels) = orthogonal_groups();
    let m = matrix(rows);
    let assigned = kmeans_assign(&m, 2, 100, KMEANS_SEED).unwrap();

    assert_eq!(assigned.len(), 6);
    // same partition up to relabelling
    for i in 0..6 {
        for j in 0..6 {
            assert_eq!(labels[i] == labels[j], assigned[i] == assigned[j]);
        }
    }
}

#[test]
fn test_kmeans_is_deterministic_and_caps_k() {
    let (rows, _) = blobs(3, 10, 8, 0.2, 11);
    let m = matrix(rows);
    let a = kmeans_assign(&m, 3, 50, 7).unwrap();
    let b = kmeans_assign(&m, 3, 50, 7).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|&c| (0..3).contains(&c)));

    let small = matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    let capped = kmeans_assign(&small, 10, 20, KMEANS_SEED).unwrap();
    assert!(ClusterPartition::from_assignments(&capped).len() <= 2);
}

#[test]
fn test_kmeans_rejects_bad_parameters() {
    let m = matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert!(matches!(
        kmeans_assign(&m, 0, 10, KMEANS_SEED),
        Err(GraphError::InvalidParameter(_))
    ));
    assert!(matches!(
        kmeans_assign(&m, 2, 0, KMEANS_SEED),
        Err(GraphError::InvalidParameter(_))
    ));
}

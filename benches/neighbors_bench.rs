use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use simgraph::core::{ClusterPartition, EmbeddingMatrix};
use simgraph::graph::EdgeDeduplicator;
use simgraph::neighbors::{NeighborGraphBuilder, NeighborParams};
use simgraph::spanning::ConnectivityAugmenter;
use std::hint::black_box;
use std::time::Duration;

/// `n` rows around `clusters` random directions, with their cluster ids.
fn synthetic_corpus(n: usize, dim: usize, clusters: usize, seed: u64) -> (EmbeddingMatrix, Vec<i64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let centres: Vec<Vec<f64>> = (0..clusters)
        .map(|_| (0..dim).map(|_| rng.random::<f64>() - 0.5).collect())
        .collect();

    let mut rows = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let c = i % clusters;
        rows.push(
            centres[c]
                .iter()
                .map(|&x| x + 0.15 * (rng.random::<f64>() - 0.5))
                .collect::<Vec<f64>>(),
        );
        labels.push(c as i64);
    }
    let ids = (0..n).map(|i| format!("doc-{i}")).collect();
    let matrix = EmbeddingMatrix::from_rows(ids, rows).expect("synthetic rows are well formed");
    (matrix, labels)
}

fn criterion_benchmark(c: &mut Criterion) {
    let params = NeighborParams {
        top_k: 8,
        min_sim: 0.5,
        same_cluster_only: false,
    };

    // Group 1: top-K search scaling with corpus size
    let mut group_topk = c.benchmark_group("neighbors_topk");
    group_topk.warm_up_time(Duration::from_millis(300));
    group_topk.measurement_time(Duration::from_secs(3));
    group_topk.sample_size(15);

    for &n in &[250usize, 1000, 4000] {
        let (matrix, _) = synthetic_corpus(n, 64, 12, 42);
        group_topk.bench_function(BenchmarkId::new("global", n), |b| {
            b.iter(|| {
                let lists = NeighborGraphBuilder::new(&matrix, params.clone()).build();
                black_box(lists);
            })
        });
    }

    let (matrix, labels) = synthetic_corpus(2000, 64, 12, 42);
    let partition = ClusterPartition::from_assignments(&labels);
    let scoped = NeighborParams {
        same_cluster_only: true,
        ..params.clone()
    };
    group_topk.bench_function(BenchmarkId::new("per_cluster", 2000), |b| {
        b.iter(|| {
            let lists = NeighborGraphBuilder::new(&matrix, scoped.clone())
                .with_partition(&partition)
                .build();
            black_box(lists);
        })
    });

    group_topk.finish();

    // Group 2: batch size against a fixed corpus
    let mut group_batch = c.benchmark_group("neighbors_batch_size");
    group_batch.warm_up_time(Duration::from_millis(200));
    group_batch.measurement_time(Duration::from_secs(2));
    group_batch.sample_size(15);

    for &rows in &[64usize, 512, 4096] {
        group_batch.bench_function(BenchmarkId::new("rows", rows), |b| {
            b.iter(|| {
                let lists = NeighborGraphBuilder::new(&matrix, params.clone())
                    .with_batch_size(rows)
                    .build();
                black_box(lists);
            })
        });
    }

    group_batch.finish();

    // Group 3: spanning trees and merge
    let mut group_tree = c.benchmark_group("connectivity");
    group_tree.warm_up_time(Duration::from_millis(200));
    group_tree.measurement_time(Duration::from_secs(2));
    group_tree.sample_size(15);

    group_tree.bench_function(BenchmarkId::new("augment", 2000), |b| {
        b.iter(|| black_box(ConnectivityAugmenter::new(&matrix, &partition).augment()))
    });

    let lists = NeighborGraphBuilder::new(&matrix, params.clone()).build();
    group_tree.bench_function(BenchmarkId::new("merge", 2000), |b| {
        b.iter_batched(
            || ConnectivityAugmenter::new(&matrix, &partition).augment(),
            |tree| black_box(EdgeDeduplicator::merge(&lists, &tree, params.min_sim)),
            BatchSize::SmallInput,
        )
    });

    group_tree.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

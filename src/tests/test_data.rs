use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::core::{EmbeddingMatrix, Item};
use crate::store::InMemoryVectorStore;

/// Unit vector at `deg` degrees in the plane.
pub fn unit_2d(deg: f64) -> Vec<f64> {
    let r = deg.to_radians();
    vec![r.cos(), r.sin()]
}

pub fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("item-{i}")).collect()
}

pub fn matrix(rows: Vec<Vec<f64>>) -> EmbeddingMatrix {
    EmbeddingMatrix::from_rows(ids(rows.len()), rows).unwrap()
}

pub fn store_and_items(rows: &[Vec<f64>], clusters: &[i64]) -> (InMemoryVectorStore, Vec<Item>) {
    let mut store = InMemoryVectorStore::new();
    let mut items = Vec::new();
    for ((id, row), &cid) in ids(rows.len()).into_iter().zip(rows).zip(clusters) {
        store.insert(id.clone(), row.clone()).unwrap();
        items.push(Item::new(id, cid));
    }
    (store, items)
}

/// Five planar vectors at 0°, 25°, 95°, 120°, 190°: two tight pairs and a
/// loner, with 70° gaps bridging them.
pub fn chain_rows() -> Vec<Vec<f64>> {
    [0.0, 25.0, 95.0, 120.0, 190.0]
        .iter()
        .map(|&d| unit_2d(d))
        .collect()
}

/// Two groups of three living in orthogonal planes (zero cross similarity).
pub fn orthogonal_groups() -> (Vec<Vec<f64>>, Vec<i64>) {
    let mut rows = Vec::new();
    for plane in 0..2 {
        for deg in [0.0f64, 10.0, 20.0] {
            let r = deg.to_radians();
            let mut v = vec![0.0; 4];
            v[2 * plane] = r.cos();
            v[2 * plane + 1] = r.sin();
            rows.push(v);
        }
    }
    (rows, vec![0, 0, 0, 1, 1, 1])
}

/// `k` Gaussian blobs of `per` points in `dim` dimensions around random
/// centres, with cluster ids.
pub fn blobs(k: usize, per: usize, dim: usize, spread: f64, seed: u64) -> (Vec<Vec<f64>>, Vec<i64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(k * per);
    let mut labels = Vec::with_capacity(k * per);
    for c in 0..k {
        let centre: Vec<f64> = (0..dim).map(|_| StandardNormal.sample(&mut rng)).collect();
        for _ in 0..per {
            let row = centre
                .iter()
                .map(|&x| {
                    let noise: f64 = StandardNormal.sample(&mut rng);
                    x + spread * noise
                })
                .collect();
            rows.push(row);
            labels.push(c as i64);
        }
    }
    (rows, labels)
}

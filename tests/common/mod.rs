//! Shared fixtures: seeded random vectors and a brute-force reference.

#![allow(dead_code)]

use annforest::{Metric, Vector, VectorStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<(String, Vector)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let data: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            (format!("item{}", i), Vector::new(data))
        })
        .collect()
}

/// Exact top-k slots for a self-query, ordered by (distance, slot).
pub fn brute_force_neighbors(store: &VectorStore, slot: u32, k: usize) -> Vec<u32> {
    let mut all: Vec<(f32, u32)> = (0..store.len() as u32)
        .filter(|&other| other != slot)
        .map(|other| (store.distance(slot, other), other))
        .collect();
    all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    all.into_iter().take(k).map(|(_, s)| s).collect()
}

pub fn overlap(found: &[u32], truth: &[u32]) -> usize {
    found.iter().filter(|s| truth.contains(s)).count()
}

pub fn metric_store(metric: Metric, vectors: Vec<(String, Vector)>) -> VectorStore {
    VectorStore::create(metric, vectors).unwrap()
}

//! ANN Benchmark: synthetic clustered vectors, cosine
//! Measures Recall@10 and QPS of the HNSW graph against an exact scan,
//! plus filtered-search behaviour at several predicate selectivities.
//!
//! Usage: cargo bench --bench ann_recall

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use searchsim_core::hnsw::{DistanceMetric, HnswConfig, HnswIndex};
use searchsim_core::search::backend::{exact_search_where, SearchBackend};
use searchsim_core::search::filtered::FilteredSearch;
use searchsim_core::vector::VectorStore;
use std::collections::HashSet;
use std::time::Instant;

const DIM: usize = 64;
const TRAIN: usize = 20_000;
const QUERIES: usize = 500;
const CLUSTERS: usize = 50;
const K: usize = 10;

/// Gaussian-ish clusters: each vector is a centroid plus uniform noise.
fn clustered(rng: &mut StdRng, centroids: &[Vec<f32>]) -> Vec<f32> {
    let c = &centroids[rng.gen_range(0..centroids.len())];
    c.iter().map(|x| x + rng.gen_range(-0.3f32..0.3)).collect()
}

fn recall_at_k(predicted: &[String], truth: &[String]) -> f64 {
    let truth: HashSet<&str> = truth.iter().map(String::as_str).collect();
    let found = predicted
        .iter()
        .filter(|id| truth.contains(id.as_str()))
        .count();
    found as f64 / truth.len().max(1) as f64
}

fn main() {
    println!("=== ANN Benchmark: synthetic {DIM}d, {CLUSTERS} clusters, cosine ===");
    println!();

    let mut rng = StdRng::seed_from_u64(2024);
    let centroids: Vec<Vec<f32>> = (0..CLUSTERS)
        .map(|_| (0..DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect();
    let train: Vec<Vec<f32>> = (0..TRAIN).map(|_| clustered(&mut rng, &centroids)).collect();
    let queries: Vec<Vec<f32>> = (0..QUERIES).map(|_| clustered(&mut rng, &centroids)).collect();

    println!("--- Index Construction ---");
    let config = HnswConfig::new(16, 200, 100, DistanceMetric::Cosine);
    let mut index = HnswIndex::with_seed(DIM, config, 42);
    let mut store = VectorStore::new("embedding", DIM, TRAIN);

    let t0 = Instant::now();
    for (i, v) in train.iter().enumerate() {
        let id = format!("doc{i:06}");
        index.insert(&id, v);
        if store.upsert(&id, v.clone()).is_err() {
            panic!("store rejected {id}");
        }
        if (i + 1) % 5_000 == 0 {
            let rate = (i + 1) as f64 / t0.elapsed().as_secs_f64();
            println!("  inserted {}/{TRAIN} ({rate:.0} vec/s)", i + 1);
        }
    }
    let build = t0.elapsed();
    println!(
        "  Build time: {:.2}s ({:.0} inserts/s), max layer {}",
        build.as_secs_f64(),
        TRAIN as f64 / build.as_secs_f64(),
        index.max_layer()
    );

    println!();
    print!("Computing exact ground truth...");
    let truth: Vec<Vec<String>> = queries
        .iter()
        .map(|q| {
            exact_search_where(&store, DistanceMetric::Cosine, q, K, |_| true)
                .into_iter()
                .map(|(id, _)| id)
                .collect()
        })
        .collect();
    println!(" done");

    println!();
    println!("  ef_search | Recall@10 |    QPS    | Avg latency");
    println!("  ----------+-----------+-----------+------------");
    let backend = SearchBackend::Ann(&index);
    for ef in [10, 20, 40, 80, 120, 200, 400] {
        for q in queries.iter().take(10) {
            let _ = backend.search(q, K, ef);
        }
        let t0 = Instant::now();
        let mut total_recall = 0.0;
        for (q, gt) in queries.iter().zip(&truth) {
            let predicted: Vec<String> = backend
                .search(q, K, ef)
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            total_recall += recall_at_k(&predicted, gt);
        }
        let elapsed = t0.elapsed();
        println!(
            "  {:>9} | {:.4}    | {:>9.1} | {:.0} us",
            ef,
            total_recall / QUERIES as f64,
            QUERIES as f64 / elapsed.as_secs_f64(),
            elapsed.as_micros() as f64 / QUERIES as f64
        );
    }

    println!();
    println!("--- Filtered search (oversample 5, ef 100) ---");
    println!("  selectivity | Recall@10 | fallbacks | Avg latency");
    println!("  ------------+-----------+-----------+------------");
    for modulus in [2usize, 10, 100, 1000] {
        let predicate = |id: &str| {
            id.trim_start_matches("doc")
                .parse::<usize>()
                .is_ok_and(|n| n % modulus == 0)
        };
        let strategy = FilteredSearch {
            field: "embedding",
            backend: SearchBackend::Ann(&index),
            store: &store,
            metric: DistanceMetric::Cosine,
        };
        let filtered_truth: Vec<Vec<String>> = queries
            .iter()
            .map(|q| {
                exact_search_where(&store, DistanceMetric::Cosine, q, K, predicate)
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect()
            })
            .collect();
        let t0 = Instant::now();
        let mut total_recall = 0.0;
        let mut fallbacks = 0;
        for (q, gt) in queries.iter().zip(&filtered_truth) {
            let (hits, diagnostics) = strategy.run(q, K, 100, 5, predicate);
            let predicted: Vec<String> = hits.into_iter().map(|(id, _)| id).collect();
            total_recall += recall_at_k(&predicted, gt);
            if diagnostics.low_selectivity {
                fallbacks += 1;
            }
        }
        let elapsed = t0.elapsed();
        println!(
            "  {:>10.3}  | {:.4}    | {:>9} | {:.0} us",
            1.0 / modulus as f64,
            total_recall / QUERIES as f64,
            fallbacks,
            elapsed.as_micros() as f64 / QUERIES as f64
        );
    }

    println!();
    println!("=== Benchmark complete ===");
}

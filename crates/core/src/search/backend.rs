//! Search backends for a vector field: the HNSW graph or an exact scan of the store.
//!
//! The backend is picked once per query by [`select_backend`]; both variants
//! answer the same `search(query, k, ef)` call with `(document_id, distance)`
//! pairs sorted by ascending distance.

use crate::config;
use crate::hnsw::distance::{norm, similarity_from_distance, DistanceMetric};
use crate::hnsw::HnswIndex;
use crate::search::types::{BackendKind, SearchResult};
use crate::vector::store::VectorStore;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

pub enum SearchBackend<'a> {
    Ann(&'a HnswIndex),
    Exact(&'a VectorStore, DistanceMetric),
}

/// Inputs to the backend policy, gathered under the field's read lock.
#[derive(Debug, Clone, Copy)]
pub struct BackendPolicy {
    /// Caller asked for an exhaustive search.
    pub exhaustive: bool,
    /// The field's profile disables ANN.
    pub ann_disabled: bool,
    /// The graph is pending a rebuild or out of sync with the store.
    pub stale: bool,
    /// Live vectors in the field.
    pub live: usize,
}

impl BackendPolicy {
    pub fn kind(&self) -> BackendKind {
        if self.exhaustive
            || self.ann_disabled
            || self.live < config::EXACT_SEARCH_THRESHOLD
            || self.stale
        {
            BackendKind::Exact
        } else {
            BackendKind::Ann
        }
    }
}

/// Pick the backend for one query.
pub fn select_backend<'a>(
    policy: BackendPolicy,
    index: &'a HnswIndex,
    store: &'a VectorStore,
    metric: DistanceMetric,
) -> SearchBackend<'a> {
    match policy.kind() {
        BackendKind::Ann => SearchBackend::Ann(index),
        BackendKind::Exact => SearchBackend::Exact(store, metric),
    }
}

impl SearchBackend<'_> {
    pub fn kind(&self) -> BackendKind {
        match self {
            SearchBackend::Ann(_) => BackendKind::Ann,
            SearchBackend::Exact(..) => BackendKind::Exact,
        }
    }

    /// Up to `k` nearest documents. `ef` is ignored by the exact backend.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(String, f32)> {
        self.search_where(query, k, ef, |_| true)
    }

    /// Up to `k` nearest documents passing `predicate`.
    pub fn search_where<P: Fn(&str) -> bool>(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        predicate: P,
    ) -> Vec<(String, f32)> {
        match self {
            SearchBackend::Ann(index) => index
                .search_where(query, k, ef, predicate)
                .into_iter()
                .map(|(dist, label)| (index.document_id(label).to_string(), dist))
                .collect(),
            SearchBackend::Exact(store, metric) => {
                exact_search_where(store, *metric, query, k, predicate)
            }
        }
    }
}

/// Linear scan over `store`, keeping the `k` closest documents that pass `predicate`.
///
/// Ties are broken by document id, ascending.
pub fn exact_search_where<P: Fn(&str) -> bool>(
    store: &VectorStore,
    metric: DistanceMetric,
    query: &[f32],
    k: usize,
    predicate: P,
) -> Vec<(String, f32)> {
    if k == 0 {
        return Vec::new();
    }
    let query_norm = norm(query);
    // Max-heap of size k: the worst kept hit sits on top
    let mut heap: BinaryHeap<(OrderedFloat<f32>, &str)> = BinaryHeap::with_capacity(k + 1);
    for (id, vector) in store.iter() {
        if !predicate(id) {
            continue;
        }
        let dist = metric.distance_with_norms(query, query_norm, vector, norm(vector));
        heap.push((OrderedFloat(dist), id));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_sorted_vec()
        .into_iter()
        .map(|(d, id)| (id.to_string(), d.0))
        .collect()
}

/// Attach similarity and 1-indexed rank to sorted `(document_id, distance)` hits.
pub fn into_results(hits: Vec<(String, f32)>) -> Vec<SearchResult> {
    hits.into_iter()
        .enumerate()
        .map(|(i, (document_id, distance))| SearchResult {
            document_id,
            distance,
            similarity: similarity_from_distance(distance),
            rank: i + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::HnswConfig;

    fn store_with(vectors: &[(&str, [f32; 2])]) -> VectorStore {
        let mut store = VectorStore::new("v", 2, 100);
        for (id, v) in vectors {
            store.upsert(id, v.to_vec()).unwrap();
        }
        store
    }

    #[test]
    fn test_policy_prefers_exact_for_small_fields() {
        let base = BackendPolicy {
            exhaustive: false,
            ann_disabled: false,
            stale: false,
            live: 1_000,
        };
        assert_eq!(base.kind(), BackendKind::Ann);
        assert_eq!(BackendPolicy { live: 63, ..base }.kind(), BackendKind::Exact);
        assert_eq!(BackendPolicy { live: 64, ..base }.kind(), BackendKind::Ann);
        assert_eq!(BackendPolicy { exhaustive: true, ..base }.kind(), BackendKind::Exact);
        assert_eq!(BackendPolicy { ann_disabled: true, ..base }.kind(), BackendKind::Exact);
        assert_eq!(BackendPolicy { stale: true, ..base }.kind(), BackendKind::Exact);
    }

    #[test]
    fn test_select_backend_variants() {
        let store = store_with(&[("a", [1.0, 0.0])]);
        let index = HnswIndex::new(2, HnswConfig::default());
        let policy = BackendPolicy {
            exhaustive: false,
            ann_disabled: false,
            stale: false,
            live: 1,
        };
        let backend = select_backend(policy, &index, &store, DistanceMetric::Cosine);
        assert_eq!(backend.kind(), BackendKind::Exact);
        assert_eq!(backend.search(&[1.0, 0.0], 5, 10).len(), 1);
    }

    #[test]
    fn test_exact_scenario_three_vectors() {
        let store = store_with(&[("x", [1.0, 0.0]), ("y", [0.0, 1.0]), ("z", [0.9, 0.1])]);
        let hits = exact_search_where(&store, DistanceMetric::Cosine, &[1.0, 0.0], 2, |_| true);
        let results = into_results(hits);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "x");
        assert_eq!(results[0].rank, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].document_id, "z");
        assert!(results[1].similarity > 0.99);
    }

    #[test]
    fn test_exact_ties_by_document_id() {
        let store = store_with(&[("c", [2.0, 0.0]), ("a", [1.0, 0.0]), ("b", [3.0, 0.0])]);
        let hits = exact_search_where(&store, DistanceMetric::Cosine, &[1.0, 0.0], 3, |_| true);
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exact_predicate_restricts() {
        let store = store_with(&[("a", [1.0, 0.0]), ("b", [0.9, 0.1]), ("c", [0.0, 1.0])]);
        let hits = exact_search_where(&store, DistanceMetric::Cosine, &[1.0, 0.0], 5, |id| id != "a");
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}

//! Filtered vector search: oversample, widen, then fall back to an exact scan.
//!
//! For a predicate that passes a fraction `s` of the field, the first ANN pass
//! returns enough matches once `oversample × s` is comfortably above 1. Very
//! selective predicates exhaust both ANN passes and end in the exact scan,
//! which is flagged as `low_selectivity` in the diagnostics. The fallback
//! result is exact. Every pass only reads the graph and store, so a caller may
//! abandon the query at any point.

use crate::config;
use crate::hnsw::distance::DistanceMetric;
use crate::search::backend::{exact_search_where, SearchBackend};
use crate::search::types::{FilterDiagnostics, FilterPath};
use crate::vector::store::VectorStore;

/// A filtered query against one vector field's read-locked state.
pub struct FilteredSearch<'a> {
    pub field: &'a str,
    pub backend: SearchBackend<'a>,
    pub store: &'a VectorStore,
    pub metric: DistanceMetric,
}

impl FilteredSearch<'_> {
    /// Up to `k` `(document_id, distance)` hits passing `predicate`, nearest first.
    pub fn run<P: Fn(&str) -> bool>(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        oversample: usize,
        predicate: P,
    ) -> (Vec<(String, f32)>, FilterDiagnostics) {
        let index = match &self.backend {
            SearchBackend::Ann(index) => *index,
            SearchBackend::Exact(..) => {
                let hits = exact_search_where(self.store, self.metric, query, k, &predicate);
                let diagnostics = FilterDiagnostics {
                    path: FilterPath::ExactScan,
                    candidates_examined: self.store.len(),
                    low_selectivity: false,
                };
                return (hits, diagnostics);
            }
        };

        let mut examined = 0;
        let mut wanted = k.saturating_mul(oversample.max(1));
        let mut beam = ef.max(wanted);

        for path in [FilterPath::Oversampled, FilterPath::Widened] {
            let candidates = index.search(query, wanted, beam);
            examined += candidates.len();
            let kept: Vec<(String, f32)> = candidates
                .into_iter()
                .map(|(dist, label)| (index.document_id(label), dist))
                .filter(|&(id, _)| predicate(id))
                .take(k)
                .map(|(id, dist)| (id.to_string(), dist))
                .collect();
            if kept.len() >= k {
                tracing::debug!(
                    field = self.field,
                    ?path,
                    examined,
                    "filtered vector search satisfied by ANN"
                );
                let diagnostics = FilterDiagnostics {
                    path,
                    candidates_examined: examined,
                    low_selectivity: false,
                };
                return (kept, diagnostics);
            }
            wanted = wanted.saturating_mul(config::FILTER_WIDEN_FACTOR);
            beam = beam.saturating_mul(config::FILTER_WIDEN_FACTOR);
        }

        tracing::warn!(
            field = self.field,
            k,
            examined,
            "filter too selective for ANN; falling back to exact scan"
        );
        let hits = exact_search_where(self.store, self.metric, query, k, &predicate);
        let diagnostics = FilterDiagnostics {
            path: FilterPath::ExactFallback,
            candidates_examined: examined + self.store.len(),
            low_selectivity: true,
        };
        (hits, diagnostics)
    }
}

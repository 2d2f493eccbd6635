//! Prometheus metrics recording and background collection.

use metrics::{counter, gauge, histogram};
use searchsim_core::storage::Catalog;
use std::time::Duration;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records a search request and any exact-scan fallbacks it triggered.
pub fn record_search(index: &str, mode: &'static str, exact_fallbacks: usize) {
    counter!(
        "searchsim_search_total",
        "index" => index.to_string(),
        "mode" => mode
    )
    .increment(1);
    if exact_fallbacks > 0 {
        counter!("searchsim_search_fallback_total", "index" => index.to_string())
            .increment(exact_fallbacks as u64);
    }
}

/// Records the outcome of an indexing batch.
pub fn record_indexing(index: &str, succeeded: usize, failed: usize) {
    counter!(
        "searchsim_documents_indexed_total",
        "index" => index.to_string(),
        "outcome" => "success"
    )
    .increment(succeeded as u64);
    if failed > 0 {
        counter!(
            "searchsim_documents_indexed_total",
            "index" => index.to_string(),
            "outcome" => "failure"
        )
        .increment(failed as u64);
    }
}

/// Updates index-level Prometheus gauges.
pub fn update_index_metrics(catalog: &Catalog) {
    let indexes = catalog.list();
    gauge!("searchsim_indexes_total").set(indexes.len() as f64);
    for index in &indexes {
        let stats = index.stats();
        gauge!("searchsim_documents_total", "index" => stats.name.clone())
            .set(stats.document_count as f64);
        for field in stats.vector_fields {
            let labels = [("index", stats.name.clone()), ("field", field.name)];
            gauge!("searchsim_vectors_total", &labels).set(field.vectors as f64);
            gauge!("searchsim_tombstone_ratio", &labels).set(field.tombstone_ratio as f64);
            gauge!("searchsim_field_stale", &labels).set(if field.stale { 1.0 } else { 0.0 });
        }
    }
}

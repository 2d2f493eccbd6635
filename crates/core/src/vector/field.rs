//! Vector search service for one vector field.
//!
//! A [`VectorField`] owns the field's [`VectorStore`] (source of truth) and its
//! [`HnswIndex`] behind a single `RwLock`. Queries take the read lock and pick
//! a backend once; mutations take the write lock and update the store before
//! the graph. The graph can always be rebuilt from the store.

use crate::config;
use crate::error::{check_k, check_vector, Result, SearchError};
use crate::hnsw::{self, HnswIndex};
use crate::schema::VectorSettings;
use crate::search::backend::{into_results, select_backend, BackendPolicy};
use crate::search::filtered::FilteredSearch;
use crate::search::types::{BackendKind, FilteredOutcome, SearchResult, VectorSearchOptions};
use crate::vector::store::VectorStore;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

struct FieldState {
    store: VectorStore,
    index: HnswIndex,
    /// The graph must not serve queries until the next rebuild.
    stale: bool,
}

impl FieldState {
    fn policy(&self, settings: &VectorSettings, exhaustive: bool) -> BackendPolicy {
        BackendPolicy {
            exhaustive,
            ann_disabled: settings.exhaustive,
            stale: self.stale || self.index.len() != self.store.len(),
            live: self.store.len(),
        }
    }
}

/// Point-in-time counters for one vector field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub name: String,
    pub dimension: usize,
    pub metric: &'static str,
    pub vectors: usize,
    pub capacity: usize,
    pub graph_labels: usize,
    pub tombstone_ratio: f32,
    pub stale: bool,
    pub backend: BackendKind,
}

pub struct VectorField {
    name: String,
    settings: VectorSettings,
    state: RwLock<FieldState>,
}

impl VectorField {
    pub fn new(name: impl Into<String>, settings: VectorSettings) -> Self {
        let name = name.into();
        let store = VectorStore::new(name.clone(), settings.dimension, settings.capacity);
        Self::from_store(name, settings, store)
    }

    /// Wrap a restored store. The graph starts empty and is marked stale until
    /// an artifact is loaded or the graph is rebuilt.
    pub fn from_store(name: impl Into<String>, settings: VectorSettings, store: VectorStore) -> Self {
        let index = HnswIndex::new(settings.dimension, settings.hnsw.clone());
        let stale = !store.is_empty() && !settings.exhaustive;
        Self {
            name: name.into(),
            settings,
            state: RwLock::new(FieldState {
                store,
                index,
                stale,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &VectorSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate a write without applying it.
    pub fn check_upsert(&self, document_id: &str, vector: &[f32]) -> Result<()> {
        self.state.read().store.check_insert(document_id, vector)
    }

    /// Store `vector` for `document_id`, replacing any previous vector.
    pub fn upsert_vector(&self, document_id: &str, vector: Vec<f32>) -> Result<()> {
        let mut state = self.state.write();
        state.store.check_insert(document_id, &vector)?;
        if !self.settings.exhaustive {
            state.index.insert(document_id, &vector);
        }
        state.store.upsert(document_id, vector)
    }

    /// Remove the vector for `document_id`. Returns whether one was stored.
    pub fn delete_vector(&self, document_id: &str) -> bool {
        let mut state = self.state.write();
        state.index.remove(document_id);
        state.store.remove(document_id).is_some()
    }

    pub fn get_vector(&self, document_id: &str) -> Option<Vec<f32>> {
        self.state.read().store.get(document_id).map(<[f32]>::to_vec)
    }

    /// Up to `k` nearest documents, nearest first.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &VectorSearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.search_with_backend(query, k, options)
            .map(|(results, _)| results)
    }

    /// Like [`search`](Self::search), also reporting the backend that served
    /// the query.
    pub fn search_with_backend(
        &self,
        query: &[f32],
        k: usize,
        options: &VectorSearchOptions,
    ) -> Result<(Vec<SearchResult>, BackendKind)> {
        check_vector(query, self.settings.dimension)?;
        check_k(k, config::MAX_K)?;
        let ef = self.beam_width(options)?;

        let state = self.state.read();
        let backend = select_backend(
            state.policy(&self.settings, options.exhaustive),
            &state.index,
            &state.store,
            self.settings.hnsw.distance_metric,
        );
        let hits = backend.search(query, k, ef);
        tracing::debug!(field = %self.name, backend = ?backend.kind(), k, hits = hits.len(), "vector search");
        Ok((into_results(hits), backend.kind()))
    }

    /// Up to `k` nearest documents passing `predicate`, with diagnostics
    /// describing how the filter was applied.
    pub fn search_filtered<P: Fn(&str) -> bool>(
        &self,
        query: &[f32],
        k: usize,
        options: &VectorSearchOptions,
        predicate: P,
    ) -> Result<FilteredOutcome> {
        check_vector(query, self.settings.dimension)?;
        check_k(k, config::MAX_K)?;
        let ef = self.beam_width(options)?;

        let state = self.state.read();
        let metric = self.settings.hnsw.distance_metric;
        let strategy = FilteredSearch {
            field: &self.name,
            backend: select_backend(
                state.policy(&self.settings, options.exhaustive),
                &state.index,
                &state.store,
                metric,
            ),
            store: &state.store,
            metric,
        };
        let backend = strategy.backend.kind();
        let (hits, diagnostics) = strategy.run(query, k, ef, options.oversample, predicate);
        Ok(FilteredOutcome {
            results: into_results(hits),
            backend,
            diagnostics,
        })
    }

    /// Resolve the query's beam width and check both per-query knobs.
    fn beam_width(&self, options: &VectorSearchOptions) -> Result<usize> {
        let ef = options.ef.unwrap_or(self.settings.hnsw.ef_search);
        if ef == 0 || ef > config::MAX_EF_SEARCH {
            return Err(SearchError::InvalidRequest(format!(
                "ef must be between 1 and {}",
                config::MAX_EF_SEARCH
            )));
        }
        if options.oversample == 0 || options.oversample > config::MAX_OVERSAMPLE_MULTIPLIER {
            return Err(SearchError::InvalidRequest(format!(
                "oversampling must be between 1 and {}",
                config::MAX_OVERSAMPLE_MULTIPLIER
            )));
        }
        Ok(ef)
    }

    /// Whether the graph should be rebuilt from the store.
    pub fn needs_rebuild(&self) -> bool {
        if self.settings.exhaustive {
            return false;
        }
        let state = self.state.read();
        state.stale
            || state.index.len() != state.store.len()
            || state.index.tombstone_ratio() > self.settings.rebuild_ratio
    }

    /// Rebuild the graph from the store. Returns the number of vectors indexed.
    ///
    /// The store is copied under the read lock and the new graph is built
    /// without holding any lock. The swap takes the write lock and replays
    /// whatever changed in the store while the graph was being built.
    pub fn rebuild(&self) -> usize {
        if self.settings.exhaustive {
            return 0;
        }
        let started = Instant::now();

        // Phase A: snapshot under read lock
        let snapshot: BTreeMap<String, Vec<f32>> = {
            let state = self.state.read();
            state
                .store
                .iter()
                .map(|(id, v)| (id.to_string(), v.to_vec()))
                .collect()
        };

        // Phase B: build without any lock
        let mut index = HnswIndex::new(self.settings.dimension, self.settings.hnsw.clone());
        for (id, vector) in &snapshot {
            index.insert(id, vector);
        }

        // Phase C: swap and catch up
        let mut state = self.state.write();
        let replayed = replay_changes(&mut index, &snapshot, &state.store);
        state.index = index;
        state.stale = false;
        let count = state.store.len();
        drop(state);

        tracing::info!(
            field = %self.name,
            vectors = count,
            replayed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rebuilt HNSW graph"
        );
        count
    }

    /// The store and its encoded graph, copied under one read lock so the
    /// pair describes the same moment. The graph is `None` when there is no
    /// usable graph to persist.
    pub fn persist_parts(&self) -> Result<(VectorStore, Option<Vec<u8>>)> {
        let state = self.state.read();
        let graph = if self.settings.exhaustive {
            None
        } else if state.stale {
            tracing::debug!(field = %self.name, "skipping artifact for stale graph");
            None
        } else {
            Some(hnsw::encode_artifact(&state.index)?)
        };
        Ok((state.store.clone(), graph))
    }

    /// Restore the graph from `path`, rebuilding from the store when the
    /// artifact is missing, corrupt, built with other parameters, or out of
    /// step with the store. Returns `true` if the artifact was used.
    pub fn load_artifact(&self, path: &Path) -> bool {
        if self.settings.exhaustive {
            return false;
        }
        let loaded = if path.exists() {
            match hnsw::load_artifact(path, &self.settings.hnsw, self.settings.dimension) {
                Ok(index) => {
                    let mut state = self.state.write();
                    if in_step(&index, &state.store) {
                        state.index = index;
                        state.stale = false;
                        true
                    } else {
                        tracing::warn!(
                            field = %self.name,
                            "graph artifact does not match stored vectors; rebuilding"
                        );
                        false
                    }
                }
                Err(e @ SearchError::ParameterMismatch(_)) => {
                    tracing::warn!(field = %self.name, error = %e, "discarding graph artifact; rebuilding");
                    false
                }
                Err(e) => {
                    tracing::warn!(field = %self.name, error = %e, "unreadable graph artifact; rebuilding");
                    false
                }
            }
        } else {
            false
        };

        if !loaded {
            self.state.write().stale = true;
            self.rebuild();
        }
        loaded
    }

    pub fn stats(&self) -> FieldStats {
        let state = self.state.read();
        FieldStats {
            name: self.name.clone(),
            dimension: self.settings.dimension,
            metric: self.settings.hnsw.distance_metric.name(),
            vectors: state.store.len(),
            capacity: self.settings.capacity,
            graph_labels: state.index.label_count(),
            tombstone_ratio: state.index.tombstone_ratio(),
            stale: state.stale,
            backend: state.policy(&self.settings, false).kind(),
        }
    }
}

/// Apply to `index` every difference between `snapshot` and `current`.
/// Returns the number of documents touched.
fn replay_changes(
    index: &mut HnswIndex,
    snapshot: &BTreeMap<String, Vec<f32>>,
    current: &VectorStore,
) -> usize {
    let mut touched = 0;
    for (id, vector) in current.iter() {
        if snapshot.get(id).map(Vec::as_slice) != Some(vector) {
            index.insert(id, vector);
            touched += 1;
        }
    }
    for id in snapshot.keys() {
        if !current.contains(id) {
            index.remove(id);
            touched += 1;
        }
    }
    touched
}

/// The graph holds exactly the documents of the store, each with the
/// vector the store has for it.
fn in_step(index: &HnswIndex, store: &VectorStore) -> bool {
    index.len() == store.len()
        && store.iter().all(|(id, vector)| {
            index
                .label_of(id)
                .is_some_and(|label| index.vector(label) == vector)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::{DistanceMetric, HnswConfig};
    use crate::search::types::FilterPath;
    use crate::storage::persistence::write_atomic;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn settings(dimension: usize) -> VectorSettings {
        VectorSettings {
            dimension,
            hnsw: HnswConfig::new(16, 100, 64, DistanceMetric::Cosine),
            exhaustive: false,
            capacity: 10_000,
            rebuild_ratio: 0.2,
        }
    }

    fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
        (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    /// Write the field's graph to `path`, returning the store it was taken with.
    fn save_graph(field: &VectorField, path: &Path) -> VectorStore {
        let (store, graph) = field.persist_parts().unwrap();
        write_atomic(path, &graph.unwrap()).unwrap();
        store
    }

    fn populated(n: usize, dim: usize) -> VectorField {
        let field = VectorField::new("embedding", settings(dim));
        let mut rng = StdRng::seed_from_u64(99);
        for i in 0..n {
            field
                .upsert_vector(&format!("doc{i:04}"), random_vector(&mut rng, dim))
                .unwrap();
        }
        field
    }

    #[test]
    fn test_upsert_get_delete() {
        let field = VectorField::new("v", settings(3));
        field.upsert_vector("a", vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(field.get_vector("a"), Some(vec![1.0, 0.0, 0.0]));
        field.upsert_vector("a", vec![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(field.get_vector("a"), Some(vec![0.0, 1.0, 0.0]));
        assert_eq!(field.len(), 1);
        assert!(field.delete_vector("a"));
        assert!(!field.delete_vector("a"));
        assert_eq!(field.get_vector("a"), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        let field = VectorField::new("v", settings(3));
        assert!(matches!(
            field.upsert_vector("a", vec![1.0, 0.0]),
            Err(SearchError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            field.upsert_vector("a", vec![1.0, f32::INFINITY, 0.0]),
            Err(SearchError::NonFiniteVector)
        ));
        field.upsert_vector("a", vec![1.0, 0.0, 0.0]).unwrap();
        let opts = VectorSearchOptions::default();
        assert!(matches!(
            field.search(&[1.0, 0.0, 0.0], 0, &opts),
            Err(SearchError::InvalidK { .. })
        ));
        assert!(field.search(&[1.0, 0.0], 1, &opts).is_err());
        // Rejected writes never reach the store
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut s = settings(2);
        s.capacity = 1;
        let field = VectorField::new("v", s);
        field.upsert_vector("a", vec![1.0, 0.0]).unwrap();
        assert!(matches!(
            field.upsert_vector("b", vec![0.0, 1.0]),
            Err(SearchError::CapacityExceeded { capacity: 1, .. })
        ));
        // Overwrite of an existing id is allowed at capacity
        field.upsert_vector("a", vec![0.0, 1.0]).unwrap();
    }

    #[test]
    fn test_small_field_uses_exact_scan() {
        let field = VectorField::new("v", settings(3));
        field.upsert_vector("a", vec![1.0, 0.0, 0.0]).unwrap();
        field.upsert_vector("b", vec![0.0, 1.0, 0.0]).unwrap();
        field.upsert_vector("c", vec![0.7, 0.7, 0.0]).unwrap();
        let opts = VectorSearchOptions::default();
        let (results, backend) = field
            .search_with_backend(&[1.0, 0.0, 0.0], 2, &opts)
            .unwrap();
        assert_eq!(backend, BackendKind::Exact);
        let ids: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(results[0].rank, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_backend_policy_switches_to_ann() {
        let field = populated(200, 8);
        let query = field.get_vector("doc0042").unwrap();
        let opts = VectorSearchOptions::default();
        let exhaustive = VectorSearchOptions {
            exhaustive: true,
            ..VectorSearchOptions::default()
        };
        let (_, backend) = field.search_with_backend(&query, 5, &exhaustive).unwrap();
        assert_eq!(backend, BackendKind::Exact);

        let (results, backend) = field.search_with_backend(&query, 5, &opts).unwrap();
        assert_eq!(backend, BackendKind::Ann);
        assert_eq!(results[0].document_id, "doc0042");
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_ann_disabled_profile() {
        let mut s = settings(4);
        s.exhaustive = true;
        let field = VectorField::new("v", s);
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..100 {
            field
                .upsert_vector(&format!("d{i}"), random_vector(&mut rng, 4))
                .unwrap();
        }
        let (_, backend) = field
            .search_with_backend(&[0.5; 4], 3, &VectorSearchOptions::default())
            .unwrap();
        assert_eq!(backend, BackendKind::Exact);
        assert!(!field.needs_rebuild());
        assert_eq!(field.stats().graph_labels, 0);
    }

    #[test]
    fn test_filtered_search_reports_path() {
        let field = populated(300, 8);
        let query = field.get_vector("doc0010").unwrap();
        let opts = VectorSearchOptions::default();

        let broad = field
            .search_filtered(&query, 5, &opts, |id| id != "doc0010")
            .unwrap();
        assert_eq!(broad.results.len(), 5);
        assert!(broad.results.iter().all(|r| r.document_id != "doc0010"));
        assert!(matches!(
            broad.diagnostics.path,
            FilterPath::Oversampled | FilterPath::Widened
        ));

        let narrow = field
            .search_filtered(&query, 3, &opts, |id| id == "doc0299" || id == "doc0150")
            .unwrap();
        assert_eq!(narrow.results.len(), 2);
        assert!(narrow.diagnostics.low_selectivity);
        assert_eq!(narrow.diagnostics.path, FilterPath::ExactFallback);
    }

    #[test]
    fn test_tombstones_trigger_rebuild() {
        let field = populated(100, 6);
        assert!(!field.needs_rebuild());
        for i in 0..30 {
            field.delete_vector(&format!("doc{i:04}"));
        }
        assert!(field.needs_rebuild());
        assert_eq!(field.rebuild(), 70);
        assert!(!field.needs_rebuild());
        let stats = field.stats();
        assert_eq!(stats.graph_labels, 70);
        assert_eq!(stats.tombstone_ratio, 0.0);
    }

    #[test]
    fn test_replay_changes_catches_up() {
        let mut store = VectorStore::new("v", 2, 100);
        store.upsert("a", vec![1.0, 0.0]).unwrap();
        store.upsert("b", vec![0.0, 1.0]).unwrap();
        let snapshot: BTreeMap<String, Vec<f32>> = store
            .iter()
            .map(|(id, v)| (id.to_string(), v.to_vec()))
            .collect();
        let mut index = HnswIndex::new(2, HnswConfig::default());
        for (id, v) in &snapshot {
            index.insert(id, v);
        }

        // Mutations during the build
        store.upsert("c", vec![1.0, 1.0]).unwrap();
        store.upsert("a", vec![0.5, 0.5]).unwrap();
        store.remove("b");

        assert_eq!(replay_changes(&mut index, &snapshot, &store), 3);
        assert!(in_step(&index, &store));
        let label = index.label_of("a").unwrap();
        assert_eq!(index.vector(label), &[0.5, 0.5]);
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.hnsw");
        let field = populated(120, 8);
        let store = save_graph(&field, &path);

        let restored = VectorField::from_store("embedding", settings(8), store);
        assert!(restored.needs_rebuild());
        assert!(restored.load_artifact(&path));
        assert!(!restored.needs_rebuild());

        let query = field.get_vector("doc0007").unwrap();
        let opts = VectorSearchOptions::default();
        assert_eq!(
            field.search(&query, 10, &opts).unwrap(),
            restored.search(&query, 10, &opts).unwrap()
        );
    }

    #[test]
    fn test_parameter_mismatch_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.hnsw");
        let field = populated(80, 8);
        let store = save_graph(&field, &path);

        let mut changed = settings(8);
        changed.hnsw = HnswConfig::new(8, 100, 64, DistanceMetric::Cosine);
        let restored = VectorField::from_store("embedding", changed, store);
        assert!(!restored.load_artifact(&path));
        assert!(!restored.needs_rebuild());
        assert_eq!(restored.stats().graph_labels, 80);
    }

    #[test]
    fn test_corrupt_or_missing_artifact_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.hnsw");
        let field = populated(80, 8);
        let store = save_graph(&field, &path);
        let mut raw = std::fs::read(&path).unwrap();
        raw[10] ^= 0xFF;
        std::fs::write(&path, raw).unwrap();

        let restored = VectorField::from_store("embedding", settings(8), store.clone());
        assert!(!restored.load_artifact(&path));
        assert_eq!(restored.stats().graph_labels, 80);

        let missing = VectorField::from_store("embedding", settings(8), store);
        assert!(!missing.load_artifact(&dir.path().join("absent.hnsw")));
        assert!(!missing.needs_rebuild());
    }

    #[test]
    fn test_query_knobs_are_bounded() {
        let field = populated(200, 8);
        let query = field.get_vector("doc0001").unwrap();
        let huge_ef = VectorSearchOptions {
            ef: Some(1 << 62),
            ..VectorSearchOptions::default()
        };
        assert!(matches!(
            field.search(&query, 10, &huge_ef),
            Err(SearchError::InvalidRequest(_))
        ));
        assert!(matches!(
            field.search_filtered(&query, 10, &huge_ef, |_| true),
            Err(SearchError::InvalidRequest(_))
        ));
        let zero_ef = VectorSearchOptions {
            ef: Some(0),
            ..VectorSearchOptions::default()
        };
        assert!(field.search(&query, 10, &zero_ef).is_err());

        let huge_oversample = VectorSearchOptions {
            oversample: 1 << 62,
            ..VectorSearchOptions::default()
        };
        assert!(matches!(
            field.search_filtered(&query, 10, &huge_oversample, |_| true),
            Err(SearchError::InvalidRequest(_))
        ));

        // The largest accepted values still answer
        let widest = VectorSearchOptions {
            ef: Some(config::MAX_EF_SEARCH),
            oversample: config::MAX_OVERSAMPLE_MULTIPLIER,
            ..VectorSearchOptions::default()
        };
        let outcome = field
            .search_filtered(&query, config::MAX_K, &widest, |id| id.ends_with('7'))
            .unwrap();
        assert_eq!(outcome.results.len(), 20);
        assert_eq!(field.search(&query, 1, &widest).unwrap()[0].document_id, "doc0001");
    }

    #[test]
    fn test_persist_parts_are_in_step() {
        let field = populated(150, 8);
        for i in 0..10 {
            field.delete_vector(&format!("doc{i:04}"));
        }
        let (store, graph) = field.persist_parts().unwrap();
        let index = hnsw::decode_artifact(&graph.unwrap(), &settings(8).hnsw, 8).unwrap();
        assert_eq!(store.len(), 140);
        assert!(in_step(&index, &store));
    }

    #[test]
    fn test_artifact_with_moved_vector_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.hnsw");
        let field = populated(120, 8);
        let (old_store, _) = field.persist_parts().unwrap();

        // Same ids, but one vector changed after the store was copied
        let moved = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        field.upsert_vector("doc0005", moved).unwrap();
        save_graph(&field, &path);

        let restored = VectorField::from_store("embedding", settings(8), old_store);
        assert!(!restored.load_artifact(&path));
        assert!(!restored.needs_rebuild());

        let query = restored.get_vector("doc0005").unwrap();
        let exact = VectorSearchOptions {
            exhaustive: true,
            ..VectorSearchOptions::default()
        };
        let (ann, backend) = restored
            .search_with_backend(&query, 1, &VectorSearchOptions::default())
            .unwrap();
        assert_eq!(backend, BackendKind::Ann);
        assert_eq!(ann[0].document_id, "doc0005");
        assert_eq!(
            restored.search(&query, 1, &exact).unwrap()[0].document_id,
            "doc0005"
        );
    }

    #[test]
    fn test_concurrent_reads_during_writes_and_rebuilds() {
        use std::collections::HashSet;
        use std::sync::atomic::{AtomicBool, Ordering};

        let field = populated(400, 8);
        // Deleted once and never written again
        let gone: HashSet<String> = (0..50).map(|i| format!("doc{i:04}")).collect();
        let deleted = AtomicBool::new(false);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut rng = StdRng::seed_from_u64(7);
                for id in &gone {
                    field.delete_vector(id);
                }
                deleted.store(true, Ordering::SeqCst);
                for round in 0..5 {
                    for i in 300..340 {
                        field
                            .upsert_vector(&format!("doc{i:04}"), random_vector(&mut rng, 8))
                            .unwrap();
                    }
                    for i in 0..20 {
                        field
                            .upsert_vector(&format!("new{round}-{i}"), random_vector(&mut rng, 8))
                            .unwrap();
                    }
                    field.rebuild();
                }
                done.store(true, Ordering::SeqCst);
            });

            for seed in 0..3u64 {
                let (field, gone, deleted, done) = (&field, &gone, &deleted, &done);
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(100 + seed);
                    let opts = VectorSearchOptions::default();
                    loop {
                        let finished = done.load(Ordering::SeqCst);
                        let cleared = deleted.load(Ordering::SeqCst);
                        let query = random_vector(&mut rng, 8);
                        let plain = field.search(&query, 10, &opts).unwrap();
                        let filtered = field
                            .search_filtered(&query, 10, &opts, |id| id.ends_with('1'))
                            .unwrap()
                            .results;
                        assert!(filtered.iter().all(|r| r.document_id.ends_with('1')));
                        for results in [&plain, &filtered] {
                            assert!(results.len() <= 10);
                            assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
                            let unique: HashSet<&str> =
                                results.iter().map(|r| r.document_id.as_str()).collect();
                            assert_eq!(unique.len(), results.len());
                            if cleared {
                                assert!(results.iter().all(|r| !gone.contains(&r.document_id)));
                            }
                        }
                        if finished {
                            break;
                        }
                    }
                });
            }
        });

        assert_eq!(field.len(), 400 - 50 + 5 * 20);
        assert!(!field.needs_rebuild());
    }
}

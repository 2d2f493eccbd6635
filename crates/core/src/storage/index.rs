//! Search indexes and the catalog that names them.
//!
//! A [`SearchIndex`] holds its documents in a table guarded by one `RwLock`
//! (documents, key → slot map, one BM25 inverted index per searchable field)
//! and one [`VectorField`] per vector field, each with its own lock. Locks are
//! always taken document table first, then vector field.

use crate::bm25::{accumulate_bm25, rank_scores, InvertedIndex};
use crate::config;
use crate::document::{Document, FieldValue};
use crate::error::{check_k, Result, SearchError};
use crate::schema::IndexSchema;
use crate::search::filter::FilterExpr;
use crate::search::hybrid::{hybrid_search, FusionMethod, FusionParams, VectorRanking};
use crate::search::odata::parse_filter;
use crate::search::types::{
    BackendKind, FilterDiagnostics, ScoreBreakdown, TextScore, VectorScore, VectorSearchOptions,
};
use crate::storage::persistence::{remove_index, save_index};
use crate::vector::field::{FieldStats, VectorField};
use crate::vector::store::VectorStore;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Default)]
struct DocTable {
    /// Slots are never reused; a deleted document leaves `None`.
    slots: Vec<Option<Document>>,
    keys: HashMap<String, u32>,
    /// searchable field → inverted index over slots
    text: BTreeMap<String, InvertedIndex>,
}

impl DocTable {
    fn get(&self, key: &str) -> Option<&Document> {
        let slot = *self.keys.get(key)?;
        self.slots[slot as usize].as_ref()
    }

    fn key_of(&self, slot: u32) -> Option<&str> {
        self.slots
            .get(slot as usize)?
            .as_ref()
            .map(|d| d.key.as_str())
    }

    /// Store `doc`, reindexing its text. Returns `true` if the key is new.
    fn put(&mut self, doc: Document) -> bool {
        let slot = match self.keys.get(&doc.key) {
            Some(&slot) => slot,
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(None);
                self.keys.insert(doc.key.clone(), slot);
                slot
            }
        };
        for (field, index) in self.text.iter_mut() {
            match doc.get(field).and_then(FieldValue::searchable_text) {
                Some(text) => index.add_document(slot, &text),
                None => index.remove_document(slot),
            }
        }
        self.slots[slot as usize].replace(doc).is_none()
    }

    fn remove(&mut self, key: &str) -> Option<Document> {
        let slot = self.keys.remove(key)?;
        for index in self.text.values_mut() {
            index.remove_document(slot);
        }
        self.slots[slot as usize].take()
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// `@search.action` of one document in an indexing batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Upload,
    Merge,
    MergeOrUpload,
    Delete,
}

impl FromStr for IndexAction {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(IndexAction::Upload),
            "merge" => Ok(IndexAction::Merge),
            "mergeorupload" => Ok(IndexAction::MergeOrUpload),
            "delete" => Ok(IndexAction::Delete),
            _ => Err(SearchError::InvalidDocument(format!("unknown action '{s}'"))),
        }
    }
}

/// Outcome of one document in an indexing batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    pub status: bool,
    pub error_message: Option<String>,
    pub status_code: u16,
}

impl IndexingResult {
    fn failed(key: String, error: &SearchError) -> Self {
        let status_code = match error {
            SearchError::CapacityExceeded { .. } => 507,
            SearchError::DocumentNotFound(_) => 404,
            e if e.is_client_error() => 400,
            _ => 500,
        };
        Self {
            key,
            status: false,
            error_message: Some(error.to_string()),
            status_code,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FusionOptions {
    pub method: Option<String>,
    pub rrf_constant: Option<f32>,
    pub vector_weight: Option<f32>,
    pub text_weight: Option<f32>,
}

impl FusionOptions {
    pub fn resolve(&self) -> Result<FusionParams> {
        let defaults = FusionParams::default();
        let params = FusionParams {
            method: match &self.method {
                Some(name) => name.parse()?,
                None => defaults.method,
            },
            rrf_constant: self.rrf_constant.unwrap_or(defaults.rrf_constant),
            vector_weight: self.vector_weight.unwrap_or(defaults.vector_weight),
            text_weight: self.text_weight.unwrap_or(defaults.text_weight),
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQuery {
    /// Only `vector` is supported.
    #[serde(default)]
    pub kind: Option<String>,
    pub vector: Vec<f32>,
    /// Comma-separated vector field names.
    pub fields: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub exhaustive: bool,
    #[serde(default)]
    pub ef: Option<usize>,
    #[serde(default)]
    pub oversampling: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub search: Option<String>,
    pub search_fields: Option<String>,
    pub filter: Option<String>,
    pub vector_queries: Vec<VectorQuery>,
    pub top: Option<usize>,
    pub skip: Option<usize>,
    pub select: Option<String>,
    pub count: bool,
    pub fusion: Option<FusionOptions>,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQueryDebug {
    pub field: String,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterDiagnostics>,
    pub results: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDebug {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_matches: Option<usize>,
    pub vector_queries: Vec<VectorQueryDebug>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "@odata.count", skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(rename = "@search.debug", skip_serializing_if = "Option::is_none")]
    pub debug: Option<SearchDebug>,
    pub value: Vec<Map<String, Value>>,
    /// Vector queries that fell back to an exact scan because the filter was too selective.
    #[serde(skip)]
    pub exact_fallbacks: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub name: String,
    pub document_count: usize,
    pub vector_fields: Vec<FieldStats>,
}

/// Everything a snapshot writes for one index.
pub struct SnapshotParts {
    pub documents: Vec<Document>,
    pub stores: Vec<VectorStore>,
    /// Encoded graph per vector field name.
    pub graphs: BTreeMap<String, Vec<u8>>,
}

struct Hit {
    key: String,
    score: f32,
    breakdown: Option<ScoreBreakdown>,
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub struct SearchIndex {
    schema: IndexSchema,
    docs: RwLock<DocTable>,
    vectors: BTreeMap<String, VectorField>,
}

impl SearchIndex {
    /// Create an empty index. The schema is validated first.
    pub fn new(schema: IndexSchema) -> Result<Self> {
        Self::restore(schema, Vec::new(), Vec::new())
    }

    /// Rebuild an index from persisted parts. Vector fields start with stale
    /// graphs; load their artifacts or rebuild them before serving ANN queries.
    pub fn restore(
        schema: IndexSchema,
        documents: Vec<Document>,
        stores: Vec<VectorStore>,
    ) -> Result<Self> {
        schema.validate()?;
        let mut stores: HashMap<String, VectorStore> = stores
            .into_iter()
            .map(|s| (s.field().to_string(), s))
            .collect();

        let mut vectors = BTreeMap::new();
        for def in schema.vector_fields() {
            let settings = schema.vector_settings(&def.name)?;
            let field = match stores.remove(&def.name) {
                Some(store) if store.dimension() == settings.dimension => {
                    VectorField::from_store(def.name.clone(), settings, store)
                }
                Some(store) => {
                    return Err(SearchError::CorruptArtifact(format!(
                        "stored vectors for '{}' have dimension {}, schema declares {}",
                        def.name,
                        store.dimension(),
                        settings.dimension
                    )))
                }
                None => VectorField::new(def.name.clone(), settings),
            };
            vectors.insert(def.name.clone(), field);
        }

        let mut table = DocTable::default();
        for def in schema.searchable_fields() {
            table.text.insert(def.name.clone(), InvertedIndex::new());
        }
        for doc in documents {
            table.put(doc);
        }

        Ok(Self {
            schema,
            docs: RwLock::new(table),
            vectors,
        })
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &VectorField> + '_ {
        self.vectors.values()
    }

    pub fn vector_field(&self, name: &str) -> Result<&VectorField> {
        self.vectors
            .get(name)
            .ok_or_else(|| SearchError::FieldNotFound(name.to_string()))
    }

    /// Documents, vector stores and encoded graphs, taken under the document
    /// table's read lock so they describe the same moment. Graphs are keyed
    /// by field name; a field without a usable graph has no entry.
    pub fn snapshot_parts(&self) -> Result<SnapshotParts> {
        let docs = self.docs.read();
        let mut parts = SnapshotParts {
            documents: docs.slots.iter().flatten().cloned().collect(),
            stores: Vec::with_capacity(self.vectors.len()),
            graphs: BTreeMap::new(),
        };
        for field in self.vectors.values() {
            let (store, graph) = field.persist_parts()?;
            parts.stores.push(store);
            if let Some(graph) = graph {
                parts.graphs.insert(field.name().to_string(), graph);
            }
        }
        Ok(parts)
    }

    /// Apply an indexing batch. Every document gets its own result; one
    /// failure does not stop the rest of the batch.
    pub fn index_documents(&self, batch: &[Map<String, Value>]) -> Vec<IndexingResult> {
        let results: Vec<IndexingResult> = {
            let mut docs = self.docs.write();
            batch
                .iter()
                .map(|body| {
                    let key = body
                        .get(self.schema.key_field())
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    match self.apply(&mut docs, body) {
                        Ok(status_code) => IndexingResult {
                            key,
                            status: true,
                            error_message: None,
                            status_code,
                        },
                        Err(e) => IndexingResult::failed(key, &e),
                    }
                })
                .collect()
        };

        let failed = results.iter().filter(|r| !r.status).count();
        tracing::debug!(index = %self.name(), documents = batch.len(), failed, "indexed batch");

        for field in self.vectors.values() {
            if field.needs_rebuild() {
                field.rebuild();
            }
        }
        results
    }

    fn apply(&self, docs: &mut DocTable, body: &Map<String, Value>) -> Result<u16> {
        let action = match body.get("@search.action") {
            None => IndexAction::Upload,
            Some(Value::String(name)) => name.parse()?,
            Some(_) => {
                return Err(SearchError::InvalidDocument(
                    "@search.action must be a string".to_string(),
                ))
            }
        };

        if action == IndexAction::Delete {
            let key = body
                .get(self.schema.key_field())
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::InvalidDocument("missing document key".to_string()))?;
            docs.remove(key);
            for field in self.vectors.values() {
                field.delete_vector(key);
            }
            return Ok(200);
        }

        let input = Document::from_json(&self.schema, body)?;
        let existing = docs.get(&input.key);
        let merge = match action {
            IndexAction::Merge if existing.is_none() => {
                return Err(SearchError::DocumentNotFound(input.key))
            }
            IndexAction::Merge | IndexAction::MergeOrUpload => existing.is_some(),
            _ => false,
        };

        // Validate every vector before touching anything
        for (name, vector) in &input.vectors {
            if let Some(vector) = vector {
                self.vector_field(name)?.check_upsert(&input.key, vector)?;
            }
        }

        let mut doc = match existing {
            Some(existing) if merge => existing.clone(),
            _ => Document::new(input.key.clone()),
        };
        for (name, value) in input.fields {
            match value {
                Some(value) => {
                    doc.fields.insert(name, value);
                }
                None => {
                    doc.fields.remove(&name);
                }
            }
        }

        let mut vectors = input.vectors;
        for (name, field) in &self.vectors {
            match vectors.remove(name) {
                Some(Some(vector)) => field.upsert_vector(&doc.key, vector)?,
                Some(None) => {
                    field.delete_vector(&doc.key);
                }
                None if !merge => {
                    field.delete_vector(&doc.key);
                }
                None => {}
            }
        }

        Ok(if docs.put(doc) { 201 } else { 200 })
    }

    /// Look up one document, vectors re-attached.
    pub fn get_document(&self, key: &str, select: Option<&str>) -> Result<Option<Map<String, Value>>> {
        let select = self.resolve_select(select)?;
        let docs = self.docs.read();
        Ok(docs.get(key).map(|doc| self.render(doc, &select)))
    }

    /// Field names a response should carry.
    fn resolve_select(&self, select: Option<&str>) -> Result<Vec<&str>> {
        match select.map(str::trim) {
            None | Some("") | Some("*") => Ok(self
                .schema
                .fields
                .iter()
                .filter(|f| f.retrievable || f.key)
                .map(|f| f.name.as_str())
                .collect()),
            Some(list) => {
                let mut names = Vec::new();
                for name in split_list(list) {
                    let def = self
                        .schema
                        .field(name)
                        .ok_or_else(|| SearchError::FieldNotFound(name.to_string()))?;
                    if def.retrievable || def.key {
                        names.push(def.name.as_str());
                    }
                }
                Ok(names)
            }
        }
    }

    fn resolve_search_fields(&self, fields: Option<&str>) -> Result<Vec<&str>> {
        match fields {
            None => Ok(self.schema.searchable_fields().map(|f| f.name.as_str()).collect()),
            Some(list) => split_list(list)
                .map(|name| {
                    self.schema
                        .field(name)
                        .filter(|f| f.is_searchable())
                        .map(|f| f.name.as_str())
                        .ok_or_else(|| SearchError::FieldNotFound(name.to_string()))
                })
                .collect(),
        }
    }

    fn render(&self, doc: &Document, select: &[&str]) -> Map<String, Value> {
        let mut out = Map::new();
        for &name in select {
            if name == self.schema.key_field() {
                out.insert(name.to_string(), Value::String(doc.key.clone()));
                continue;
            }
            let value = match self.vectors.get(name) {
                Some(field) => field
                    .get_vector(&doc.key)
                    .map_or(Value::Null, Value::from),
                None => doc.get(name).map_or(Value::Null, FieldValue::to_json),
            };
            out.insert(name.to_string(), value);
        }
        out
    }

    /// Run a search request: text and vector parts, filter, fusion and paging.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let top = request.top.unwrap_or(config::DEFAULT_TOP);
        check_k(top, config::MAX_K)?;
        let skip = request.skip.unwrap_or(0);
        if skip > config::MAX_SKIP {
            return Err(SearchError::InvalidRequest(format!(
                "skip must be at most {}",
                config::MAX_SKIP
            )));
        }
        let window = top + skip;
        let filter: Option<FilterExpr> = request.filter.as_deref().map(parse_filter).transpose()?;
        let select = self.resolve_select(request.select.as_deref())?;
        let text_fields = self.resolve_search_fields(request.search_fields.as_deref())?;
        let fusion = request.fusion.clone().unwrap_or_default().resolve()?;
        let text_query = request
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty() && *q != "*");

        let docs = self.docs.read();
        let passes = |key: &str| match &filter {
            None => true,
            Some(filter) => docs.get(key).is_some_and(|d| filter.matches(d)),
        };

        let text: Option<Vec<(String, f32)>> = text_query.map(|query| {
            let mut scores = HashMap::new();
            for field in &text_fields {
                if let Some(index) = docs.text.get(*field) {
                    accumulate_bm25(index, query, &mut scores);
                }
            }
            rank_scores(scores)
                .into_iter()
                .filter_map(|(slot, score)| docs.key_of(slot).map(|k| (k, score)))
                .filter(|&(key, _)| passes(key))
                .map(|(key, score)| (key.to_string(), score))
                .collect()
        });

        let mut rankings = Vec::new();
        let mut vector_debug = Vec::new();
        for query in &request.vector_queries {
            if let Some(kind) = query.kind.as_deref().filter(|k| *k != "vector") {
                return Err(SearchError::InvalidRequest(format!(
                    "unsupported vector query kind '{kind}'"
                )));
            }
            let k = query.k.unwrap_or(window.min(config::MAX_K));
            let options = VectorSearchOptions {
                ef: query.ef,
                exhaustive: query.exhaustive,
                oversample: query
                    .oversampling
                    .unwrap_or(config::DEFAULT_OVERSAMPLE_MULTIPLIER),
            };
            let mut fields = split_list(&query.fields).peekable();
            if fields.peek().is_none() {
                return Err(SearchError::InvalidRequest(
                    "vector query names no fields".to_string(),
                ));
            }
            for name in fields {
                let field = self.vector_field(name)?;
                let (results, backend, diagnostics) = if filter.is_some() {
                    let outcome = field.search_filtered(&query.vector, k, &options, &passes)?;
                    (outcome.results, outcome.backend, Some(outcome.diagnostics))
                } else {
                    let (results, backend) = field.search_with_backend(&query.vector, k, &options)?;
                    (results, backend, None)
                };
                vector_debug.push(VectorQueryDebug {
                    field: name.to_string(),
                    backend,
                    filter: diagnostics,
                    results: results.len(),
                });
                rankings.push(VectorRanking {
                    field: name.to_string(),
                    results,
                });
            }
        }

        let exact_fallbacks = vector_debug
            .iter()
            .filter(|d| d.filter.as_ref().is_some_and(|f| f.low_selectivity))
            .count();
        let sources = usize::from(text.is_some()) + rankings.len();
        let hits: Vec<Hit> = match (&text, rankings.as_slice()) {
            (None, []) => {
                let mut keys: Vec<&str> = docs.keys.keys().map(String::as_str).collect();
                keys.sort_unstable();
                keys.into_iter()
                    .filter(|key| passes(*key))
                    .map(|key| Hit {
                        key: key.to_string(),
                        score: 1.0,
                        breakdown: None,
                    })
                    .collect()
            }
            (Some(text), []) => text
                .iter()
                .enumerate()
                .map(|(i, (key, score))| Hit {
                    key: key.clone(),
                    score: *score,
                    breakdown: Some(ScoreBreakdown {
                        text: Some(TextScore {
                            rank: i + 1,
                            score: *score,
                        }),
                        vectors: BTreeMap::new(),
                    }),
                })
                .collect(),
            (None, [ranking]) => ranking
                .results
                .iter()
                .map(|r| Hit {
                    key: r.document_id.clone(),
                    score: r.similarity,
                    breakdown: Some(ScoreBreakdown {
                        text: None,
                        vectors: BTreeMap::from([(
                            ranking.field.clone(),
                            VectorScore {
                                rank: r.rank,
                                distance: r.distance,
                                similarity: r.similarity,
                            },
                        )]),
                    }),
                })
                .collect(),
            (text, rankings) => {
                hybrid_search(text.as_deref().unwrap_or_default(), rankings, &fusion, config::MAX_K)?
                    .into_iter()
                    .map(|f| Hit {
                        key: f.document_id,
                        score: f.score,
                        breakdown: Some(f.breakdown),
                    })
                    .collect()
            }
        };

        let total = hits.len();
        let value = hits
            .into_iter()
            .skip(skip)
            .take(top)
            .filter_map(|hit| {
                let doc = docs.get(&hit.key)?;
                let mut out = self.render(doc, &select);
                out.insert("@search.score".to_string(), Value::from(hit.score));
                if request.debug {
                    if let Some(breakdown) = hit.breakdown {
                        out.insert(
                            "@search.breakdown".to_string(),
                            serde_json::to_value(breakdown).unwrap_or(Value::Null),
                        );
                    }
                }
                Some(out)
            })
            .collect();

        tracing::debug!(
            index = %self.name(),
            sources,
            total,
            filtered = filter.is_some(),
            "search completed"
        );

        Ok(SearchResponse {
            count: request.count.then_some(total),
            debug: request.debug.then(|| SearchDebug {
                fusion: (sources > 1).then_some(fusion.method),
                text_matches: text.as_ref().map(Vec::len),
                vector_queries: vector_debug,
            }),
            value,
            exact_fallbacks,
        })
    }

    /// Rebuild graphs that need it, or all of them when `force` is set.
    /// Returns `(field, vectors indexed)` for each rebuilt field.
    pub fn rebuild(&self, force: bool) -> Vec<(String, usize)> {
        self.vectors
            .values()
            .filter(|f| !f.settings().exhaustive && (force || f.needs_rebuild()))
            .map(|f| (f.name().to_string(), f.rebuild()))
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.schema.name.clone(),
            document_count: self.document_count(),
            vector_fields: self.vectors.values().map(VectorField::stats).collect(),
        }
    }
}

/// Named indexes. Cloning yields another handle to the same catalog.
#[derive(Clone, Default)]
pub struct Catalog {
    indexes: Arc<RwLock<BTreeMap<String, Arc<SearchIndex>>>>,
    /// Serializes writes to and removals from the data directory.
    persist: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index from `schema`.
    pub fn create(&self, schema: IndexSchema) -> Result<Arc<SearchIndex>> {
        if self.indexes.read().contains_key(&schema.name) {
            return Err(SearchError::IndexExists(schema.name));
        }
        let index = SearchIndex::new(schema)?;
        self.insert(index)
    }

    /// Register an already built index.
    pub fn insert(&self, index: SearchIndex) -> Result<Arc<SearchIndex>> {
        let mut indexes = self.indexes.write();
        let name = index.name().to_string();
        if indexes.contains_key(&name) {
            return Err(SearchError::IndexExists(name));
        }
        let index = Arc::new(index);
        indexes.insert(name.clone(), Arc::clone(&index));
        tracing::info!(index = %name, "index registered");
        Ok(index)
    }

    pub fn get(&self, name: &str) -> Result<Arc<SearchIndex>> {
        self.indexes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SearchError::IndexNotFound(name.to_string()))
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        if self.indexes.write().remove(name).is_none() {
            return Err(SearchError::IndexNotFound(name.to_string()));
        }
        tracing::info!(index = %name, "index deleted");
        Ok(())
    }

    /// All indexes in name order.
    pub fn list(&self) -> Vec<Arc<SearchIndex>> {
        self.indexes.read().values().cloned().collect()
    }

    /// Save `index` under `data_dir` if it is still the index registered
    /// under its name. Returns `false`, writing nothing, once it was deleted.
    pub fn save_registered(&self, index: &Arc<SearchIndex>, data_dir: &Path) -> Result<bool> {
        let _persist = self.persist.lock();
        let registered = self
            .indexes
            .read()
            .get(index.name())
            .is_some_and(|current| Arc::ptr_eq(current, index));
        if !registered {
            tracing::debug!(index = %index.name(), "index no longer registered; skipping save");
            return Ok(false);
        }
        save_index(index, data_dir)?;
        Ok(true)
    }

    /// Unregister `name` and remove its files from `data_dir`.
    pub fn delete_persisted(&self, name: &str, data_dir: &Path) -> Result<()> {
        let _persist = self.persist.lock();
        self.delete(name)?;
        remove_index(data_dir, name)
    }
}

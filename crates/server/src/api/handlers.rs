//! HTTP request handlers and shared application state.

use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use searchsim_core::config;
use searchsim_core::schema::IndexSchema;
use searchsim_core::storage::{Catalog, IndexStats, SearchIndex, SearchRequest, SearchResponse};
use searchsim_core::SearchError;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub data_dir: PathBuf,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

/// Run CPU-bound index work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("Blocking task failed: {}", e);
        ApiError::Internal("internal server error".into())
    })?
}

fn search_mode(req: &SearchRequest) -> &'static str {
    let has_text = req
        .search
        .as_deref()
        .map(str::trim)
        .is_some_and(|q| !q.is_empty() && q != "*");
    match (has_text, req.vector_queries.is_empty()) {
        (true, true) => "text",
        (false, false) => "vector",
        (true, false) => "hybrid",
        (false, true) => "all",
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let indexes = state.catalog.list();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        indexes: indexes.len(),
        documents: indexes.iter().map(|i| i.document_count()).sum(),
    })
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

/// `POST /indexes`
pub async fn create_index(
    State(state): State<AppState>,
    Json(schema): Json<IndexSchema>,
) -> Result<(StatusCode, Json<IndexSchema>), ApiError> {
    let index = state.catalog.create(schema)?;
    tracing::info!(
        index = %index.name(),
        vector_fields = index.vector_fields().count(),
        "Index created"
    );
    Ok((StatusCode::CREATED, Json(index.schema().clone())))
}

/// `GET /indexes`
pub async fn list_indexes(State(state): State<AppState>) -> Json<IndexList> {
    let value = state
        .catalog
        .list()
        .iter()
        .map(|i| i.schema().clone())
        .collect();
    Json(IndexList { value })
}

/// `GET /indexes/:name`
pub async fn get_index(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IndexSchema>, ApiError> {
    let index = state.catalog.get(&name)?;
    Ok(Json(index.schema().clone()))
}

/// `DELETE /indexes/:name`
///
/// Drops the index from memory and removes its snapshot directory.
pub async fn delete_index(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let catalog = state.catalog.clone();
    let data_dir = state.data_dir.clone();
    let deleted = name.clone();
    // Waits for any save of this index in progress
    blocking(move || Ok(catalog.delete_persisted(&deleted, &data_dir)?)).await?;
    tracing::info!(index = %name, "Index deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /indexes/:name/stats`
pub async fn index_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IndexStats>, ApiError> {
    let index = state.catalog.get(&name)?;
    Ok(Json(index.stats()))
}

/// `POST /indexes/:name/docs/index`
///
/// Responds 200 when every action succeeded and 207 otherwise.
pub async fn index_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<IndexBatchRequest>,
) -> Result<(StatusCode, Json<IndexBatchResponse>), ApiError> {
    if req.value.is_empty() || req.value.len() > config::MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "Batch must contain 1-{} actions",
            config::MAX_BATCH_SIZE
        )));
    }
    let index = state.catalog.get(&name)?;
    let batch_len = req.value.len();
    let results = blocking(move || Ok(index.index_documents(&req.value))).await?;

    let failed = results.iter().filter(|r| !r.status).count();
    metrics::record_indexing(&name, batch_len - failed, failed);
    tracing::info!(index = %name, actions = batch_len, failed, "Indexing batch applied");

    let status = if failed == 0 {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(IndexBatchResponse { value: results })))
}

/// `GET /indexes/:name/docs/:key`
pub async fn get_document(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let index = state.catalog.get(&name)?;
    index
        .get_document(&key, params.select.as_deref())?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document '{}' not found", key)))
}

/// `GET /indexes/:name/docs/$count`
pub async fn document_count(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<usize>, ApiError> {
    let index = state.catalog.get(&name)?;
    Ok(Json(index.document_count()))
}

/// `POST /indexes/:name/docs/search`
pub async fn search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let index = state.catalog.get(&name)?;
    let mode = search_mode(&req);
    let started = Instant::now();
    let response = blocking(move || index.search(&req).map_err(ApiError::from)).await?;

    metrics::record_search(&name, mode, response.exact_fallbacks);
    tracing::info!(
        index = %name,
        mode,
        results = response.value.len(),
        exact_fallbacks = response.exact_fallbacks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Search completed"
    );
    Ok(Json(response))
}

/// `POST /indexes/:name/rebuild`
pub async fn rebuild(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let index = state.catalog.get(&name)?;
    let force = params.force;
    let rebuilt = blocking(move || Ok(index.rebuild(force))).await?;
    tracing::info!(index = %name, fields = rebuilt.len(), force, "Rebuild finished");
    Ok(Json(RebuildResponse {
        index: name,
        rebuilt: rebuilt
            .into_iter()
            .map(|(field, vectors)| RebuiltField { field, vectors })
            .collect(),
    }))
}

/// `POST /indexes/:name/save`
pub async fn save(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let index: Arc<SearchIndex> = state.catalog.get(&name)?;
    let catalog = state.catalog.clone();
    let data_dir = state.data_dir.clone();
    let saved = blocking(move || {
        catalog.save_registered(&index, &data_dir).map_err(|e| {
            tracing::error!("Failed to save index: {}", e);
            ApiError::Internal("Save operation failed".into())
        })
    })
    .await?;
    if !saved {
        return Err(SearchError::IndexNotFound(name).into());
    }
    Ok(Json(MessageResponse {
        message: format!("Index '{}' saved", name),
    }))
}

//! REST API layer built on Axum.
//!
//! Provides HTTP handlers for index management, document indexing and lookup,
//! search, and maintenance operations. Includes middleware for request timeouts,
//! body size limits, concurrency limits, metrics collection, and request ID tracing.

/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Prometheus metrics recording and background collection.
pub mod metrics;
/// Request and response data transfer objects.
pub mod models;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{middleware, Router};
use handlers::AppState;
use searchsim_core::config;
use std::time::{Duration, Instant};
use tower::buffer::BufferLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

const REQUEST_ID: &str = "x-request-id";

/// Tags the request with an id (the caller's, if it sent a usable one) and
/// echoes it back on the response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID), value);
    }
    response
}

async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    // Route template, so per-index paths share one series.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/indexes",
            get(handlers::list_indexes).post(handlers::create_index),
        )
        .route(
            "/indexes/:name",
            get(handlers::get_index).delete(handlers::delete_index),
        )
        .route("/indexes/:name/stats", get(handlers::index_stats))
        .route("/indexes/:name/rebuild", post(handlers::rebuild))
        .route("/indexes/:name/save", post(handlers::save))
        .route(
            "/indexes/:name/docs/index",
            post(handlers::index_documents),
        )
        .route("/indexes/:name/docs/search", post(handlers::search))
        // `$count` is a static segment and wins over `:key`.
        .route("/indexes/:name/docs/$count", get(handlers::document_count))
        .route("/indexes/:name/docs/:key", get(handlers::get_document))
}

/// Builds the Axum router with all routes and middleware layers.
///
/// The middleware stack (outermost to innermost):
/// Concurrency limit → Timeout → Body limit → CORS → Trace → Compression →
/// Request ID → Metrics.
pub fn create_router(state: AppState) -> Router {
    let load_shedding = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }))
        .layer(BufferLayer::new(1024))
        .layer(ConcurrencyLimitLayer::new(config::MAX_CONCURRENT_REQUESTS))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config::REQUEST_TIMEOUT_SECS,
        )));

    routes()
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config::MAX_REQUEST_BODY_BYTES))
        .layer(load_shedding)
        .with_state(state)
}

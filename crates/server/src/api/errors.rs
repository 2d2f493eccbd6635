//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": {"code": "...", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use searchsim_core::SearchError;
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// - `BadRequest` → 400
/// - `NotFound` → 404
/// - `Conflict` → 409
/// - `InsufficientStorage` → 507
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters, schema or filter (400).
    BadRequest(String),
    /// Index or document not found (404).
    NotFound(String),
    /// Index already exists (409).
    Conflict(String),
    /// A vector field is at capacity (507).
    InsufficientStorage(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            ApiError::InsufficientStorage(msg) => {
                (StatusCode::INSUFFICIENT_STORAGE, "InsufficientStorage", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = axum::Json(json!({ "error": { "code": code, "message": message } }));
        (status, body).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::IndexNotFound(_) | SearchError::DocumentNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            SearchError::IndexExists(_) => ApiError::Conflict(err.to_string()),
            SearchError::CapacityExceeded { .. } => ApiError::InsufficientStorage(err.to_string()),
            e if e.is_client_error() => ApiError::BadRequest(err.to_string()),
            _ => {
                tracing::error!(error = %err, "internal error");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

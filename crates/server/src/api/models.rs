//! Request and response data transfer objects for the REST API.
//!
//! Search and indexing payloads are defined in `searchsim_core::storage`;
//! these are the server-only envelopes around them.

use searchsim_core::schema::IndexSchema;
use searchsim_core::storage::IndexingResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub indexes: usize,
    pub documents: usize,
}

/// Response body for `GET /indexes`.
#[derive(Debug, Serialize)]
pub struct IndexList {
    pub value: Vec<IndexSchema>,
}

/// Request body for `POST /indexes/:name/docs/index`.
#[derive(Debug, Deserialize)]
pub struct IndexBatchRequest {
    pub value: Vec<Map<String, Value>>,
}

/// Response body for `POST /indexes/:name/docs/index`.
#[derive(Debug, Serialize)]
pub struct IndexBatchResponse {
    pub value: Vec<IndexingResult>,
}

/// Query string of `GET /indexes/:name/docs/:key`.
#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    #[serde(rename = "$select")]
    pub select: Option<String>,
}

/// Query string of `POST /indexes/:name/rebuild`.
#[derive(Debug, Default, Deserialize)]
pub struct RebuildParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct RebuiltField {
    pub field: String,
    pub vectors: usize,
}

/// Response body for `POST /indexes/:name/rebuild`.
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub index: String,
    pub rebuilt: Vec<RebuiltField>,
}

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

//! Global configuration constants for searchsim.
//!
//! Tuning parameters, input validation limits, and server defaults live here.
//! Per-field vector settings (M, ef, metric, capacity) come from the index
//! schema; these constants are the defaults used when a profile omits them.

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Standard value is 1.2.
pub const BM25_K1: f32 = 1.2;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization. Standard value is 0.75.
pub const BM25_B: f32 = 0.75;

/// Default number of bidirectional links per HNSW node (layer 0 uses twice this).
///
/// Higher values improve recall but increase memory and build time.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 100;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Accepted range for `m` in a vector search profile.
pub const HNSW_M_RANGE: std::ops::RangeInclusive<usize> = 4..=64;

/// Accepted range for `efConstruction` and `efSearch` in a vector search profile.
pub const HNSW_EF_RANGE: std::ops::RangeInclusive<usize> = 10..=1000;

/// Below this many live vectors a field is searched by linear scan.
pub const EXACT_SEARCH_THRESHOLD: usize = 64;

/// Tombstone ratio above which a field's graph is rebuilt from its vector store.
pub const DEFAULT_TOMBSTONE_REBUILD_RATIO: f32 = 0.2;

/// Candidates requested per wanted result when a filter is applied.
pub const DEFAULT_OVERSAMPLE_MULTIPLIER: usize = 5;

/// Largest oversampling multiplier a vector query may request.
pub const MAX_OVERSAMPLE_MULTIPLIER: usize = 100;

/// Factor applied to both `ef` and candidate count on the widening pass.
pub const FILTER_WIDEN_FACTOR: usize = 4;

/// Default number of vectors a single field may hold.
pub const DEFAULT_VECTOR_CAPACITY: usize = 1_000_000;

/// Reciprocal Rank Fusion (RRF) constant `k`.
///
/// Used in the formula `1 / (k + rank)` to combine ranked lists.
pub const RRF_K: f32 = 60.0;

/// Default weight of vector similarity in weighted fusion.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;

/// Default weight of normalized text relevance in weighted fusion.
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.3;

/// Default page size of a search request.
pub const DEFAULT_TOP: usize = 50;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`top` or vector `k`) per search request.
pub const MAX_K: usize = 10_000;

/// Largest per-query `ef` override.
pub const MAX_EF_SEARCH: usize = 10_000;

/// Maximum pagination offset for search results.
pub const MAX_SKIP: usize = 100_000;

/// Maximum length of an index or field name in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum number of documents per indexing batch.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 7250;

/// Default directory for index snapshots and graph artifacts.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default interval (in seconds) between automatic snapshots. 0 = disabled.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 300;

/// Default interval (in seconds) between tombstone-ratio checks. 0 = disabled.
pub const DEFAULT_REBUILD_CHECK_INTERVAL_SECS: u64 = 60;

/// Graceful shutdown budget for the final flush.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum HTTP request body size in bytes (16 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

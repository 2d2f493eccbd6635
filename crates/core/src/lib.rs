//! # searchsim-core
//!
//! Engine of a local simulator for a managed document-search service: HNSW
//! approximate nearest neighbour search with an exact fallback, filtered
//! vector search, BM25 text ranking and hybrid fusion (RRF and weighted).
//!
//! The crate has no async dependencies; the HTTP surface lives in
//! `searchsim-server`.

/// BM25 full-text search: tokenizer, inverted index and Okapi BM25 scoring.
pub mod bm25;
/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Documents and their typed field values.
pub mod document;
/// The crate-wide error type.
pub mod error;
/// HNSW approximate nearest neighbour index: graph, insertion, search, distance metrics and artifacts.
pub mod hnsw;
/// Index definitions and vector search profiles.
pub mod schema;
/// Search primitives: backends, filtering, filtered vector search and hybrid fusion.
pub mod search;
/// Indexes, catalog and persistence.
pub mod storage;
/// Per-field vector stores and the vector search service.
pub mod vector;

pub use error::{Result, SearchError};

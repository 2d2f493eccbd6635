//! Storage layer: indexes, the catalog, and disk persistence.
//!
//! Indexes live in memory inside a [`Catalog`]. Durability comes from
//! per-index snapshots and graph artifacts written atomically under the data
//! directory.

/// Search indexes, batch indexing and the search pipeline.
pub mod index;
/// Snapshot and graph artifact persistence.
pub mod persistence;

pub use index::{
    Catalog, IndexAction, IndexStats, IndexingResult, SearchIndex, SearchRequest, SearchResponse,
    SnapshotParts,
};
pub use persistence::{load_all, load_index, remove_index, save_all, save_index};

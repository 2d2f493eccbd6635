//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! The graph is an arena keyed by dense `u32` labels: full-precision vectors are
//! stored contiguously, adjacency lists are label vectors, and a label table
//! maps labels to document ids. Deletion is by tombstone; the owning vector
//! field rebuilds the graph from its vector store once tombstones pile up.

/// Distance metrics: cosine and euclidean.
pub mod distance;
/// HNSW graph structure, configuration, and label bookkeeping.
pub mod graph;
/// HNSW insertion algorithm with bidirectional connections and heuristic pruning.
pub mod insert;
/// Checksummed, self-contained graph artifacts.
pub mod persist;
/// HNSW search: greedy descent and layer-0 beam search.
pub mod search;
/// Epoch-based visited set for graph traversal.
pub mod visited;

pub use distance::{similarity_from_distance, DistanceMetric};
pub use graph::{HnswConfig, HnswIndex};
pub use persist::{decode_artifact, encode_artifact, load_artifact};

//! Per-field vector storage and the vector search service built on it.

pub mod field;
pub mod store;

pub use field::{FieldStats, VectorField};
pub use store::VectorStore;

//! Error types for searchsim-core.
//!
//! Configuration errors are rejected at the call boundary and never coerced.
//! Degraded-mode conditions (stale graph, filter fallback) are not errors and
//! do not appear here; they surface through logs and diagnostics instead.

use thiserror::Error;

/// Errors returned by the vector, fusion, filter and storage layers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A vector's length differs from its field's declared dimensionality.
    #[error("vector dimension mismatch: field expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector contains NaN or infinite components.
    #[error("vector contains NaN or infinite components")]
    NonFiniteVector,

    /// `k`/`top` was zero or above the configured maximum.
    #[error("k must be between 1 and {max}, got {k}")]
    InvalidK { k: usize, max: usize },

    /// The fusion method name is not recognised.
    #[error("unknown fusion method '{0}'")]
    UnknownFusionMethod(String),

    /// Fusion weights or constants are out of range.
    #[error("invalid fusion parameters: {0}")]
    InvalidFusionParams(String),

    /// A vector field has reached its configured capacity.
    #[error("vector field '{field}' is full ({capacity} vectors)")]
    CapacityExceeded { field: String, capacity: usize },

    /// The index definition is invalid.
    #[error("invalid index definition: {0}")]
    InvalidSchema(String),

    /// The `$filter` expression could not be parsed or references bad fields.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A document in an indexing batch is malformed.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The named field does not exist or has the wrong type for the operation.
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    /// No document with that key exists.
    #[error("document '{0}' not found")]
    DocumentNotFound(String),

    /// A search request is malformed in a way not covered above.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The named index does not exist.
    #[error("index '{0}' not found")]
    IndexNotFound(String),

    /// An index with that name already exists.
    #[error("index '{0}' already exists")]
    IndexExists(String),

    /// A persisted graph was built with different parameters than the field now declares.
    #[error("graph artifact parameters differ from field configuration: {0}")]
    ParameterMismatch(String),

    /// A persisted artifact failed its integrity check or could not be decoded.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Returns `true` for errors caused by the caller's input rather than server state.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SearchError::Io(_)
                | SearchError::CorruptArtifact(_)
                | SearchError::ParameterMismatch(_)
                | SearchError::CapacityExceeded { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Reject empty or oversized `k` values.
pub fn check_k(k: usize, max: usize) -> Result<()> {
    if k == 0 || k > max {
        return Err(SearchError::InvalidK { k, max });
    }
    Ok(())
}

/// Reject vectors of the wrong length or with non-finite components.
pub fn check_vector(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(SearchError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(SearchError::NonFiniteVector);
    }
    Ok(())
}

//! Flat document-id → vector storage for one vector field.
//!
//! The store is the ground truth for a field: graphs are rebuilt from it,
//! exact scans iterate it, and snapshots persist it. It is an ordered map so
//! iteration (and therefore exact-scan tie-breaking) is deterministic.

use crate::error::{check_vector, Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    field: String,
    dimension: usize,
    capacity: usize,
    vectors: BTreeMap<String, Vec<f32>>,
}

impl VectorStore {
    pub fn new(field: impl Into<String>, dimension: usize, capacity: usize) -> Self {
        Self {
            field: field.into(),
            dimension,
            capacity,
            vectors: BTreeMap::new(),
        }
    }

    /// Name of the field this store belongs to.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, document_id: &str) -> Option<&[f32]> {
        self.vectors.get(document_id).map(Vec::as_slice)
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.vectors.contains_key(document_id)
    }

    /// Check that `vector` could be stored for `document_id` without storing it.
    pub fn check_insert(&self, document_id: &str, vector: &[f32]) -> Result<()> {
        check_vector(vector, self.dimension)?;
        if !self.vectors.contains_key(document_id) && self.vectors.len() >= self.capacity {
            return Err(SearchError::CapacityExceeded {
                field: self.field.clone(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Insert or overwrite the vector for `document_id`.
    pub fn upsert(&mut self, document_id: &str, vector: Vec<f32>) -> Result<()> {
        self.check_insert(document_id, &vector)?;
        self.vectors.insert(document_id.to_string(), vector);
        Ok(())
    }

    pub fn remove(&mut self, document_id: &str) -> Option<Vec<f32>> {
        self.vectors.remove(document_id)
    }

    /// Iterate in document-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> + '_ {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

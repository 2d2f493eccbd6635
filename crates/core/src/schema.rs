//! Index definitions.
//!
//! The JSON shape follows the managed service's index definition: a `fields`
//! array with EDM type names, and a `vectorSearch` section whose `profiles`
//! point at named `algorithms` (`hnsw` or `exhaustiveKnn`). A profile may
//! additionally carry a `capacity` limit for the fields that use it.

use crate::config;
use crate::error::{Result, SearchError};
use crate::hnsw::{DistanceMetric, HnswConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Edm.Int64")]
    Int64,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    #[serde(rename = "Collection(Edm.String)")]
    StringCollection,
    #[serde(rename = "Collection(Edm.Single)")]
    Vector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub key: bool,
    /// Defaults to `true` for string and string-collection fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default = "default_true")]
    pub retrievable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

fn default_true() -> bool {
    true
}

impl FieldDef {
    pub fn is_searchable(&self) -> bool {
        let textual = matches!(self.field_type, FieldType::String | FieldType::StringCollection);
        textual && self.searchable.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmConfig {
    pub name: String,
    /// `hnsw` or `exhaustiveKnn`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_parameters: Option<HnswParameters>,
    /// Only `metric` is read for `exhaustiveKnn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustive_knn_parameters: Option<HnswParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorProfile {
    pub name: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchConfig {
    #[serde(default)]
    pub algorithms: Vec<AlgorithmConfig>,
    #[serde(default)]
    pub profiles: Vec<VectorProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearchConfig>,
}

/// Fully resolved settings of one vector field.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSettings {
    pub dimension: usize,
    pub hnsw: HnswConfig,
    /// ANN disabled: every query is an exact scan.
    pub exhaustive: bool,
    pub capacity: usize,
    pub rebuild_ratio: f32,
}

impl IndexSchema {
    /// Name of the key field; empty if the schema has not been validated.
    pub fn key_field(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.key)
            .map_or("", |f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Vector)
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|f| f.is_searchable())
    }

    /// Reject malformed definitions before an index is created.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_index_name(&self.name) {
            return Err(invalid(format!(
                "index name '{}' must be 1-{} lowercase letters, digits or dashes",
                self.name,
                config::MAX_NAME_LEN
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_valid_field_name(&field.name) {
                return Err(invalid(format!("invalid field name '{}'", field.name)));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
        }

        let keys: Vec<&FieldDef> = self.fields.iter().filter(|f| f.key).collect();
        match keys.as_slice() {
            [key] if key.field_type == FieldType::String => {}
            [key] => {
                return Err(invalid(format!("key field '{}' must be Edm.String", key.name)));
            }
            _ => return Err(invalid("exactly one key field is required".to_string())),
        }

        for field in self.vector_fields() {
            self.vector_settings(&field.name)?;
        }
        for field in &self.fields {
            if field.field_type != FieldType::Vector
                && (field.dimensions.is_some() || field.vector_search_profile.is_some())
            {
                return Err(invalid(format!(
                    "field '{}' is not a vector field but declares vector settings",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve the profile and algorithm of vector field `name`.
    pub fn vector_settings(&self, name: &str) -> Result<VectorSettings> {
        let field = self
            .field(name)
            .filter(|f| f.field_type == FieldType::Vector)
            .ok_or_else(|| SearchError::FieldNotFound(name.to_string()))?;

        let dimension = field.dimensions.unwrap_or(0);
        if dimension == 0 || dimension > config::MAX_DIMENSION {
            return Err(invalid(format!(
                "vector field '{name}' needs dimensions between 1 and {}",
                config::MAX_DIMENSION
            )));
        }
        let profile_name = field
            .vector_search_profile
            .as_deref()
            .ok_or_else(|| invalid(format!("vector field '{name}' has no vectorSearchProfile")))?;
        let vector_search = self.vector_search.as_ref();
        let profile = vector_search
            .and_then(|vs| vs.profiles.iter().find(|p| p.name == profile_name))
            .ok_or_else(|| invalid(format!("unknown vector search profile '{profile_name}'")))?;
        let algorithm = vector_search
            .and_then(|vs| vs.algorithms.iter().find(|a| a.name == profile.algorithm))
            .ok_or_else(|| invalid(format!("unknown vector search algorithm '{}'", profile.algorithm)))?;

        let (params, exhaustive) = match algorithm.kind.as_str() {
            "hnsw" => (algorithm.hnsw_parameters.clone().unwrap_or_default(), false),
            "exhaustiveKnn" => (
                algorithm.exhaustive_knn_parameters.clone().unwrap_or_default(),
                true,
            ),
            other => return Err(invalid(format!("unknown algorithm kind '{other}'"))),
        };

        let m = params.m.unwrap_or(config::HNSW_DEFAULT_M);
        let ef_construction = params
            .ef_construction
            .unwrap_or(config::HNSW_DEFAULT_EF_CONSTRUCTION);
        let ef_search = params.ef_search.unwrap_or(config::HNSW_DEFAULT_EF_SEARCH);
        if !config::HNSW_M_RANGE.contains(&m) {
            return Err(invalid(format!("m must be in {:?}, got {m}", config::HNSW_M_RANGE)));
        }
        for (label, ef) in [("efConstruction", ef_construction), ("efSearch", ef_search)] {
            if !config::HNSW_EF_RANGE.contains(&ef) {
                return Err(invalid(format!(
                    "{label} must be in {:?}, got {ef}",
                    config::HNSW_EF_RANGE
                )));
            }
        }
        let metric_name = params.metric.as_deref().unwrap_or("cosine");
        let metric = DistanceMetric::from_name(metric_name)
            .ok_or_else(|| invalid(format!("unsupported metric '{metric_name}'")))?;

        let capacity = profile.capacity.unwrap_or(config::DEFAULT_VECTOR_CAPACITY);
        if capacity == 0 {
            return Err(invalid(format!("profile '{}' capacity must be positive", profile.name)));
        }

        Ok(VectorSettings {
            dimension,
            hnsw: HnswConfig::new(m, ef_construction, ef_search, metric),
            exhaustive,
            capacity,
            rebuild_ratio: config::DEFAULT_TOMBSTONE_REBUILD_RATIO,
        })
    }
}

fn invalid(message: String) -> SearchError {
    SearchError::InvalidSchema(message)
}

pub fn is_valid_index_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= config::MAX_NAME_LEN
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && name.len() <= config::MAX_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

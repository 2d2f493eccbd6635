//! Self-contained graph artifacts.
//!
//! Layout: `[bincode payload]["HNG1"][u32 CRC32 BE]`. The payload carries the
//! construction parameters, dimension, vector arena, adjacency lists, levels,
//! tombstones, label table, entry point and max layer, so a graph can be
//! restored without consulting the vector store.

use crate::error::{Result, SearchError};
use crate::hnsw::graph::{HnswConfig, HnswIndex};
use crate::storage::persistence::{seal, unseal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const ARTIFACT_MAGIC: &[u8; 4] = b"HNG1";
const ARTIFACT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u32,
    config: &'a HnswConfig,
    dimension: usize,
    vectors: &'a [f32],
    neighbors: &'a [Vec<Vec<u32>>],
    levels: &'a [u8],
    tombstones: &'a [bool],
    labels: &'a [String],
    entry_point: Option<u32>,
    max_layer: usize,
}

#[derive(Deserialize)]
struct Artifact {
    version: u32,
    config: HnswConfig,
    dimension: usize,
    vectors: Vec<f32>,
    neighbors: Vec<Vec<Vec<u32>>>,
    levels: Vec<u8>,
    tombstones: Vec<bool>,
    labels: Vec<String>,
    entry_point: Option<u32>,
    max_layer: usize,
}

/// Serialize `index` into a sealed artifact.
pub fn encode_artifact(index: &HnswIndex) -> Result<Vec<u8>> {
    let artifact = ArtifactRef {
        version: ARTIFACT_VERSION,
        config: &index.config,
        dimension: index.dimension,
        vectors: &index.vectors,
        neighbors: &index.neighbors,
        levels: &index.levels,
        tombstones: &index.tombstones,
        labels: &index.labels,
        entry_point: index.entry_point,
        max_layer: index.max_layer,
    };
    let payload =
        bincode::serialize(&artifact).map_err(|e| SearchError::CorruptArtifact(e.to_string()))?;
    Ok(seal(payload, ARTIFACT_MAGIC))
}

/// Restore a graph from sealed bytes.
///
/// Integrity failures yield [`SearchError::CorruptArtifact`]; a graph built with
/// different construction parameters or dimension yields
/// [`SearchError::ParameterMismatch`]. Either way the caller must rebuild.
pub fn decode_artifact(raw: &[u8], expected: &HnswConfig, dimension: usize) -> Result<HnswIndex> {
    let payload = unseal(raw, ARTIFACT_MAGIC)?;
    let artifact: Artifact =
        bincode::deserialize(payload).map_err(|e| SearchError::CorruptArtifact(e.to_string()))?;

    if artifact.version != ARTIFACT_VERSION {
        return Err(SearchError::CorruptArtifact(format!(
            "unsupported artifact version {}",
            artifact.version
        )));
    }
    if artifact.dimension != dimension {
        return Err(SearchError::ParameterMismatch(format!(
            "dimension {} != {}",
            artifact.dimension, dimension
        )));
    }
    if let Some(diff) = artifact.config.construction_mismatch(expected) {
        return Err(SearchError::ParameterMismatch(diff));
    }
    validate(&artifact).map_err(SearchError::CorruptArtifact)?;

    let mut index = HnswIndex::new(dimension, expected.clone());
    index.vectors = artifact.vectors;
    index.neighbors = artifact.neighbors;
    index.levels = artifact.levels;
    index.tombstones = artifact.tombstones;
    index.labels = artifact.labels;
    index.entry_point = artifact.entry_point;
    index.max_layer = artifact.max_layer;
    index.rebuild_live_table();
    Ok(index)
}

/// Read and decode the artifact at `path`.
pub fn load_artifact(path: &Path, expected: &HnswConfig, dimension: usize) -> Result<HnswIndex> {
    let raw = fs::read(path)?;
    decode_artifact(&raw, expected, dimension)
}

/// Structural checks: every table has one entry per label and every edge points at a real label.
fn validate(a: &Artifact) -> std::result::Result<(), String> {
    let n = a.labels.len();
    if a.vectors.len() != n * a.dimension {
        return Err(format!(
            "vector arena holds {} floats, expected {}",
            a.vectors.len(),
            n * a.dimension
        ));
    }
    if a.neighbors.len() != n || a.levels.len() != n || a.tombstones.len() != n {
        return Err("per-label tables have inconsistent lengths".to_string());
    }
    for (label, layers) in a.neighbors.iter().enumerate() {
        if layers.len() != a.levels[label] as usize + 1 {
            return Err(format!("label {label} has {} layers", layers.len()));
        }
        if layers.iter().flatten().any(|&nb| nb as usize >= n) {
            return Err(format!("label {label} links outside the arena"));
        }
    }
    match a.entry_point {
        None if n > 0 => Err("non-empty graph without entry point".to_string()),
        Some(ep) if ep as usize >= n => Err(format!("entry point {ep} out of range")),
        Some(ep) if a.levels[ep as usize] as usize != a.max_layer => {
            Err("entry point is not on the top layer".to_string())
        }
        _ => Ok(()),
    }
}

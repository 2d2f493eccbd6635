//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] holds the per-field construction parameters.
//! [`HnswIndex`] stores the graph as an arena indexed by dense `u32` labels:
//! vectors and norms live in contiguous arrays, adjacency lists hold labels
//! rather than references, and a label table maps every label back to its
//! document id.

use crate::config;
use crate::hnsw::distance::{norm, DistanceMetric};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration parameters for an HNSW index.
///
/// Fixed for the lifetime of a vector field; a persisted graph built with
/// different values is rejected on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node on layers above 0.
    pub m: usize,
    /// Maximum links per node at layer 0 (`2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Default candidate list size during search.
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Distance function for similarity computation.
    pub distance_metric: DistanceMetric,
}

impl HnswConfig {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize, metric: DistanceMetric) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ef_construction,
            ef_search,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            distance_metric: metric,
        }
    }

    /// Describes the first construction parameter that differs from `other`.
    ///
    /// `ef_search` is a query-time knob and is not compared.
    pub fn construction_mismatch(&self, other: &HnswConfig) -> Option<String> {
        if self.m != other.m {
            return Some(format!("m {} != {}", self.m, other.m));
        }
        if self.m_max0 != other.m_max0 {
            return Some(format!("m_max0 {} != {}", self.m_max0, other.m_max0));
        }
        if self.ef_construction != other.ef_construction {
            return Some(format!(
                "ef_construction {} != {}",
                self.ef_construction, other.ef_construction
            ));
        }
        if self.max_layers != other.max_layers {
            return Some(format!("max_layers {} != {}", self.max_layers, other.max_layers));
        }
        if self.distance_metric != other.distance_metric {
            return Some(format!(
                "metric {} != {}",
                self.distance_metric.name(),
                other.distance_metric.name()
            ));
        }
        None
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::new(
            config::HNSW_DEFAULT_M,
            config::HNSW_DEFAULT_EF_CONSTRUCTION,
            config::HNSW_DEFAULT_EF_SEARCH,
            DistanceMetric::Cosine,
        )
    }
}

/// HNSW index over an arena of labelled vectors.
///
/// Labels are assigned sequentially and never reused. Re-inserting a document
/// tombstones its previous label; deleting a document tombstones its live
/// label. Tombstoned nodes stay in the graph for navigation and are filtered
/// out of every result set.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) dimension: usize,
    // Arena: label * dimension .. (label + 1) * dimension
    pub(crate) vectors: Vec<f32>,
    pub(crate) norms: Vec<f32>,
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>, // [label][layer][neighbor labels]
    pub(crate) levels: Vec<u8>,
    pub(crate) tombstones: Vec<bool>,
    pub(crate) labels: Vec<String>,
    pub(crate) live: HashMap<String, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_layer: usize,
    pub(crate) tombstone_count: usize,
    rng: StdRng,
}

impl HnswIndex {
    /// Creates an empty index whose level draws come from an OS-seeded generator.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self::with_seed(dimension, config, rand::random())
    }

    /// Creates an empty index with a fixed level-draw seed, for reproducible graphs.
    pub fn with_seed(dimension: usize, config: HnswConfig, seed: u64) -> Self {
        Self {
            config,
            dimension,
            vectors: Vec::new(),
            norms: Vec::new(),
            neighbors: Vec::new(),
            levels: Vec::new(),
            tombstones: Vec::new(),
            labels: Vec::new(),
            live: HashMap::new(),
            entry_point: None,
            max_layer: 0,
            tombstone_count: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of live (non-tombstoned) documents.
    pub fn len(&self) -> usize {
        self.labels.len() - self.tombstone_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of labels ever assigned, tombstoned ones included.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Fraction of labels that are tombstoned. 0 for an empty graph.
    pub fn tombstone_ratio(&self) -> f32 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.tombstone_count as f32 / self.labels.len() as f32
        }
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    /// Live label currently assigned to `document_id`.
    pub fn label_of(&self, document_id: &str) -> Option<u32> {
        self.live.get(document_id).copied()
    }

    /// Document id owning `label`.
    #[inline]
    pub fn document_id(&self, label: u32) -> &str {
        &self.labels[label as usize]
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.live.contains_key(document_id)
    }

    #[inline]
    pub fn is_tombstoned(&self, label: u32) -> bool {
        self.tombstones[label as usize]
    }

    /// Top layer assigned to `label`.
    #[inline]
    pub fn level(&self, label: u32) -> usize {
        self.levels[label as usize] as usize
    }

    /// O(1) slice into the vector arena.
    #[inline]
    pub fn vector(&self, label: u32) -> &[f32] {
        let start = label as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Neighbours of `label` on `layer`; empty above the node's level.
    #[inline]
    pub fn neighbors(&self, label: u32, layer: usize) -> &[u32] {
        self.neighbors[label as usize]
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distance from an arbitrary query (with precomputed norm) to a stored node.
    #[inline]
    pub(crate) fn distance_to(&self, query: &[f32], query_norm: f32, label: u32) -> f32 {
        self.config.distance_metric.distance_with_norms(
            query,
            query_norm,
            self.vector(label),
            self.norms[label as usize],
        )
    }

    /// Distance between two stored nodes.
    #[inline]
    pub(crate) fn distance_between(&self, a: u32, b: u32) -> f32 {
        self.distance_to(self.vector(a), self.norms[a as usize], b)
    }

    /// Draw a top layer: `floor(-ln(U) / ln(M))`, capped at `max_layers - 1`.
    pub(crate) fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.config.m.max(2) as f64).ln();
        // gen::<f64>() is in [0, 1); map to (0, 1] so ln() stays finite
        let r: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.config.max_layers.saturating_sub(1))
    }

    /// Append a node to the arena with empty adjacency lists. Returns its label.
    pub(crate) fn push_node(&mut self, document_id: &str, vector: &[f32], level: usize) -> u32 {
        let label = self.labels.len() as u32;
        self.vectors.extend_from_slice(vector);
        self.norms.push(norm(vector));
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.levels.push(level as u8);
        self.tombstones.push(false);
        self.labels.push(document_id.to_string());
        if let Some(previous) = self.live.insert(document_id.to_string(), label) {
            self.tombstone_label(previous);
        }
        label
    }

    /// Tombstone the live label of `document_id`. Returns `false` if it had none.
    pub fn remove(&mut self, document_id: &str) -> bool {
        match self.live.remove(document_id) {
            Some(label) => {
                self.tombstone_label(label);
                true
            }
            None => false,
        }
    }

    fn tombstone_label(&mut self, label: u32) {
        let slot = &mut self.tombstones[label as usize];
        if !*slot {
            *slot = true;
            self.tombstone_count += 1;
        }
    }

    /// Restore derived state after the arena has been loaded from an artifact.
    pub(crate) fn rebuild_live_table(&mut self) {
        self.live.clear();
        self.tombstone_count = 0;
        for (label, document_id) in self.labels.iter().enumerate() {
            if self.tombstones[label] {
                self.tombstone_count += 1;
            } else {
                self.live.insert(document_id.clone(), label as u32);
            }
        }
        self.norms = self
            .vectors
            .chunks_exact(self.dimension.max(1))
            .map(norm)
            .collect();
    }

    /// Iterate over live `(document_id, vector)` pairs in label order.
    pub fn live_vectors(&self) -> impl Iterator<Item = (&str, &[f32])> + '_ {
        (0..self.labels.len() as u32)
            .filter(move |&l| !self.is_tombstoned(l))
            .map(move |l| (self.document_id(l), self.vector(l)))
    }
}

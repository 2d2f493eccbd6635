//! Result and diagnostic types shared by the vector, filtered and fused search paths.

use crate::config;
use serde::Serialize;
use std::collections::BTreeMap;

/// One hit from a single vector field.
///
/// `similarity` is always `1 / (1 + distance)` regardless of which backend
/// produced the distance. `rank` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document_id: String,
    pub distance: f32,
    pub similarity: f32,
    pub rank: usize,
}

/// Per-query knobs for a vector search.
#[derive(Debug, Clone)]
pub struct VectorSearchOptions {
    /// Beam width override; defaults to the field's `ef_search`.
    pub ef: Option<usize>,
    /// Force a brute-force scan.
    pub exhaustive: bool,
    /// Candidates requested per wanted result when a filter applies.
    pub oversample: usize,
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self {
            ef: None,
            exhaustive: false,
            oversample: config::DEFAULT_OVERSAMPLE_MULTIPLIER,
        }
    }
}

/// Which backend served a vector query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Ann,
    Exact,
}

/// Route a filtered vector query took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterPath {
    /// The field was served by brute force from the start; the predicate ran inside the scan.
    ExactScan,
    /// The first oversampled ANN pass yielded enough matches.
    Oversampled,
    /// A second ANN pass with wider `ef` yielded enough matches.
    Widened,
    /// ANN passes fell short; a predicate-restricted exact scan produced the answer.
    ExactFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDiagnostics {
    pub path: FilterPath,
    /// Candidates the predicate was evaluated against, over all passes.
    pub candidates_examined: usize,
    /// Set when the predicate was selective enough to force the exact fallback.
    pub low_selectivity: bool,
}

#[derive(Debug, Clone)]
pub struct FilteredOutcome {
    pub results: Vec<SearchResult>,
    pub backend: BackendKind,
    pub diagnostics: FilterDiagnostics,
}

/// Raw text contribution to a fused score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextScore {
    pub rank: usize,
    pub score: f32,
}

/// Raw per-field vector contribution to a fused score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorScore {
    pub rank: usize,
    pub distance: f32,
    pub similarity: f32,
}

/// Per-source breakdown kept alongside every fused score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextScore>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vectors: BTreeMap<String, VectorScore>,
}

/// One entry of a fused ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub document_id: String,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
}

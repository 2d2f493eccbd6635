//! Hybrid fusion of one text ranking with any number of vector rankings.
//!
//! - **RRF** (Reciprocal Rank Fusion): `Σ 1 / (k_rrf + rank)` over every list a
//!   document appears in. Depends on rank order only.
//! - **Weighted sum**: `text_weight × minmax(text) + Σ vector_weight × similarity`.
//!
//! Documents are merged by id. The text list is visited first, then the vector
//! lists in request order; equal fused scores keep that first-seen order. A
//! document listed twice in one ranking counts once, at its first position.

use crate::config;
use crate::error::{check_k, Result, SearchError};
use crate::search::types::{FusedResult, ScoreBreakdown, SearchResult, TextScore, VectorScore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FusionMethod {
    #[default]
    ReciprocalRankFusion,
    WeightedSum,
}

impl FromStr for FusionMethod {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rrf" | "reciprocalrankfusion" => Ok(FusionMethod::ReciprocalRankFusion),
            "weighted" | "weightedsum" | "linear" => Ok(FusionMethod::WeightedSum),
            _ => Err(SearchError::UnknownFusionMethod(s.to_string())),
        }
    }
}

/// Per-query fusion configuration. Weights are relative and need not sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionParams {
    pub method: FusionMethod,
    pub rrf_constant: f32,
    pub vector_weight: f32,
    pub text_weight: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            method: FusionMethod::ReciprocalRankFusion,
            rrf_constant: config::RRF_K,
            vector_weight: config::DEFAULT_VECTOR_WEIGHT,
            text_weight: config::DEFAULT_TEXT_WEIGHT,
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<()> {
        if !self.rrf_constant.is_finite() || self.rrf_constant < 0.0 {
            return Err(SearchError::InvalidFusionParams(format!(
                "rrf constant must be a non-negative number, got {}",
                self.rrf_constant
            )));
        }
        for (name, w) in [("vector", self.vector_weight), ("text", self.text_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(SearchError::InvalidFusionParams(format!(
                    "{name} weight must be a non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// One vector field's ranking, labelled for the score breakdown.
#[derive(Debug, Clone)]
pub struct VectorRanking {
    pub field: String,
    pub results: Vec<SearchResult>,
}

/// Merge `text` (ordered `(document_id, relevance)`) with `vectors` into at most `k` fused results.
pub fn hybrid_search(
    text: &[(String, f32)],
    vectors: &[VectorRanking],
    params: &FusionParams,
    k: usize,
) -> Result<Vec<FusedResult>> {
    check_k(k, config::MAX_K)?;
    params.validate()?;

    let mut fused = Accumulator::default();
    let text = dedup(text.iter().map(|(id, score)| (id.as_str(), *score)));

    let (text_min, text_range) = min_range(text.iter().map(|&(_, _, s)| s));
    for &(rank, id, score) in &text {
        let contribution = match params.method {
            FusionMethod::ReciprocalRankFusion => rrf(params.rrf_constant, rank),
            FusionMethod::WeightedSum => {
                let norm = if text_range > 0.0 {
                    (score - text_min) / text_range
                } else {
                    0.0
                };
                params.text_weight * norm
            }
        };
        let entry = fused.entry(id);
        entry.score += contribution;
        entry.breakdown.text = Some(TextScore { rank, score });
    }

    for ranking in vectors {
        let hits = dedup(
            ranking
                .results
                .iter()
                .map(|r| (r.document_id.as_str(), r)),
        );
        for (rank, id, hit) in hits {
            let contribution = match params.method {
                FusionMethod::ReciprocalRankFusion => rrf(params.rrf_constant, rank),
                FusionMethod::WeightedSum => params.vector_weight * hit.similarity,
            };
            let entry = fused.entry(id);
            entry.score += contribution;
            entry.breakdown.vectors.insert(
                ranking.field.clone(),
                VectorScore {
                    rank,
                    distance: hit.distance,
                    similarity: hit.similarity,
                },
            );
        }
    }

    let mut results = fused.entries;
    // Stable sort: equal scores keep first-seen order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(k);
    Ok(results)
}

#[inline]
fn rrf(constant: f32, rank: usize) -> f32 {
    1.0 / (constant + rank as f32)
}

/// Keep the first occurrence of every id, paired with its 1-indexed position.
fn dedup<'a, T>(items: impl Iterator<Item = (&'a str, T)>) -> Vec<(usize, &'a str, T)> {
    let mut seen = HashSet::new();
    items
        .enumerate()
        .filter(|(_, (id, _))| seen.insert(*id))
        .map(|(i, (id, value))| (i + 1, id, value))
        .collect()
}

/// Minimum and spread of the scores; `(0, 0)` when empty.
fn min_range(scores: impl Iterator<Item = f32>) -> (f32, f32) {
    let (min, max) = scores.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s), hi.max(s))
    });
    if min.is_finite() && max.is_finite() {
        (min, max - min)
    } else {
        (0.0, 0.0)
    }
}

#[derive(Default)]
struct Accumulator {
    entries: Vec<FusedResult>,
    positions: HashMap<String, usize>,
}

impl Accumulator {
    fn entry(&mut self, id: &str) -> &mut FusedResult {
        let next = self.entries.len();
        let pos = *self.positions.entry(id.to_string()).or_insert(next);
        if pos == next {
            self.entries.push(FusedResult {
                document_id: id.to_string(),
                score: 0.0,
                breakdown: ScoreBreakdown::default(),
            });
        }
        &mut self.entries[pos]
    }
}

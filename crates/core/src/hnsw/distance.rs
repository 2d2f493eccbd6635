//! Distance metric implementations for HNSW search and exact scans.
//!
//! All metrics return a distance where **lower is better**. Similarity scores
//! shown to callers are derived uniformly as `1 / (1 + distance)`, whichever
//! search path produced the distance.

use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
}

impl DistanceMetric {
    /// Parses the metric name used in vector search profiles.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "euclidean" | "l2" => Some(DistanceMetric::Euclidean),
            _ => None,
        }
    }

    /// Returns the canonical metric name.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Distance between two vectors, computing norms on the fly.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, norm(a), b, norm(b)),
            DistanceMetric::Euclidean => euclidean(a, b),
        }
    }

    /// Distance with both L2 norms precomputed. Norms are ignored for Euclidean.
    #[inline]
    pub fn distance_with_norms(&self, a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, a_norm, b, b_norm),
            DistanceMetric::Euclidean => euclidean(a, b),
        }
    }
}

/// Converts a distance into a similarity score in (0, 1].
#[inline]
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Dot product over 4-wide chunks so the compiler can vectorize the loop.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let chunks = a.len() / 4;
    let mut acc = [0.0f32; 4];
    for i in 0..chunks {
        let base = i * 4;
        acc[0] += a[base] * b[base];
        acc[1] += a[base + 1] * b[base + 1];
        acc[2] += a[base + 2] * b[base + 2];
        acc[3] += a[base + 3] * b[base + 3];
    }
    let mut sum = acc[0] + acc[1] + acc[2] + acc[3];
    for i in chunks * 4..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// L2 norm of a vector.
#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Zero vectors have no direction; they sit at distance 1 (orthogonal) from everything.
#[inline]
fn cosine_distance(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 1.0;
    }
    let cos = dot(a, b) / (a_norm * b_norm);
    (1.0 - cos).clamp(0.0, 2.0)
}

#[inline]
fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

//! Distance metrics for the embedding space.
//!
//! Distances are computed over the native dimension only. Padding is
//! stripped before vectors reach these functions.

use serde::{Deserialize, Serialize};

/// Distance metric of an embedding space.
///
/// # Variants
///
/// - `Cosine`: 1 - cos(a, b), range [0, 2]. Zero-magnitude input has distance 1.
/// - `Euclidean`: L2 distance, range [0, inf).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance: 1 - cos(a, b). Range [0, 2].
    #[default]
    Cosine,
    /// L2 Euclidean distance. Range [0, inf).
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    ///
    /// Callers validate lengths first; mismatched slices are compared over
    /// the shorter prefix.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_distance(a, b),
            Self::Euclidean => euclidean_distance(a, b),
        }
    }

    /// Convert a distance into a score where higher means more similar.
    ///
    /// Cosine maps to `1 - d` (range [-1, 1]); Euclidean maps to
    /// `1 / (1 + d)` (range (0, 1]).
    #[inline]
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::Euclidean => 1.0 / (1.0 + distance),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Returns 1.0 when either vector has zero magnitude (no NaN).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let cos = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - cos
}

/// L2 Euclidean distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

//! Distance metrics for vector similarity.
//!
//! Every metric here is expressed as a distance: **lower means closer**. The
//! index sorts ascending on this value, so similarity-style metrics are
//! transformed (cosine becomes `1 - cos`, dot product is negated).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance metric used by an index.
///
/// - **SquaredEuclidean**: the default. Same ordering as Euclidean without the
///   square root, matching what most embedding stores compute.
/// - **Euclidean**: straight-line (L2) distance.
/// - **Cosine**: `1 - cosine_similarity`; ignores magnitude.
/// - **DotProduct**: negated inner product; for pre-normalized vectors.
/// - **Manhattan**: sum of absolute differences (L1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance. Range: [0, ∞).
    #[default]
    SquaredEuclidean,

    /// Euclidean (L2) distance. Range: [0, ∞).
    Euclidean,

    /// Cosine distance. Range: [0, 2].
    Cosine,

    /// Negated dot product. Range: (-∞, ∞).
    DotProduct,

    /// Manhattan (L1) distance. Range: [0, ∞).
    Manhattan,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            DistanceMetric::SquaredEuclidean => squared_euclidean(a, b),
            DistanceMetric::Euclidean => squared_euclidean(a, b).sqrt(),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
            DistanceMetric::Manhattan => manhattan_distance(a, b),
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::SquaredEuclidean => "squared_euclidean",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "squared_euclidean" | "sq_l2" | "l2sq" => Ok(DistanceMetric::SquaredEuclidean),
            "euclidean" | "l2" | "euclid" => Ok(DistanceMetric::Euclidean),
            "cosine" | "cos" => Ok(DistanceMetric::Cosine),
            "dot" | "dot_product" | "dotproduct" | "inner" => Ok(DistanceMetric::DotProduct),
            "manhattan" | "l1" | "taxicab" => Ok(DistanceMetric::Manhattan),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

// ============================================================================
// Distance Functions
// ============================================================================

#[inline]
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;

    let chunks = a.len() / 4;
    let remainder = a.len() % 4;

    for i in 0..chunks {
        let base = i * 4;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    let start = chunks * 4;
    for i in 0..remainder {
        let idx = start + i;
        let d = a[idx] - b[idx];
        sum += d * d;
    }

    sum
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Returns a value in [-1, 1]; zero vectors are treated as orthogonal.
#[inline]
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[inline]
fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean() {
        let a = [0.0, 0.0, 0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 0.0, 0.0, 2.0];
        let dist = DistanceMetric::SquaredEuclidean.distance(&a, &b);
        assert!((dist - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_is_root_of_squared() {
        let a = [3.0, 0.0];
        let b = [0.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance() {
        let a = [1.0, 0.0, 0.0];
        assert!(DistanceMetric::Cosine.distance(&a, &a).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &[0.0, 1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &[-1.0, 0.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_is_negated() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        // 1*4 + 2*5 + 3*6 = 32
        assert!((DistanceMetric::DotProduct.distance(&a, &b) + 32.0).abs() < 1e-6);
    }

    #[test]
    fn test_manhattan_distance() {
        let dist = DistanceMetric::Manhattan.distance(&[0.0, 0.0, 0.0], &[1.0, -2.0, 3.0]);
        assert!((dist - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!(
            "squared_euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::SquaredEuclidean
        );
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("cos".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("dot".parse::<DistanceMetric>().unwrap(), DistanceMetric::DotProduct);
        assert!("hamming".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_name_round_trips_through_from_str() {
        for metric in [
            DistanceMetric::SquaredEuclidean,
            DistanceMetric::Euclidean,
            DistanceMetric::Cosine,
            DistanceMetric::DotProduct,
            DistanceMetric::Manhattan,
        ] {
            assert_eq!(metric.name().parse::<DistanceMetric>().unwrap(), metric);
        }
    }
}

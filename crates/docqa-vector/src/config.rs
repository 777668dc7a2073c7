//! Configuration for docqa-vector.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of an index: every vector it holds has `dimensions` components and
/// is compared with `metric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimensionality (e.g., 1536 for OpenAI ada-002 embeddings).
    pub dimensions: usize,

    /// Distance metric for nearest-neighbour ordering.
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl IndexConfig {
    /// Create a configuration with the default metric (squared Euclidean).
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            metric: DistanceMetric::default(),
        }
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Reject configurations no index can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::Configuration("Dimensions must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metric() {
        let config = IndexConfig::new(1536);
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.metric, DistanceMetric::SquaredEuclidean);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            IndexConfig::new(0).validate(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_with_metric() {
        let config = IndexConfig::new(3).with_metric(DistanceMetric::Cosine);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert!(config.validate().is_ok());
    }
}

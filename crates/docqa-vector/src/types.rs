//! Common types for docqa-vector.

use serde::{Deserialize, Serialize};

/// Unique identifier for a vector in an index.
pub type VectorId = String;

/// Result of a nearest-neighbour search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// ID of the matched vector.
    pub id: VectorId,
    /// Distance to the query under the index metric (lower = closer).
    pub distance: f32,
    /// Insertion position of the matched vector.
    pub position: usize,
}

impl SearchResult {
    /// Create a new search result.
    pub fn new(id: VectorId, distance: f32, position: usize) -> Self {
        Self {
            id,
            distance,
            position,
        }
    }
}

//! Exact (brute-force) vector index.
//!
//! Vectors are kept in one contiguous buffer in insertion order. Search scans
//! every vector, so results are exact and deterministic: ascending distance,
//! ties broken by insertion order.

use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{SearchResult, VectorId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Append-only flat index with string ids.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    config: IndexConfig,
    /// Ids in insertion order; `ids[i]` owns `data[i * dim..(i + 1) * dim]`.
    ids: Vec<VectorId>,
    data: Vec<f32>,
    positions: HashMap<VectorId, usize>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            ids: Vec::new(),
            data: Vec::new(),
            positions: HashMap::new(),
        })
    }

    /// Build an index from `(id, vector)` pairs in one pass.
    ///
    /// Fails on the first duplicate id, wrong-sized vector, or non-finite value;
    /// no partially built index is returned.
    pub fn build<I, S, V>(config: IndexConfig, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<VectorId>,
        V: AsRef<[f32]>,
    {
        let mut index = Self::new(config)?;
        for (id, vector) in entries {
            index.insert(id, vector.as_ref())?;
        }
        debug!(count = index.len(), dimensions = config.dimensions, "Built flat index");
        Ok(index)
    }

    /// Reassemble an index from its stored parts.
    ///
    /// `data` must hold exactly `ids.len() * dimensions` values.
    pub fn from_parts(config: IndexConfig, ids: Vec<VectorId>, data: Vec<f32>) -> Result<Self> {
        config.validate()?;

        let expected = ids.len() * config.dimensions;
        if data.len() != expected {
            return Err(Error::InvalidVector(format!(
                "Vector buffer holds {} values, expected {} for {} ids",
                data.len(),
                expected,
                ids.len()
            )));
        }

        let mut positions = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), position).is_some() {
                return Err(Error::DuplicateId(id.clone()));
            }
        }

        Ok(Self {
            config,
            ids,
            data,
            positions,
        })
    }

    /// Get the index configuration.
    pub fn config(&self) -> IndexConfig {
        self.config
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check if a vector exists.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[VectorId] {
        &self.ids
    }

    /// The contiguous vector buffer, in insertion order.
    pub fn raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Get a vector by ID.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        let position = *self.positions.get(id)?;
        Some(self.vector_at(position))
    }

    /// Iterate `(id, vector)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> + '_ {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.data.chunks_exact(self.config.dimensions))
    }

    /// Append a vector. Ids are never overwritten.
    pub fn insert(&mut self, id: impl Into<VectorId>, vector: &[f32]) -> Result<()> {
        let id = id.into();
        self.validate_vector(vector)?;

        if self.positions.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }

        let position = self.ids.len();
        self.positions.insert(id.clone(), position);
        self.data.extend_from_slice(vector);
        trace!(id = %id, position, "Inserted vector");
        self.ids.push(id);

        Ok(())
    }

    /// Return the `k` closest vectors to `query`.
    ///
    /// Results are sorted by ascending distance; equal distances keep
    /// insertion order. Asking for more results than the index holds returns
    /// everything; `k == 0` returns nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.validate_vector(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let metric = self.config.metric;
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.config.dimensions)
            .map(|vector| metric.distance(query, vector))
            .enumerate()
            .collect();

        let by_rank =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                SearchResult::new(self.ids[position].clone(), distance, position)
            })
            .collect())
    }

    /// Estimate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let vector_bytes = self.data.len() * std::mem::size_of::<f32>();
        let id_bytes: usize = self.ids.iter().map(|id| id.len() * 2).sum();
        vector_bytes + id_bytes
    }

    fn vector_at(&self, position: usize) -> &[f32] {
        let dim = self.config.dimensions;
        &self.data[position * dim..(position + 1) * dim]
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            });
        }

        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidVector(
                "Vector contains NaN or Inf".to_string(),
            ));
        }

        Ok(())
    }
}

impl PartialEq for FlatIndex {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && self.ids == other.ids
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

//! # docqa-vector
//!
//! A small embedded vector store for document QA: an exact nearest-neighbour
//! index plus crash-safe snapshot persistence.
//!
//! ## Features
//!
//! - **Exact search**: every query scans all vectors, so results are
//!   deterministic (ascending distance, ties by insertion order)
//! - **Contiguous storage**: vectors live in one `Vec<f32>` buffer
//! - **Multiple Distance Metrics**: Squared Euclidean (default), Euclidean,
//!   Cosine, Dot Product, Manhattan
//! - **Atomic snapshots**: checksummed blobs committed by a manifest rename,
//!   with a clear split between "never saved" and "corrupt"
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_vector::{FlatIndex, IndexConfig, persistence};
//!
//! let index = FlatIndex::build(
//!     IndexConfig::new(3),
//!     [("doc#0", vec![1.0, 0.0, 0.0]), ("doc#1", vec![0.0, 1.0, 0.0])],
//! )?;
//! let hits = index.search(&[0.9, 0.1, 0.0], 1)?;
//! assert_eq!(hits[0].id, "doc#0");
//!
//! let blob = persistence::encode_index(&index)?;
//! persistence::write_snapshot("store".as_ref(), &[("vectors.bin", &blob)]).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use config::IndexConfig;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use index::FlatIndex;
pub use persistence::{Manifest, Snapshot};
pub use types::{SearchResult, VectorId};

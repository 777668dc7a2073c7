//! Error types for docqa-vector.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for docqa-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in docqa-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A vector with this id is already in the index.
    #[error("Vector '{0}' already exists")]
    DuplicateId(String),

    /// Dimension mismatch between vector and index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Invalid vector (e.g., empty, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No snapshot has ever been committed at this path.
    #[error("No snapshot found at {0}")]
    NotFound(PathBuf),

    /// A snapshot exists but cannot be read back faithfully.
    #[error("Corrupt snapshot at {path}: {reason}")]
    Corrupt {
        /// Snapshot directory.
        path: PathBuf,
        /// What failed validation.
        reason: String,
    },

    /// Encoding or decoding failure outside of snapshot validation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error means "nothing saved here yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True when the error means "something is saved here but it is unusable".
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt { .. })
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

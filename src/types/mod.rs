use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============= Document Types =============

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMedium {
    Pdf,
    PlainText,
}

impl fmt::Display for SourceMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMedium::Pdf => write!(f, "pdf"),
            SourceMedium::PlainText => write!(f, "text"),
        }
    }
}

/// A loaded document. Lives only until it has been chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name the text was read from.
    pub id: String,
    pub text: String,
    pub medium: SourceMedium,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, medium: SourceMedium) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            medium,
        }
    }
}

/// A bounded span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}#{ordinal}`
    pub id: String,
    pub document_id: String,
    pub ordinal: usize,
    /// Byte offset of `text` within the document text.
    pub byte_offset: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(document_id: &str, ordinal: usize, byte_offset: usize, text: String) -> Self {
        Self {
            id: Self::make_id(document_id, ordinal),
            document_id: document_id.to_string(),
            ordinal,
            byte_offset,
            text,
        }
    }

    pub fn make_id(document_id: &str, ordinal: usize) -> String {
        format!("{}#{}", document_id, ordinal)
    }
}

// ============= Answer Types =============

/// A retrieved chunk cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: String,
    pub document_id: String,
    /// Distance to the question under the index metric (lower = closer).
    pub distance: f32,
    pub text: String,
}

impl Source {
    pub fn from_chunk(chunk: &Chunk, distance: f32) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            distance,
            text: chunk.text.clone(),
        }
    }

    /// The chunk text cut to at most `max_chars` characters, ending in `...`
    /// when cut.
    pub fn snippet(&self, max_chars: usize) -> String {
        truncate_chars(&self.text, max_chars)
    }

    /// One-line citation, e.g. `> Source (Doc id: manual.txt#0): The van has...`
    pub fn formatted(&self, max_chars: usize) -> String {
        format!(
            "> Source (Doc id: {}): {}",
            self.chunk_id,
            self.snippet(max_chars)
        )
    }
}

/// A generated answer plus the chunks it was grounded on, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

impl Answer {
    /// All sources rendered one per block, separated by blank lines.
    pub fn formatted_sources(&self, max_chars: usize) -> String {
        self.sources
            .iter()
            .map(|s| s.formatted(max_chars))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

// ============= Error Types =============

/// Why a saved store could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLoadKind {
    /// Nothing has been saved at this location.
    NotFound,
    /// Something was saved but it is unreadable or inconsistent.
    Corrupt,
}

impl fmt::Display for IndexLoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexLoadKind::NotFound => write!(f, "not found"),
            IndexLoadKind::Corrupt => write!(f, "corrupt"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Index at {path} is {kind}: {reason}")]
pub struct IndexLoadError {
    pub kind: IndexLoadKind,
    pub path: PathBuf,
    pub reason: String,
}

impl IndexLoadError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: IndexLoadKind::NotFound,
            path: path.into(),
            reason: "no saved index".to_string(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            kind: IndexLoadKind::Corrupt,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Cannot ingest '{document}': {reason}")]
    Ingestion { document: String, reason: String },

    #[error("Embedding service error: {message}")]
    EmbeddingService { message: String, transient: bool },

    #[error(transparent)]
    IndexLoad(#[from] IndexLoadError),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Could not answer the question: {0}")]
    AnswerGeneration(Box<AppError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn ingestion(document: impl Into<String>, reason: impl fmt::Display) -> Self {
        AppError::Ingestion {
            document: document.into(),
            reason: reason.to_string(),
        }
    }

    pub fn embedding(message: impl Into<String>, transient: bool) -> Self {
        AppError::EmbeddingService {
            message: message.into(),
            transient,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::EmbeddingService { transient, .. } => *transient,
            AppError::AnswerGeneration(inner) => inner.is_transient(),
            _ => false,
        }
    }

    /// The root cause beneath any `AnswerGeneration` wrapping.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::AnswerGeneration(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub fn is_index_not_found(&self) -> bool {
        matches!(
            self,
            AppError::IndexLoad(IndexLoadError {
                kind: IndexLoadKind::NotFound,
                ..
            })
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        let chunk = Chunk::new("manual.txt", 3, 120, "text".into());
        assert_eq!(chunk.id, "manual.txt#3");
    }

    #[test]
    fn test_snippet_truncates_on_chars() {
        let source = Source {
            chunk_id: "a#0".into(),
            document_id: "a".into(),
            distance: 0.0,
            text: "héllo wörld".into(),
        };
        assert_eq!(source.snippet(100), "héllo wörld");
        assert_eq!(source.snippet(8), "héllo...");
        assert_eq!(source.formatted(8), "> Source (Doc id: a#0): héllo...");
    }

    #[test]
    fn test_transient_survives_wrapping() {
        let err = AppError::AnswerGeneration(Box::new(AppError::embedding("rate limited", true)));
        assert!(err.is_transient());
        assert!(matches!(err.root_cause(), AppError::EmbeddingService { .. }));

        let err = AppError::AnswerGeneration(Box::new(AppError::Generation("bad".into())));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_index_not_found_detection() {
        let err: AppError = IndexLoadError::not_found("/tmp/x").into();
        assert!(err.is_index_not_found());

        let err: AppError = IndexLoadError::corrupt("/tmp/x", "bad checksum").into();
        assert!(!err.is_index_not_found());
    }
}

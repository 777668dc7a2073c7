//! Text chunking for document processing.
//!
//! Splitting is delegated to `text-splitter`, which prefers paragraph,
//! sentence and word boundaries and only falls back to grapheme cuts. Trimming
//! is disabled so the chunks, with overlap removed, cover the document text
//! byte for byte.

use crate::types::{AppError, Chunk, Document, Result};
use text_splitter::{Characters, ChunkConfig, TextSplitter};
use tracing::debug;

pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: TextSplitter<Characters>,
}

impl TextChunker {
    /// `chunk_size` is in characters; `chunk_overlap` must be smaller.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidInput(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?
            .with_trim(false);

        Ok(Self {
            chunk_size,
            chunk_overlap,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document into ordered chunks. Empty text yields no chunks.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let chunks: Vec<Chunk> = self
            .splitter
            .chunk_indices(&document.text)
            .enumerate()
            .map(|(ordinal, (offset, text))| {
                Chunk::new(&document.id, ordinal, offset, text.to_string())
            })
            .collect();

        debug!(
            document = %document.id,
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            "Chunked document"
        );
        chunks
    }
}

/// Rebuild the source text from one document's chunks, dropping overlap.
///
/// Chunks must be in ordinal order.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        let end = chunk.byte_offset + chunk.text.len();
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.byte_offset);
        text.push_str(&chunk.text[skip..]);
        covered = end;
    }

    text
}

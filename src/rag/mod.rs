//! Retrieval Augmented Generation (RAG) pipeline.
//!
//! # Module Structure
//!
//! - [`loader`] - PDF and plain-text document loading, text-directory merge
//! - [`chunker`] - Boundary-aware text chunking with overlap
//! - [`embeddings`] - Embedding service clients (OpenAI-compatible, Ollama)
//! - [`cache`] - LRU cache in front of an embedder
//! - [`store`] - Knowledge base: document store plus vector index, persisted
//! - [`prompt`] - QA prompt template
//! - [`pipeline`] - Index building and question answering
//!
//! # Flow
//!
//! 1. **Ingestion** - Documents are loaded and chunked
//! 2. **Embedding** - Chunks are embedded in batches
//! 3. **Storage** - Vectors go into an exact flat index, saved to disk
//! 4. **Retrieval** - The question is embedded, the nearest chunks retrieved
//! 5. **Generation** - The LLM answers from the retrieved context

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod store;

pub use chunker::TextChunker;
pub use embeddings::{create_embedder, Embedder};
pub use pipeline::{DocumentSelection, IngestReport, OpenOutcome, RagPipeline};
pub use store::KnowledgeBase;

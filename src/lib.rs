//! # docqa - Document Question Answering
//!
//! Ask questions about PDF and plain-text documents. docqa chunks the
//! documents, embeds the chunks through an embedding service, keeps them in
//! an exact vector index saved on disk, and answers questions by handing the
//! most relevant chunks to a language model.
//!
//! ## Overview
//!
//! docqa can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `docqa` binary
//! 2. **As a library** - Drive [`RagPipeline`] from your own code
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use docqa::{DocqaConfig, ProviderRegistry, RagPipeline};
//! use docqa::rag::{create_embedder, DocumentSelection};
//!
//! #[tokio::main]
//! async fn main() -> docqa::Result<()> {
//!     let config = DocqaConfig::load("docqa.toml")?;
//!     let pipeline = RagPipeline::from_config(&config, create_embedder(&config)?)?;
//!
//!     let selection = DocumentSelection::Files(vec!["pdf_data/manual.pdf".into()]);
//!     let (kb, _) = pipeline
//!         .open_or_build("storage/manual.pdf".as_ref(), &selection)
//!         .await?;
//!
//!     let llm = ProviderRegistry::from_config(&config).create_client_for_model(None)?;
//!     let answer = pipeline
//!         .answer(&kb, llm.as_ref(), "How much cargo space does the van have?", 2)
//!         .await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`rag`] - Loading, chunking, embedding, storage and answering
//! - [`llm`] - Chat model clients
//! - [`session`] - Chat history
//! - [`cli`] - Command definitions and terminal output
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration

#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Chat sessions.
pub mod session;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider, ProviderRegistry};
pub use rag::{KnowledgeBase, RagPipeline};
pub use session::ChatSession;
pub use types::{Answer, AppError, Result};
pub use utils::toml_config::DocqaConfig;

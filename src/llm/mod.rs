//! LLM Provider Clients and Abstractions
//!
//! Chat providers sit behind the [`LLMClient`] trait so the question-answering
//! pipeline never sees provider-specific request formats.
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`Provider`] - A resolved provider + model, able to build a client
//! - [`ProviderRegistry`] - Resolves `[models.*]` names from `docqa.toml`
//!
//! # Example
//!
//! ```ignore
//! use docqa::llm::ProviderRegistry;
//!
//! let registry = ProviderRegistry::from_config(&config);
//! let client = registry.create_client_for_model(Some("default"))?;
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// JSON-over-HTTP helper shared by the provider clients.
pub mod http;
pub mod ollama;
pub mod openai;
/// Registry for resolving named models to clients.
pub mod provider_registry;

pub use client::{GenerationOptions, LLMClient, Provider};
pub use provider_registry::ProviderRegistry;

//! Configuration utilities.

/// `docqa.toml` parsing and validation.
pub mod toml_config;

pub use toml_config::{ConfigError, DocqaConfig};

//! Provider Registry for resolving named models
//!
//! Questions can name any model declared in `[models.*]`; the registry
//! resolves the model -> provider chain and builds the matching client.

use crate::llm::client::{LLMClient, Provider};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{DocqaConfig, ModelConfig, ProviderConfig};
use std::collections::HashMap;

/// Registry of the configured providers and models
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
    models: HashMap<String, ModelConfig>,
    default_model: String,
}

impl ProviderRegistry {
    /// Create a provider registry from TOML configuration
    pub fn from_config(config: &DocqaConfig) -> Self {
        Self {
            providers: config.providers.clone(),
            models: config.models.clone(),
            default_model: config.rag.default_model.clone(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Get all model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a model exists in the registry
    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Resolve a model name (or the default when `None`) to a provider.
    pub fn resolve(&self, model_name: Option<&str>) -> Result<Provider> {
        let model_name = model_name.unwrap_or(&self.default_model);

        let model_config = self.models.get(model_name).ok_or_else(|| {
            AppError::Config(format!(
                "Model '{}' not found in configuration (available: {})",
                model_name,
                self.model_names().join(", ")
            ))
        })?;

        let provider_config = self.providers.get(&model_config.provider).ok_or_else(|| {
            AppError::Config(format!(
                "Provider '{}' referenced by model '{}' not found",
                model_config.provider, model_name
            ))
        })?;

        Provider::from_model_config(model_config, provider_config)
    }

    /// Create an LLM client for a model by name, or the default model
    pub fn create_client_for_model(&self, model_name: Option<&str>) -> Result<Box<dyn LLMClient>> {
        self.resolve(model_name)?.create_client()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        let config: DocqaConfig = r#"
[providers.local]
type = "ollama"

[models.default]
provider = "local"
model = "llama3.2"

[models.big]
provider = "local"
model = "llama3.1:70b"
temperature = 0.2
"#
        .parse()
        .unwrap();
        ProviderRegistry::from_config(&config)
    }

    #[test]
    fn test_resolves_default_and_named_models() {
        let registry = registry();
        assert_eq!(registry.resolve(None).unwrap().model(), "llama3.2");
        assert_eq!(registry.resolve(Some("big")).unwrap().model(), "llama3.1:70b");
        assert_eq!(registry.model_names(), vec!["big", "default"]);
    }

    #[test]
    fn test_unknown_model_lists_available() {
        let err = registry().resolve(Some("gpt-5")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gpt-5"));
        assert!(message.contains("big, default"));
    }

    #[test]
    fn test_creates_client() {
        let client = registry().create_client_for_model(Some("big")).unwrap();
        assert_eq!(client.model_name(), "llama3.1:70b");
    }
}

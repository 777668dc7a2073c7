//! TOML-based configuration for docqa
//!
//! Providers, models, the embedding service, storage locations and retrieval
//! parameters are declared in a TOML file (`docqa.toml`). Secrets are never
//! stored in the file; providers name the environment variable that holds
//! their API key.

use docqa_vector::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::AppError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "docqa.toml";

/// Root configuration structure loaded from docqa.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocqaConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub rag: RagConfig,
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the PDF files that can be selected
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,

    /// Directory holding plain-text files (populated by an external sync job)
    #[serde(default = "default_text_dir")]
    pub text_dir: PathBuf,

    /// Where the merged text of `text_dir` is written
    #[serde(default = "default_merged_text_file")]
    pub merged_text_file: PathBuf,

    /// Root directory for saved indexes, one subdirectory per document set
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("./pdf_data")
}

fn default_text_dir() -> PathBuf {
    PathBuf::from("./texts")
}

fn default_merged_text_file() -> PathBuf {
    PathBuf::from("./main/main.txt")
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./storage")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            text_dir: default_text_dir(),
            merged_text_file: default_merged_text_file(),
            storage_dir: default_storage_dir(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl ProviderConfig {
    pub fn timeout_secs(&self) -> u64 {
        match self {
            ProviderConfig::Ollama { timeout_secs, .. }
            | ProviderConfig::OpenAI { timeout_secs, .. } => *timeout_secs,
        }
    }
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Upper bound on generated tokens; provider default when unset
    pub max_tokens: Option<u32>,
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Reference to a provider name defined in [providers]
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Length of every vector the model returns
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retries for transient failures (rate limits, 5xx, network)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// In-memory LRU cache size; 0 disables caching
    #[serde(default = "default_cache_entries")]
    pub cache_entries: usize,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    64
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_entries() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            cache_entries: default_cache_entries(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub metric: DistanceMetric,

    /// Model used when a question does not name one
    #[serde(default = "default_model_name")]
    pub default_model: String,

    #[serde(default)]
    pub show_sources: bool,

    #[serde(default = "default_source_snippet_chars")]
    pub source_snippet_chars: usize,

    /// Previous turns rendered into the prompt; 0 keeps every question independent
    #[serde(default)]
    pub history_turns: usize,

    /// Overrides the built-in QA prompt; must contain `{context}` and `{question}`
    pub prompt_template: Option<String>,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    2
}

fn default_model_name() -> String {
    "default".to_string()
}

fn default_source_snippet_chars() -> usize {
    1000
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            metric: DistanceMetric::default(),
            default_model: default_model_name(),
            show_sources: false,
            source_snippet_chars: default_source_snippet_chars(),
            history_turns: 0,
            prompt_template: None,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by {1} does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by {1} does not exist")]
    MissingModel(String, String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl std::str::FromStr for DocqaConfig {
    type Err = ConfigError;

    /// Parse without validation.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(content)?)
    }
}

impl DocqaConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: DocqaConfig = content.parse()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Model -> provider references
        for (model_name, model_config) in &self.models {
            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    format!("model '{}'", model_name),
                ));
            }
        }

        if !self.providers.contains_key(&self.embedding.provider) {
            return Err(ConfigError::MissingProvider(
                self.embedding.provider.clone(),
                "[embedding]".to_string(),
            ));
        }

        if !self.models.contains_key(&self.rag.default_model) {
            return Err(ConfigError::MissingModel(
                self.rag.default_model.clone(),
                "rag.default_model".to_string(),
            ));
        }

        // Only providers something actually uses need their key present
        for name in self.referenced_providers() {
            if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.providers.get(name) {
                self.validate_env_var(api_key_env)?;
            }
        }

        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }

        if let Some(template) = &self.rag.prompt_template {
            for placeholder in ["{context}", "{question}"] {
                if !template.contains(placeholder) {
                    return Err(ConfigError::ValidationError(format!(
                        "rag.prompt_template is missing the {} placeholder",
                        placeholder
                    )));
                }
            }
        }

        Ok(())
    }

    fn referenced_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.values().map(|m| m.provider.as_str()).collect();
        names.push(self.embedding.provider.as_str());
        names.sort_unstable();
        names.dedup();
        names
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get model by name
    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    /// Model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama_config() -> &'static str {
        r#"
[providers.local]
type = "ollama"

[models.default]
provider = "local"
model = "llama3.2"

[embedding]
provider = "local"
model = "nomic-embed-text"
dimensions = 768
"#
    }

    #[test]
    fn test_parse_with_defaults() {
        let config: DocqaConfig = ollama_config().parse().unwrap();
        config.validate().unwrap();

        assert_eq!(config.storage.pdf_dir, PathBuf::from("./pdf_data"));
        assert_eq!(config.storage.merged_text_file, PathBuf::from("./main/main.txt"));
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.top_k, 2);
        assert_eq!(config.rag.metric, DistanceMetric::SquaredEuclidean);
        assert_eq!(config.rag.history_turns, 0);
        assert_eq!(config.rag.source_snippet_chars, 1000);
        assert_eq!(config.embedding.max_retries, 2);
        assert_eq!(config.models["default"].temperature, 0.0);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        match &config.providers["local"] {
            ProviderConfig::Ollama {
                base_url,
                timeout_secs,
            } => {
                assert_eq!(base_url, "http://localhost:11434");
                assert_eq!(*timeout_secs, 60);
            }
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_validation_missing_provider() {
        let content = r#"
[providers.local]
type = "ollama"
[models.default]
provider = "nonexistent"
model = "x"
[embedding]
provider = "local"
"#;
        let config: DocqaConfig = content.parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProvider(_, _))
        ));
    }

    #[test]
    fn test_validation_missing_default_model() {
        let content = r#"
[providers.local]
type = "ollama"
[models.fast]
provider = "local"
model = "x"
[embedding]
provider = "local"
"#;
        let config: DocqaConfig = content.parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingModel(_, _))
        ));
    }

    #[test]
    fn test_validation_overlap_not_smaller_than_size() {
        let mut config: DocqaConfig = ollama_config().parse().unwrap();
        config.rag.chunk_size = 100;
        config.rag.chunk_overlap = 100;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_prompt_template_placeholders() {
        let mut config: DocqaConfig = ollama_config().parse().unwrap();
        config.rag.prompt_template = Some("Answer: {question}".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("{context}")
        ));
    }

    #[test]
    fn test_validation_missing_env_var() {
        let content = r#"
[providers.openai]
type = "openai"
api_key_env = "DOCQA_TEST_KEY_THAT_IS_NEVER_SET"
[models.default]
provider = "openai"
model = "gpt-4o-mini"
"#;
        let config: DocqaConfig = content.parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(name)) if name == "DOCQA_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_unreferenced_provider_key_not_required() {
        let content = format!(
            "{}\n[providers.unused]\ntype = \"openai\"\napi_key_env = \"DOCQA_UNUSED_KEY\"\n",
            ollama_config()
        );
        let config: DocqaConfig = content.parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = DocqaConfig::load("/definitely/not/here/docqa.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_metric_and_log_format_parse() {
        let content = format!(
            "{}\n[rag]\nmetric = \"cosine\"\n[logging]\nformat = \"json\"\n",
            ollama_config()
        );
        let config: DocqaConfig = content.parse().unwrap();
        assert_eq!(config.rag.metric, DistanceMetric::Cosine);
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}

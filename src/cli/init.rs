//! Init command implementation
//!
//! Scaffolds a docqa project: `docqa.toml`, `.env.example` and the data
//! directories the default configuration points at.

use super::output::Output;
use crate::utils::toml_config::DEFAULT_CONFIG_FILE;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (docqa.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (ollama or openai)
    pub provider: String,
}

/// Directories created under the project root.
pub const DIRECTORIES: [&str; 4] = ["pdf_data", "texts", "main", "storage"];

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing docqa project");

    if config.provider != "ollama" && config.provider != "openai" {
        let message = format!(
            "Unknown provider '{}' (expected 'ollama' or 'openai')",
            config.provider
        );
        output.error(&message);
        return InitResult::Error(message);
    }

    let base_path = &config.path;
    let config_path = base_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", DEFAULT_CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    for dir in DIRECTORIES {
        let dir_path = base_path.join(dir);
        if dir_path.exists() {
            output.skipped(dir, "already exists");
            continue;
        }
        if let Err(e) = fs::create_dir_all(&dir_path) {
            output.error(&format!("Failed to create {}: {}", dir, e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir(dir);
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_docqa_toml(&config.provider), config.force) {
        output.error(&format!("Failed to create {}: {}", DEFAULT_CONFIG_FILE, e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", DEFAULT_CONFIG_FILE);

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        match write_file(&gitignore_path, generate_gitignore(), false) {
            Ok(()) => output.created("file", ".gitignore"),
            Err(e) => output.warning(&format!("Failed to create .gitignore: {}", e)),
        }
    }

    output.complete("docqa project initialized successfully!");

    output.header("Next Steps");
    output.newline();
    if config.provider == "openai" {
        output.info("1. Set your API key:");
        output.command("cp .env.example .env");
        output.command("# Edit .env and set OPENAI_API_KEY");
    } else {
        output.info("1. Start Ollama and pull the models:");
        output.command("ollama serve");
        output.command("ollama pull llama3.2:3b");
        output.command("ollama pull nomic-embed-text");
    }
    output.newline();
    output.info("2. Add documents:");
    output.command("cp manual.pdf pdf_data/");
    output.newline();
    output.info("3. Ask a question:");
    output.command("docqa ask --file manual.pdf \"How much cargo space does the van have?\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

/// Contents of a fresh `docqa.toml` for `provider`.
pub fn generate_docqa_toml(provider: &str) -> String {
    let providers = if provider == "openai" {
        r#"# OpenAI API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
timeout_secs = 60

[models.default]
provider = "openai"
model = "gpt-3.5-turbo"
temperature = 0.0

[models.gpt-4]
provider = "openai"
model = "gpt-4"
temperature = 0.0

[embedding]
provider = "openai"
model = "text-embedding-ada-002"
dimensions = 1536
batch_size = 64
max_retries = 2
cache_entries = 1024
"#
    } else {
        r#"# Ollama - local inference (no API key required)
[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
timeout_secs = 120

[models.default]
provider = "ollama-local"
model = "llama3.2:3b"
temperature = 0.0

[embedding]
provider = "ollama-local"
model = "nomic-embed-text"
dimensions = 768
batch_size = 32
max_retries = 2
cache_entries = 1024
"#
    };

    format!(
        r#"# docqa configuration
# Paths are relative to the directory docqa is run from.

[storage]
pdf_dir = "./pdf_data"
text_dir = "./texts"
merged_text_file = "./main/main.txt"
storage_dir = "./storage"

[logging]
# Overridden by RUST_LOG
level = "warn"
format = "pretty"

{providers}
[rag]
chunk_size = 1000
chunk_overlap = 200
top_k = 2
metric = "squared_euclidean"
default_model = "default"
show_sources = false
source_snippet_chars = 1000
# Previous chat turns shown to the model; 0 answers every question on its own
history_turns = 0
# prompt_template = """
# Context:
# {{context}}
# Question: {{question}}
# """
"#
    )
}

fn generate_env_example() -> &'static str {
    r#"# docqa environment
OPENAI_API_KEY=sk-...

# Log filter, overrides [logging].level
# RUST_LOG=docqa=debug
"#
}

fn generate_gitignore() -> &'static str {
    r#".env
/storage/
/main/
/target/
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::DocqaConfig;
    use tempfile::TempDir;

    fn init(dir: &Path, force: bool, provider: &str) -> InitResult {
        run(
            InitConfig {
                path: dir.to_path_buf(),
                force,
                provider: provider.to_string(),
            },
            &Output::no_color(),
        )
    }

    #[test]
    fn test_generated_ollama_config_is_valid() {
        let config: DocqaConfig = generate_docqa_toml("ollama").parse().unwrap();
        config.validate().unwrap();
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.rag.top_k, 2);
    }

    #[test]
    fn test_generated_openai_config_parses() {
        let config: DocqaConfig = generate_docqa_toml("openai").parse().unwrap();
        assert_eq!(config.model_names(), vec!["default", "gpt-4"]);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert!(config.rag.prompt_template.is_none());
    }

    #[test]
    fn test_init_creates_project() {
        let dir = TempDir::new().unwrap();
        assert_eq!(init(dir.path(), false, "ollama"), InitResult::Success);

        assert!(dir.path().join(DEFAULT_CONFIG_FILE).is_file());
        assert!(dir.path().join(".env.example").is_file());
        assert!(dir.path().join(".gitignore").is_file());
        for d in DIRECTORIES {
            assert!(dir.path().join(d).is_dir(), "{} missing", d);
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "# mine").unwrap();

        assert_eq!(init(dir.path(), false, "ollama"), InitResult::AlreadyExists);
        assert_eq!(
            fs::read_to_string(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap(),
            "# mine"
        );

        assert_eq!(init(dir.path(), true, "ollama"), InitResult::Success);
        assert_ne!(
            fs::read_to_string(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap(),
            "# mine"
        );
    }

    #[test]
    fn test_init_rejects_unknown_provider() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(init(dir.path(), false, "bedrock"), InitResult::Error(_)));
        assert!(!dir.path().join(DEFAULT_CONFIG_FILE).exists());
    }
}

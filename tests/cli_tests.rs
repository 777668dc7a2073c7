//! CLI Integration Tests for docqa
//!
//! Runs the built `docqa` binary. The end-to-end test points an Ollama
//! provider at a wiremock server, so no model service is needed.

use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run docqa with colors off in `dir`
fn run_docqa(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docqa"))
        .arg("--no-color")
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute docqa")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run_docqa(&["--help"], dir.path());

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("docqa"));
    for command in ["init", "index", "ask", "chat", "inspect", "files"] {
        assert!(out.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = run_docqa(&["--version"], dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_ask_requires_a_target() {
    let dir = TempDir::new().unwrap();
    let output = run_docqa(&["ask", "What?"], dir.path());

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--file"));
}

// =============================================================================
// Init Command Tests
// =============================================================================

#[test]
fn test_init_scaffolds_project() {
    let dir = TempDir::new().unwrap();
    let output = run_docqa(&["init"], dir.path());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("docqa.toml").is_file());
    assert!(dir.path().join(".env.example").is_file());
    assert!(dir.path().join("pdf_data").is_dir());
    assert!(dir.path().join("storage").is_dir());

    let again = run_docqa(&["init"], dir.path());
    assert!(again.status.success());
    assert!(stdout(&again).contains("already exists"));
}

#[test]
fn test_files_after_init() {
    let dir = TempDir::new().unwrap();
    run_docqa(&["init"], dir.path());
    fs::write(dir.path().join("pdf_data").join("manual.pdf"), b"%PDF-1.4").unwrap();

    let output = run_docqa(&["files"], dir.path());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("manual.pdf"));
}

// =============================================================================
// Error Reporting
// =============================================================================

#[test]
fn test_missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = run_docqa(&["files"], dir.path());

    assert!(!output.status.success());
    assert!(stderr(&output).contains("docqa.toml"));
}

#[test]
fn test_inspect_missing_store() {
    let dir = TempDir::new().unwrap();
    run_docqa(&["init"], dir.path());

    let output = run_docqa(&["inspect", "--store", "storage/nothing-here"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

// =============================================================================
// End to end
// =============================================================================

fn write_config(dir: &Path, server_uri: &str) {
    let config = format!(
        r#"
[storage]
pdf_dir = "./pdf_data"
text_dir = "./texts"
merged_text_file = "./main/main.txt"
storage_dir = "./storage"

[providers.local]
type = "ollama"
base_url = "{server_uri}"
timeout_secs = 10

[models.default]
provider = "local"
model = "test-chat"

[embedding]
provider = "local"
model = "test-embed"
dimensions = 3
max_retries = 0
cache_entries = 0
"#
    );
    fs::write(dir.join("docqa.toml"), config).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_builds_index_and_cites_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0, 0.0]]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "It has 3.2 cubic meters."}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_config(dir.path(), &server.uri());
    fs::create_dir(dir.path().join("pdf_data")).unwrap();
    fs::write(
        dir.path().join("pdf_data").join("manual.txt"),
        "The van has 3.2 cubic meters of cargo space.",
    )
    .unwrap();

    let root = dir.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        run_docqa(
            &[
                "ask",
                "--file",
                "manual.txt",
                "--sources",
                "How much cargo space does the van have?",
            ],
            &root,
        )
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("It has 3.2 cubic meters."));
    assert!(out.contains("> Source (Doc id: manual.txt#0): The van has 3.2 cubic meters"));
    assert!(dir
        .path()
        .join("storage")
        .join("manual.txt")
        .join("manifest.json")
        .is_file());

    let root = dir.path().to_path_buf();
    let inspect = tokio::task::spawn_blocking(move || {
        run_docqa(&["inspect", "--store", "storage/manual.txt"], &root)
    })
    .await
    .unwrap();
    assert!(inspect.status.success(), "stderr: {}", stderr(&inspect));
    assert!(stdout(&inspect).contains("test-embed"));
}

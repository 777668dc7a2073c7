//! Command handlers.
//!
//! Each handler loads what it needs from the configuration, calls into the
//! pipeline and reports through [`Output`]. Errors bubble up as `anyhow`
//! errors carrying a user-facing message.

use super::output::Output;
use super::{QueryArgs, TargetArgs};
use crate::llm::ProviderRegistry;
use crate::rag::loader::{self, TEXT_EXTENSIONS};
use crate::rag::pipeline::{DocumentSelection, IngestReport, OpenOutcome, RagPipeline};
use crate::rag::store::KnowledgeBase;
use crate::rag::create_embedder;
use crate::session::{ChatSession, DEFAULT_HISTORY_WINDOW};
use crate::types::{AppError, Answer, IndexLoadError, IndexLoadKind};
use crate::utils::toml_config::DocqaConfig;
use anyhow::{anyhow, bail, Context};
use docqa_vector::persistence::{read_manifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};

/// Store subdirectory for the merged text directory.
pub const TEXT_DIR_STORE: &str = "_texts";

/// A user-facing message for a pipeline error.
pub fn describe_error(err: &AppError) -> String {
    let mut message = err.to_string();
    match err.root_cause() {
        AppError::IndexLoad(IndexLoadError {
            kind: IndexLoadKind::Corrupt,
            ..
        }) => message.push_str("\nRebuild it with `docqa index`."),
        _ if err.is_transient() => {
            message.push_str("\nThe service is temporarily unavailable, please try again.")
        }
        _ => {}
    }
    message
}

/// Resolve `--file NAME` against the PDF directory.
///
/// A name that already points at an existing file is used as given.
pub fn resolve_file(config: &DocqaConfig, name: &str) -> PathBuf {
    let given = Path::new(name);
    if given.is_file() {
        given.to_path_buf()
    } else {
        config.storage.pdf_dir.join(name)
    }
}

/// Store directory for a single document: `storage_dir/<file name>`.
pub fn store_dir_for_file(config: &DocqaConfig, path: &Path) -> anyhow::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("'{}' has no file name", path.display()))?;
    Ok(config.storage.storage_dir.join(name))
}

/// The document selection and store directory a question targets.
pub fn resolve_target(
    config: &DocqaConfig,
    target: &TargetArgs,
) -> anyhow::Result<(DocumentSelection, PathBuf)> {
    if target.text_dir {
        return Ok((
            text_dir_selection(config),
            config.storage.storage_dir.join(TEXT_DIR_STORE),
        ));
    }
    match &target.file {
        Some(name) => {
            let path = resolve_file(config, name);
            let store = store_dir_for_file(config, &path)?;
            Ok((DocumentSelection::Files(vec![path]), store))
        }
        None => bail!("Choose a document with --file NAME or --text-dir"),
    }
}

/// The document selection and store directory for `docqa index`.
pub fn resolve_index_target(
    config: &DocqaConfig,
    files: &[PathBuf],
    text_dir: bool,
    store: Option<PathBuf>,
) -> anyhow::Result<(DocumentSelection, PathBuf)> {
    if text_dir {
        let store = store.unwrap_or_else(|| config.storage.storage_dir.join(TEXT_DIR_STORE));
        return Ok((text_dir_selection(config), store));
    }
    let store = match (store, files) {
        (Some(store), _) => store,
        (None, [single]) => store_dir_for_file(config, single)?,
        (None, []) => bail!("Nothing to index: pass files or --text-dir"),
        (None, _) => bail!("Indexing several files needs --store DIR"),
    };
    Ok((DocumentSelection::Files(files.to_vec()), store))
}

fn text_dir_selection(config: &DocqaConfig) -> DocumentSelection {
    DocumentSelection::TextDir {
        text_dir: config.storage.text_dir.clone(),
        merged_file: config.storage.merged_text_file.clone(),
    }
}

fn pipeline(config: &DocqaConfig) -> anyhow::Result<RagPipeline> {
    let embedder = create_embedder(config).map_err(|e| anyhow!(describe_error(&e)))?;
    RagPipeline::from_config(config, embedder).map_err(|e| anyhow!(describe_error(&e)))
}

fn report_ingest(output: &Output, report: &IngestReport) {
    for (document, chunks) in &report.indexed {
        output.success(&format!("{} ({} chunks)", document, chunks));
    }
    for (document, reason) in &report.skipped {
        output.skipped(document, reason);
    }
}

fn print_answer(output: &Output, config: &DocqaConfig, answer: &Answer, show_sources: bool) {
    output.answer(&answer.text);
    if show_sources {
        let blocks: Vec<String> = answer
            .sources
            .iter()
            .map(|s| s.formatted(config.rag.source_snippet_chars))
            .collect();
        output.sources(&blocks);
    }
}

async fn open(
    config: &DocqaConfig,
    output: &Output,
    pipeline: &RagPipeline,
    target: &TargetArgs,
) -> anyhow::Result<KnowledgeBase> {
    let (selection, store) = resolve_target(config, target)?;
    let (kb, outcome) = pipeline
        .open_or_build(&store, &selection)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;

    if let OpenOutcome::Built(report) = outcome {
        output.info(&format!("Built a new index in {}", store.display()));
        report_ingest(output, &report);
    }
    Ok(kb)
}

/// `docqa index`
pub async fn index(
    config: &DocqaConfig,
    output: &Output,
    files: &[PathBuf],
    text_dir: bool,
    store: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (selection, store) = resolve_index_target(config, files, text_dir, store)?;
    let pipeline = pipeline(config)?;

    output.header("Indexing");
    let (kb, report) = pipeline
        .ingest(&selection)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;
    kb.save(&store)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;

    report_ingest(output, &report);
    output.complete(&format!(
        "Saved {} chunks to {}",
        report.chunk_count(),
        store.display()
    ));
    Ok(())
}

/// `docqa ask`
pub async fn ask(
    config: &DocqaConfig,
    output: &Output,
    question: &str,
    target: &TargetArgs,
    query: &QueryArgs,
) -> anyhow::Result<()> {
    let pipeline = pipeline(config)?;
    let registry = ProviderRegistry::from_config(config);
    let llm = registry
        .create_client_for_model(query.model.as_deref())
        .map_err(|e| anyhow!(describe_error(&e)))?;
    let kb = open(config, output, &pipeline, target).await?;

    let k = query.top_k.unwrap_or(config.rag.top_k);
    let answer = pipeline
        .answer(&kb, llm.as_ref(), question, k)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;

    print_answer(output, config, &answer, query.sources || config.rag.show_sources);
    Ok(())
}

/// `docqa chat`
pub async fn chat(
    config: &DocqaConfig,
    output: &Output,
    target: &TargetArgs,
    query: &QueryArgs,
) -> anyhow::Result<()> {
    let pipeline = pipeline(config)?;
    let registry = ProviderRegistry::from_config(config);
    let llm = registry
        .create_client_for_model(query.model.as_deref())
        .map_err(|e| anyhow!(describe_error(&e)))?;
    let kb = open(config, output, &pipeline, target).await?;

    let k = query.top_k.unwrap_or(config.rag.top_k);
    let show_sources = query.sources || config.rag.show_sources;
    let mut session = ChatSession::new();

    output.info(&format!(
        "{} chunks loaded, model '{}'. Commands: /clear, /history, /quit",
        kb.len(),
        llm.model_name()
    ));

    while let Some(line) = output.read_question().context("Failed to read input")? {
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                output.success("History cleared");
                continue;
            }
            "/history" => {
                if session.is_empty() {
                    output.info("No history yet");
                }
                for turn in session.recent(DEFAULT_HISTORY_WINDOW) {
                    output.kv("Q", &turn.question);
                    output.kv("A", &turn.answer);
                }
                continue;
            }
            _ => {}
        }

        match pipeline
            .answer_in_session(&kb, llm.as_ref(), &mut session, question, k)
            .await
        {
            Ok(answer) => print_answer(output, config, &answer, show_sources),
            Err(e) => output.error(&describe_error(&e)),
        }
        output.newline();
    }
    Ok(())
}

/// `docqa inspect`
pub async fn inspect(output: &Output, store: &Path) -> anyhow::Result<()> {
    let kb = KnowledgeBase::load(store)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;
    let meta = kb.metadata();

    output.header(&format!("Index {}", store.display()));
    if let Ok(manifest) = read_manifest(store).await {
        output.kv("generation", &manifest.generation.to_string());
        output.kv("committed", &manifest.committed_at.to_rfc3339());
    }
    output.kv("embedding model", &meta.embedding_model);
    output.kv("dimensions", &meta.dimensions.to_string());
    output.kv("metric", &meta.metric.to_string());
    output.kv("chunks", &meta.count.to_string());

    output.subheader("Documents");
    for (id, entry) in kb.docstore().documents() {
        output.list_item(&format!("{} [{}] {} chunks", id, entry.medium, entry.chunk_count));
    }
    Ok(())
}

/// `docqa files`
pub async fn files(config: &DocqaConfig, output: &Output) -> anyhow::Result<()> {
    let storage = &config.storage;

    output.header(&format!("PDF files in {}", storage.pdf_dir.display()));
    let pdfs = loader::list_files(&storage.pdf_dir, &["pdf"])
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;
    if pdfs.is_empty() {
        output.info("none");
    }
    for path in &pdfs {
        let indexed = store_dir_for_file(config, path)?.join(MANIFEST_FILE).is_file();
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if indexed {
            output.list_item(&format!("{} (indexed)", name));
        } else {
            output.list_item(&name);
        }
    }

    output.header(&format!("Text files in {}", storage.text_dir.display()));
    let texts = loader::list_files(&storage.text_dir, TEXT_EXTENSIONS)
        .await
        .map_err(|e| anyhow!(describe_error(&e)))?;
    if texts.is_empty() {
        output.info("none");
    }
    for path in &texts {
        output.list_item(&path.display().to_string());
    }
    if storage
        .storage_dir
        .join(TEXT_DIR_STORE)
        .join(MANIFEST_FILE)
        .is_file()
    {
        output.hint("The text directory has a saved index; `docqa index --text-dir` rebuilds it");
    }
    Ok(())
}

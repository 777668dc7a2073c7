//! Document loading.
//!
//! PDFs are converted to text with `pdf-extract` on a blocking thread; plain
//! text files are read as UTF-8. A directory of `.txt` files can be merged
//! into a single document, which is how externally synced text folders are
//! indexed.

use crate::types::{AppError, Document, Result, SourceMedium};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// File extensions read as plain text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "text"];

fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Load a document, choosing the reader from the file extension.
pub async fn load_document(path: &Path) -> Result<Document> {
    match extension(path).as_deref() {
        Some("pdf") => load_pdf(path).await,
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => load_text(path).await,
        _ => Err(AppError::ingestion(
            document_id(path),
            "unsupported file type (expected .pdf or .txt)",
        )),
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_pdf(path: &Path) -> Result<Document> {
    let id = document_id(path);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::ingestion(&id, format!("failed to read file: {}", e)))?;

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AppError::ingestion(&id, format!("PDF extraction aborted: {}", e)))?
        .map_err(|e| AppError::ingestion(&id, format!("PDF extraction error: {}", e)))?;

    if text.trim().is_empty() {
        return Err(AppError::ingestion(
            &id,
            "PDF contains no extractable text (image-based or encrypted?)",
        ));
    }

    debug!(chars = text.chars().count(), "Extracted PDF text");
    Ok(Document::new(id, text, SourceMedium::Pdf))
}

#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_text(path: &Path) -> Result<Document> {
    let id = document_id(path);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::ingestion(&id, format!("failed to read file: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::ingestion(&id, "file is not valid UTF-8 text"))?;

    Ok(Document::new(id, text, SourceMedium::PlainText))
}

/// `*.txt` files directly inside `dir`, sorted by file name.
pub async fn text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, &["txt"]).await
}

/// Files in `dir` whose extension is in `extensions`, sorted by file name.
///
/// A missing directory yields an empty list.
pub async fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::Storage(format!(
                "Failed to list {}: {}",
                dir.display(),
                e
            )))
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to list {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let wanted = extension(&path)
            .map(|ext| extensions.contains(&ext.as_str()))
            .unwrap_or(false);
        if is_file && wanted {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// The merged text directory plus the files that could not be read.
#[derive(Debug)]
pub struct MergedText {
    pub document: Document,
    /// `(file name, reason)` for each skipped file.
    pub skipped: Vec<(String, String)>,
}

/// Merge every `.txt` file in `text_dir` into one document and write the
/// result to `merged_file`.
///
/// Each non-empty file is terminated with a newline if it lacks one. The
/// merged file itself is skipped when it lives inside `text_dir`, and so is
/// any file that cannot be read as UTF-8 text. A directory with no readable
/// `.txt` file is an ingestion error.
#[instrument(skip_all, fields(text_dir = %text_dir.display()))]
pub async fn merge_text_dir(text_dir: &Path, merged_file: &Path) -> Result<MergedText> {
    let merged_id = document_id(merged_file);
    let merged_canonical = tokio::fs::canonicalize(merged_file).await.ok();

    let mut sources = Vec::new();
    for path in text_files(text_dir).await? {
        let canonical = tokio::fs::canonicalize(&path).await.ok();
        if canonical.is_some() && canonical == merged_canonical {
            continue;
        }
        sources.push(path);
    }

    if sources.is_empty() {
        return Err(AppError::ingestion(
            text_dir.display().to_string(),
            "no .txt files found",
        ));
    }

    let mut merged = String::new();
    let mut read = 0;
    let mut skipped = Vec::new();
    for path in &sources {
        let document = match load_text(path).await {
            Ok(document) => document,
            Err(AppError::Ingestion { document, reason }) => {
                warn!(document = %document, reason = %reason, "Skipping text file");
                skipped.push((document, reason));
                continue;
            }
            Err(e) => return Err(e),
        };
        read += 1;
        merged.push_str(&document.text);
        if !document.text.is_empty() && !document.text.ends_with('\n') {
            merged.push('\n');
        }
    }

    if read == 0 {
        return Err(AppError::ingestion(
            text_dir.display().to_string(),
            format!("none of the {} .txt files could be read", sources.len()),
        ));
    }

    if let Some(parent) = merged_file.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }
    tokio::fs::write(merged_file, &merged).await.map_err(|e| {
        AppError::Storage(format!("Failed to write {}: {}", merged_file.display(), e))
    })?;

    info!(files = read, skipped = skipped.len(), bytes = merged.len(), "Merged text directory");
    Ok(MergedText {
        document: Document::new(merged_id, merged, SourceMedium::PlainText),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_merge_sorts_and_terminates_lines() {
        let dir = TempDir::new().unwrap();
        let texts = dir.path().join("texts");
        tokio::fs::create_dir_all(&texts).await.unwrap();
        tokio::fs::write(texts.join("b.txt"), "second").await.unwrap();
        tokio::fs::write(texts.join("a.txt"), "first\n").await.unwrap();
        tokio::fs::write(texts.join("c.txt"), "").await.unwrap();
        tokio::fs::write(texts.join("notes.md"), "ignored").await.unwrap();

        let merged_path = dir.path().join("main").join("main.txt");
        let merged = merge_text_dir(&texts, &merged_path).await.unwrap();
        let document = merged.document;

        assert!(merged.skipped.is_empty());
        assert_eq!(document.text, "first\nsecond\n");
        assert_eq!(document.id, "main.txt");
        assert_eq!(
            tokio::fs::read_to_string(&merged_path).await.unwrap(),
            "first\nsecond\n"
        );
    }

    #[tokio::test]
    async fn test_merge_excludes_merged_file_in_same_dir() {
        let dir = TempDir::new().unwrap();
        let merged_path = dir.path().join("all.txt");
        tokio::fs::write(dir.path().join("one.txt"), "one").await.unwrap();
        tokio::fs::write(&merged_path, "stale merged content\n").await.unwrap();

        let merged = merge_text_dir(dir.path(), &merged_path).await.unwrap();
        assert_eq!(merged.document.text, "one\n");
    }

    #[tokio::test]
    async fn test_merge_skips_non_utf8_files() {
        let dir = TempDir::new().unwrap();
        let texts = dir.path().join("texts");
        tokio::fs::create_dir_all(&texts).await.unwrap();
        tokio::fs::write(texts.join("good.txt"), "readable").await.unwrap();
        tokio::fs::write(texts.join("latin1.txt"), [0xff, 0xfe, 0x41]).await.unwrap();

        let merged = merge_text_dir(&texts, &dir.path().join("main.txt")).await.unwrap();

        assert_eq!(merged.document.text, "readable\n");
        assert_eq!(merged.skipped.len(), 1);
        assert_eq!(merged.skipped[0].0, "latin1.txt");
    }

    #[tokio::test]
    async fn test_merge_with_only_unreadable_files_fails() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("latin1.txt"), [0xff, 0xfe, 0x41]).await.unwrap();
        let merged_path = dir.path().join("out").join("main.txt");

        let err = merge_text_dir(dir.path(), &merged_path).await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion { .. }));
        assert!(!merged_path.exists());
    }

    #[tokio::test]
    async fn test_merge_without_txt_files_fails() {
        let dir = TempDir::new().unwrap();
        let err = merge_text_dir(dir.path(), &dir.path().join("out/main.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ingestion { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        tokio::fs::write(&path, [0u8, 1, 2]).await.unwrap();

        let err = load_document(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion { ref document, .. } if document == "image.png"));
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_ingestion_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        tokio::fs::write(&path, b"this is not a pdf").await.unwrap();

        let err = load_document(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion { .. }));
    }

    #[tokio::test]
    async fn test_non_utf8_text_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        tokio::fs::write(&path, [0xff, 0xfe, 0x41]).await.unwrap();

        assert!(matches!(
            load_text(&path).await,
            Err(AppError::Ingestion { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_files_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = list_files(&dir.path().join("nope"), &["pdf"]).await.unwrap();
        assert!(files.is_empty());
    }
}

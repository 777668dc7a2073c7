//! The question-answering pipeline.
//!
//! Indexing: load documents, chunk them, embed every chunk and build a
//! [`KnowledgeBase`]. Answering: embed the question, retrieve the top-k
//! chunks, fill the prompt template and ask the language model.
//!
//! ```ignore
//! let pipeline = RagPipeline::from_config(&config, embedder)?;
//! let (kb, outcome) = pipeline.open_or_build(&store_dir, &selection).await?;
//! let answer = pipeline.answer(&kb, llm.as_ref(), "How much cargo space?", 2).await?;
//! ```

use crate::llm::LLMClient;
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::Embedder;
use crate::rag::loader;
use crate::rag::prompt::{join_context, PromptTemplate};
use crate::rag::store::{EmbeddedChunk, KnowledgeBase};
use crate::session::ChatSession;
use crate::types::{AppError, Answer, Document, Result, Source};
use crate::utils::toml_config::DocqaConfig;
use docqa_vector::DistanceMetric;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which documents make up a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSelection {
    /// Individual PDF or text files.
    Files(Vec<PathBuf>),
    /// Every `.txt` file in `text_dir`, merged into `merged_file`.
    TextDir {
        text_dir: PathBuf,
        merged_file: PathBuf,
    },
}

/// What happened to each document during indexing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// `(document id, chunk count)` for every indexed document.
    pub indexed: Vec<(String, usize)>,
    /// `(document, reason)` for every document that could not be read.
    pub skipped: Vec<(String, String)>,
}

impl IngestReport {
    pub fn chunk_count(&self) -> usize {
        self.indexed.iter().map(|(_, n)| n).sum()
    }
}

/// How [`RagPipeline::open_or_build`] obtained its knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Loaded,
    Built(IngestReport),
}

pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    metric: DistanceMetric,
    template: PromptTemplate,
    history_turns: usize,
}

impl RagPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, chunker: TextChunker) -> Self {
        Self {
            embedder,
            chunker,
            metric: DistanceMetric::default(),
            template: PromptTemplate::default(),
            history_turns: 0,
        }
    }

    /// Pipeline configured from `[rag]`.
    pub fn from_config(config: &DocqaConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let rag = &config.rag;
        let chunker = TextChunker::new(rag.chunk_size, rag.chunk_overlap)?;
        let mut pipeline = Self::new(embedder, chunker).with_metric(rag.metric);
        if let Some(template) = &rag.prompt_template {
            pipeline = pipeline.with_template(PromptTemplate::new(template.clone())?);
        }
        Ok(pipeline.with_history_turns(rag.history_turns))
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Render the last `turns` turns of the session into each prompt.
    ///
    /// The built-in template is swapped for its history-aware variant; a
    /// custom template needs its own `{history}` placeholder.
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        if turns > 0 && self.template == PromptTemplate::default() {
            self.template = PromptTemplate::with_history();
        } else if turns > 0 && !self.template.has_history_slot() {
            warn!("history_turns is set but the prompt template has no {{history}} placeholder");
        }
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Chunk and embed `documents` into a new knowledge base.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build(&self, documents: &[Document]) -> Result<KnowledgeBase> {
        let mut chunks = Vec::new();
        for document in documents {
            for chunk in self.chunker.chunk(document) {
                chunks.push((chunk, document.medium));
            }
        }

        let texts: Vec<String> = chunks.iter().map(|(c, _)| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AppError::embedding(
                format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
                false,
            ));
        }

        let kb = KnowledgeBase::build(
            self.embedder.dimensions(),
            self.metric,
            self.embedder.model_name(),
            chunks
                .into_iter()
                .zip(vectors)
                .map(|((chunk, medium), vector)| EmbeddedChunk {
                    chunk,
                    medium,
                    vector,
                }),
        )?;

        info!(chunks = kb.len(), "Built knowledge base");
        Ok(kb)
    }

    /// Load the selected documents, skipping unreadable ones.
    ///
    /// Files sharing a name get `~2`, `~3`, ... appended to their id in the
    /// order given. Fails only when documents were requested and none could be read.
    pub async fn load_selection(
        &self,
        selection: &DocumentSelection,
    ) -> Result<(Vec<Document>, IngestReport)> {
        let mut report = IngestReport::default();
        let mut documents = Vec::new();

        match selection {
            DocumentSelection::Files(paths) => {
                let mut first_error = None;
                let mut seen = HashSet::new();
                for path in paths {
                    match loader::load_document(path).await {
                        Ok(mut document) => {
                            let id = unique_id(&mut seen, &document.id);
                            if id != document.id {
                                info!(path = %path.display(), id = %id, "Renamed repeated document name");
                                document.id = id;
                            }
                            documents.push(document);
                        }
                        Err(AppError::Ingestion { document, reason }) => {
                            warn!(document = %document, reason = %reason, "Skipping document");
                            report.skipped.push((document.clone(), reason.clone()));
                            if first_error.is_none() {
                                first_error = Some(AppError::Ingestion { document, reason });
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
                if documents.is_empty() {
                    if let Some(err) = first_error {
                        return Err(err);
                    }
                }
            }
            DocumentSelection::TextDir {
                text_dir,
                merged_file,
            } => {
                let merged = loader::merge_text_dir(text_dir, merged_file).await?;
                report.skipped.extend(merged.skipped);
                documents.push(merged.document);
            }
        }

        Ok((documents, report))
    }

    /// Load, chunk and embed a document selection.
    pub async fn ingest(
        &self,
        selection: &DocumentSelection,
    ) -> Result<(KnowledgeBase, IngestReport)> {
        let (documents, mut report) = self.load_selection(selection).await?;
        let kb = self.build(&documents).await?;

        for document in &documents {
            let count = kb.docstore().chunks_of(&document.id).len();
            report.indexed.push((document.id.clone(), count));
        }
        Ok((kb, report))
    }

    /// Load the knowledge base saved in `dir`, or build and save one when
    /// nothing has been saved there yet. A corrupt store is an error.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn open_or_build(
        &self,
        dir: &Path,
        selection: &DocumentSelection,
    ) -> Result<(KnowledgeBase, OpenOutcome)> {
        match KnowledgeBase::load(dir).await {
            Ok(kb) => {
                self.check_compatible(&kb)?;
                info!(chunks = kb.len(), "Loaded existing knowledge base");
                Ok((kb, OpenOutcome::Loaded))
            }
            Err(e) if e.is_index_not_found() => {
                info!("No saved knowledge base, building");
                let (kb, report) = self.ingest(selection).await?;
                kb.save(dir).await?;
                Ok((kb, OpenOutcome::Built(report)))
            }
            Err(e) => Err(e),
        }
    }

    fn check_compatible(&self, kb: &KnowledgeBase) -> Result<()> {
        let meta = kb.metadata();
        if meta.dimensions != self.embedder.dimensions() {
            return Err(AppError::Config(format!(
                "Saved index was built with '{}' ({} dimensions) but the configured embedder \
                 '{}' produces {} dimensions; re-run `docqa index`",
                meta.embedding_model,
                meta.dimensions,
                self.embedder.model_name(),
                self.embedder.dimensions()
            )));
        }
        if meta.embedding_model != self.embedder.model_name() {
            warn!(
                saved = %meta.embedding_model,
                configured = %self.embedder.model_name(),
                "Saved index was built with a different embedding model"
            );
        }
        Ok(())
    }

    /// Answer a question from the `k` most relevant chunks.
    ///
    /// Any failure past input validation is returned as
    /// [`AppError::AnswerGeneration`]; no partial answer is produced.
    pub async fn answer(
        &self,
        kb: &KnowledgeBase,
        llm: &dyn LLMClient,
        question: &str,
        k: usize,
    ) -> Result<Answer> {
        self.answer_with_history(kb, llm, question, k, "").await
    }

    /// Like [`answer`](Self::answer), rendering recent session turns into the
    /// prompt when history is enabled and recording the new turn.
    pub async fn answer_in_session(
        &self,
        kb: &KnowledgeBase,
        llm: &dyn LLMClient,
        session: &mut ChatSession,
        question: &str,
        k: usize,
    ) -> Result<Answer> {
        let history = session.render_history(self.history_turns);
        let answer = self
            .answer_with_history(kb, llm, question, k, &history)
            .await?;
        session.record(question.trim(), &answer);
        Ok(answer)
    }

    #[instrument(skip_all, fields(k = k, model = %llm.model_name()))]
    async fn answer_with_history(
        &self,
        kb: &KnowledgeBase,
        llm: &dyn LLMClient,
        question: &str,
        k: usize,
        history: &str,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("Question must not be empty".to_string()));
        }

        self.generate(kb, llm, question, k, history)
            .await
            .map_err(|e| AppError::AnswerGeneration(Box::new(e)))
    }

    async fn generate(
        &self,
        kb: &KnowledgeBase,
        llm: &dyn LLMClient,
        question: &str,
        k: usize,
        history: &str,
    ) -> Result<Answer> {
        let query = self.embedder.embed(question).await?;
        let hits = kb.search(&query, k)?;
        debug!(retrieved = hits.len(), "Retrieved chunks");

        let sources: Vec<Source> = hits
            .iter()
            .map(|(chunk, distance)| Source::from_chunk(chunk, *distance))
            .collect();
        let context = join_context(sources.iter().map(|s| s.text.as_str()));
        let prompt = self.template.render(&context, question, history);

        let text = llm.generate(&prompt).await?;
        Ok(Answer { text, sources })
    }
}

/// `id` the first time it is seen, `id~N` with the lowest free `N` after that.
fn unique_id(seen: &mut HashSet<String>, id: &str) -> String {
    if seen.insert(id.to_string()) {
        return id.to_string();
    }
    (2..)
        .map(|n| format!("{}~{}", id, n))
        .find(|candidate| seen.insert(candidate.clone()))
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "unit"
        }
    }

    struct EchoLLM;

    #[async_trait]
    impl LLMClient for EchoLLM {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn pipeline() -> RagPipeline {
        RagPipeline::new(Arc::new(UnitEmbedder), TextChunker::new(100, 0).unwrap())
    }

    #[tokio::test]
    async fn test_blank_question_rejected_unwrapped() {
        let p = pipeline();
        let kb = p.build(&[]).await.unwrap();
        let err = p.answer(&kb, &EchoLLM, "   ", 2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_store_answers_with_empty_context() {
        let p = pipeline();
        let kb = p.build(&[]).await.unwrap();
        let answer = p.answer(&kb, &EchoLLM, "anything?", 3).await.unwrap();

        assert!(answer.sources.is_empty());
        assert!(answer.text.contains("---------------------\n\n---------------------"));
    }

    #[test]
    fn test_history_switches_default_template() {
        let p = pipeline().with_history_turns(2);
        assert!(p.template().has_history_slot());

        let p = pipeline().with_history_turns(0);
        assert!(!p.template().has_history_slot());
    }

    #[test]
    fn test_unique_id_suffixes_repeats() {
        let mut seen = HashSet::new();
        assert_eq!(unique_id(&mut seen, "notes.txt"), "notes.txt");
        assert_eq!(unique_id(&mut seen, "notes.txt"), "notes.txt~2");
        assert_eq!(unique_id(&mut seen, "other.txt"), "other.txt");
        assert_eq!(unique_id(&mut seen, "notes.txt"), "notes.txt~3");
    }

    #[test]
    fn test_report_chunk_count() {
        let report = IngestReport {
            indexed: vec![("a".into(), 2), ("b".into(), 3)],
            skipped: vec![],
        };
        assert_eq!(report.chunk_count(), 5);
    }
}

//! Embedding service clients.
//!
//! Text is embedded by a remote service, either an OpenAI-compatible
//! `/embeddings` endpoint or Ollama's `/api/embed`. Requests are batched,
//! every returned vector is checked against the configured dimension, and
//! transient failures (HTTP 429, 5xx, network errors) are retried with
//! exponential backoff.

use crate::llm::http::{HttpError, JsonClient};
use crate::rag::cache::CachedEmbedder;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{DocqaConfig, ProviderConfig};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps text to fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts; the result has one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::embedding("Embedding service returned no vector", false))
    }

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

/// Wire format spoken by the embedding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingApi {
    /// `POST {api_base}/embeddings`
    OpenAI,
    /// `POST {base_url}/api/embed`
    Ollama,
}

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Embedder backed by an HTTP embedding service.
pub struct HttpEmbedder {
    http: JsonClient,
    api: EmbeddingApi,
    model: String,
    dimensions: usize,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpEmbedder {
    pub fn new(
        http: JsonClient,
        api: EmbeddingApi,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            http,
            api,
            model: model.into(),
            dimensions,
            batch_size: 64,
            max_retries: 2,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay before the first retry; doubles on each further attempt.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn request_once(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, HttpError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        match self.api {
            EmbeddingApi::OpenAI => {
                let response: OpenAIEmbedResponse = self.http.post("embeddings", &request).await?;
                let mut data = response.data;
                data.sort_by_key(|d| d.index);
                Ok(data.into_iter().map(|d| d.embedding).collect())
            }
            EmbeddingApi::Ollama => {
                let response: OllamaEmbedResponse = self.http.post("api/embed", &request).await?;
                Ok(response.embeddings)
            }
        }
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            match self.request_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        model = %self.model,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient embedding failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::embedding(
                        format!("{} ({})", e, self.model),
                        e.is_transient(),
                    ));
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ms = base.as_millis() as u64 / 4;
        let jitter = if jitter_ms > 0 {
            rand::rng().random_range(0..=jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    fn check_batch(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(AppError::embedding(
                format!(
                    "Embedding service returned {} vectors for {} inputs",
                    vectors.len(),
                    expected
                ),
                false,
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(AppError::embedding(
                format!(
                    "Model '{}' returned a {}-dimensional vector, expected {}",
                    self.model,
                    bad.len(),
                    self.dimensions
                ),
                false,
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let batch_vectors = self.embed_with_retry(batch).await?;
            self.check_batch(batch.len(), &batch_vectors)?;
            debug!(model = %self.model, batch = batch_no, size = batch.len(), "Embedded batch");
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the embedder described by `[embedding]`, cached when
/// `cache_entries > 0`.
pub fn create_embedder(config: &DocqaConfig) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    let provider = config.get_provider(&settings.provider).ok_or_else(|| {
        AppError::Config(format!(
            "Provider '{}' referenced by [embedding] not found",
            settings.provider
        ))
    })?;
    let timeout = Duration::from_secs(provider.timeout_secs());

    let (http, api) = match provider {
        ProviderConfig::OpenAI {
            api_key_env,
            api_base,
            ..
        } => {
            let api_key = config.resolve_env(api_key_env).ok_or_else(|| {
                AppError::Config(format!("Environment variable '{}' is not set", api_key_env))
            })?;
            (
                JsonClient::new(api_base.clone(), Some(api_key), timeout)?,
                EmbeddingApi::OpenAI,
            )
        }
        ProviderConfig::Ollama { base_url, .. } => (
            JsonClient::new(base_url.clone(), None, timeout)?,
            EmbeddingApi::Ollama,
        ),
    };

    let embedder = HttpEmbedder::new(http, api, settings.model.clone(), settings.dimensions)
        .with_batch_size(settings.batch_size)
        .with_max_retries(settings.max_retries);

    if settings.cache_entries > 0 {
        Ok(Arc::new(CachedEmbedder::new(
            Arc::new(embedder),
            settings.cache_entries,
        )))
    } else {
        Ok(Arc::new(embedder))
    }
}

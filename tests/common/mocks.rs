//! Mock implementations for testing.
//!
//! Deterministic embedders and scripted LLM clients shared by the
//! integration tests, so no test talks to a real model service.

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::llm::LLMClient;
use docqa::rag::Embedder;
use docqa::types::{AppError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hashed bag-of-words embedder.
///
/// Every lowercase alphanumeric token adds 1.0 to a bucket chosen by an FNV-1a
/// hash; the vector is then L2-normalised. Texts sharing words end up close
/// to each other, and the same text always gets the same vector.
pub struct KeywordEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let bucket = fnv1a(token.as_bytes()) as usize % self.dimensions;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder {
    pub transient: bool,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::embedding("embedding service unavailable", self.transient))
    }

    fn dimensions(&self) -> usize {
        16
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

#[derive(Clone)]
enum Reply {
    Fixed(String),
    Context,
    Fail,
}

/// LLM client with a scripted reply that records every prompt it receives.
#[derive(Clone)]
pub struct MockLLMClient {
    reply: Reply,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLLMClient {
    /// Always answers `response`.
    pub fn new(response: &str) -> Self {
        Self::with_reply(Reply::Fixed(response.to_string()))
    }

    /// Answers with the context block of the prompt, i.e. the retrieved text.
    pub fn answering_from_context() -> Self {
        Self::with_reply(Reply::Context)
    }

    /// Always fails with a generation error.
    pub fn failing() -> Self {
        Self::with_reply(Reply::Fail)
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

const RULE: &str = "---------------------";

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match &self.reply {
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Context => {
                let context = prompt
                    .split(RULE)
                    .nth(1)
                    .map(str::trim)
                    .unwrap_or_default();
                Ok(format!("According to the documents: {}", context))
            }
            Reply::Fail => Err(AppError::Generation("Mock LLM failure".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

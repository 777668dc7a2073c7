//! Embedding Cache for RAG Pipeline
//!
//! Re-indexing the same documents, or asking the same question twice, should
//! not hit the embedding service again. [`CachedEmbedder`] wraps any
//! [`Embedder`] with an in-memory LRU cache.
//!
//! # Cache Key Strategy
//!
//! Cache keys are SHA-256 hashes of `text | model_name`, so vectors from
//! different models never collide.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::rag::embeddings::Embedder;
use crate::types::Result;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Compute a cache key for the given text and model
pub fn compute_key(text: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

/// An [`Embedder`] that remembers up to `capacity` vectors.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    /// A zero capacity is treated as one entry.
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.cache.lock().len(),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.inner.model_name();
        let keys: Vec<String> = texts.iter().map(|t| compute_key(t, model)).collect();

        let mut found: Vec<Option<Vec<f32>>> = {
            let mut cache = self.cache.lock();
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        // Each distinct missing text is sent once.
        let mut pending: Vec<String> = Vec::new();
        let mut pending_slot: HashMap<&str, usize> = HashMap::new();
        for (i, slot) in found.iter().enumerate() {
            if slot.is_none() && !pending_slot.contains_key(keys[i].as_str()) {
                pending_slot.insert(keys[i].as_str(), pending.len());
                pending.push(texts[i].clone());
            }
        }

        let hits = found.iter().filter(|v| v.is_some()).count();
        self.hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.misses
            .fetch_add((texts.len() - hits) as u64, Ordering::Relaxed);
        trace!(hits, misses = pending.len(), "Embedding cache lookup");

        if !pending.is_empty() {
            let fresh = self.inner.embed_batch(&pending).await?;

            let mut cache = self.cache.lock();
            for (i, slot) in found.iter_mut().enumerate() {
                if slot.is_none() {
                    if let Some(vector) = pending_slot.get(keys[i].as_str()).and_then(|&p| fresh.get(p)) {
                        *slot = Some(vector.clone());
                    }
                }
            }
            for (text, vector) in pending.iter().zip(fresh) {
                cache.put(compute_key(text, model), vector);
            }
        }

        found
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    crate::types::AppError::embedding(
                        "Embedding service returned too few vectors",
                        false,
                    )
                })
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        calls: AtomicUsize,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_compute_key_depends_on_model() {
        assert_eq!(compute_key("hello", "a"), compute_key("hello", "a"));
        assert_ne!(compute_key("hello", "a"), compute_key("hello", "b"));
        assert_eq!(compute_key("hello", "a").len(), 64);
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 16);

        let first = cached.embed("abc").await.unwrap();
        let second = cached.embed("abc").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[tokio::test]
    async fn test_batch_mixes_hits_and_misses_in_order() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 16);
        cached.embed("bb").await.unwrap();

        let texts: Vec<String> = ["a", "bb", "ccc", "a"].iter().map(|s| s.to_string()).collect();
        let vectors = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors[0][0], 1.0);
        assert_eq!(vectors[1][0], 2.0);
        assert_eq!(vectors[2][0], 3.0);
        assert_eq!(vectors[3][0], 1.0);
        // "bb" cached; duplicate "a" sent once
        assert_eq!(inner.texts.load(Ordering::SeqCst), 1 + 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 1);

        cached.embed("x").await.unwrap();
        cached.embed("yy").await.unwrap();
        cached.embed("x").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.stats().entry_count, 1);
    }
}

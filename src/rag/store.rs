//! The knowledge base: chunk texts, their vectors and index metadata.
//!
//! A [`KnowledgeBase`] is built once per document set and saved as a
//! `docqa-vector` snapshot with three blobs:
//!
//! - `docstore.json` - chunks keyed by id, plus the documents they came from
//! - `vectors.bin` - the flat index (ids + contiguous `f32` vectors)
//! - `index.json` - dimensions, metric, count and embedding model
//!
//! Every blob is checksummed and the set is committed atomically, so loading
//! either returns the complete last save or an [`IndexLoadError`].

use crate::types::{AppError, Chunk, IndexLoadError, Result, SourceMedium};
use docqa_vector::persistence::{self, Snapshot};
use docqa_vector::{DistanceMetric, FlatIndex, IndexConfig, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{info, instrument};

const DOCSTORE_BLOB: &str = "docstore.json";
const VECTORS_BLOB: &str = "vectors.bin";
const INDEX_BLOB: &str = "index.json";

/// Summary of a stored index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub dimensions: usize,
    pub metric: DistanceMetric,
    pub count: usize,
    pub embedding_model: String,
}

/// A document that contributed chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub medium: SourceMedium,
    pub chunk_count: usize,
}

/// Chunk texts keyed by chunk id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStore {
    chunks: BTreeMap<String, Chunk>,
    documents: BTreeMap<String, DocumentEntry>,
}

impl DocumentStore {
    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &DocumentEntry)> {
        self.documents.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Chunks of one document in ordinal order.
    pub fn chunks_of(&self, document_id: &str) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .collect();
        chunks.sort_by_key(|c| c.ordinal);
        chunks
    }

    fn insert(&mut self, chunk: Chunk, medium: SourceMedium) {
        let entry = self
            .documents
            .entry(chunk.document_id.clone())
            .or_insert(DocumentEntry {
                medium,
                chunk_count: 0,
            });
        entry.chunk_count += 1;
        self.chunks.insert(chunk.id.clone(), chunk);
    }
}

/// Chunk store plus vector index for one document set. Immutable once built.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    docstore: DocumentStore,
    index: FlatIndex,
    embedding_model: String,
}

/// An embedded chunk ready to go into a knowledge base.
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub medium: SourceMedium,
    pub vector: Vec<f32>,
}

impl KnowledgeBase {
    /// Build from embedded chunks, in the order given.
    pub fn build(
        dimensions: usize,
        metric: DistanceMetric,
        embedding_model: impl Into<String>,
        chunks: impl IntoIterator<Item = EmbeddedChunk>,
    ) -> Result<Self> {
        let config = IndexConfig::new(dimensions).with_metric(metric);
        let mut index = FlatIndex::new(config).map_err(vector_error)?;
        let mut docstore = DocumentStore::default();

        for embedded in chunks {
            index
                .insert(embedded.chunk.id.clone(), &embedded.vector)
                .map_err(vector_error)?;
            docstore.insert(embedded.chunk, embedded.medium);
        }

        Ok(Self {
            docstore,
            index,
            embedding_model: embedding_model.into(),
        })
    }

    pub fn metadata(&self) -> IndexMetadata {
        IndexMetadata {
            dimensions: self.index.dimensions(),
            metric: self.index.metric(),
            count: self.index.len(),
            embedding_model: self.embedding_model.clone(),
        }
    }

    pub fn docstore(&self) -> &DocumentStore {
        &self.docstore
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nearest chunks to `query`, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&Chunk, f32)>> {
        let hits: Vec<SearchResult> = self.index.search(query, k).map_err(vector_error)?;

        hits.into_iter()
            .map(|hit| {
                self.docstore
                    .get(&hit.id)
                    .map(|chunk| (chunk, hit.distance))
                    .ok_or_else(|| {
                        AppError::Internal(format!("Chunk '{}' missing from document store", hit.id))
                    })
            })
            .collect()
    }

    /// Commit this knowledge base to `dir`.
    #[instrument(skip_all, fields(dir = %dir.display(), count = self.len()))]
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let docstore = serde_json::to_vec(&self.docstore)
            .map_err(|e| AppError::Storage(format!("Failed to serialize document store: {}", e)))?;
        let vectors = persistence::encode_index(&self.index).map_err(vector_error)?;
        let metadata = serde_json::to_vec_pretty(&self.metadata())
            .map_err(|e| AppError::Storage(format!("Failed to serialize index metadata: {}", e)))?;

        let manifest = persistence::write_snapshot(
            dir,
            &[
                (DOCSTORE_BLOB, docstore.as_slice()),
                (VECTORS_BLOB, vectors.as_slice()),
                (INDEX_BLOB, metadata.as_slice()),
            ],
        )
        .await
        .map_err(|e| AppError::Storage(format!("Failed to save index to {}: {}", dir.display(), e)))?;

        info!(generation = manifest.generation, "Saved knowledge base");
        Ok(())
    }

    /// Load the last committed knowledge base from `dir`.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn load(dir: &Path) -> Result<Self> {
        let mut snapshot = persistence::read_snapshot(dir)
            .await
            .map_err(|e| load_error(dir, e))?;

        let docstore_bytes = take_blob(&mut snapshot, dir, DOCSTORE_BLOB)?;
        let vector_bytes = take_blob(&mut snapshot, dir, VECTORS_BLOB)?;
        let metadata_bytes = take_blob(&mut snapshot, dir, INDEX_BLOB)?;

        let docstore: DocumentStore = serde_json::from_slice(&docstore_bytes).map_err(|e| {
            IndexLoadError::corrupt(dir, format!("document store does not decode: {}", e))
        })?;
        let index = persistence::decode_index(&vector_bytes).map_err(|e| {
            IndexLoadError::corrupt(dir, format!("vector index does not decode: {}", e))
        })?;
        let metadata: IndexMetadata = serde_json::from_slice(&metadata_bytes).map_err(|e| {
            IndexLoadError::corrupt(dir, format!("index metadata does not decode: {}", e))
        })?;

        let kb = Self {
            docstore,
            index,
            embedding_model: metadata.embedding_model.clone(),
        };
        kb.check_consistency(dir, &metadata)?;

        info!(count = kb.len(), generation = snapshot.generation(), "Loaded knowledge base");
        Ok(kb)
    }

    fn check_consistency(&self, dir: &Path, metadata: &IndexMetadata) -> Result<()> {
        let actual = self.metadata();
        if actual != *metadata {
            return Err(IndexLoadError::corrupt(
                dir,
                format!(
                    "index metadata {:?} does not match stored vectors {:?}",
                    metadata, actual
                ),
            )
            .into());
        }

        if self.docstore.len() != self.index.len() {
            return Err(IndexLoadError::corrupt(
                dir,
                format!(
                    "document store holds {} chunks but index holds {} vectors",
                    self.docstore.len(),
                    self.index.len()
                ),
            )
            .into());
        }

        let index_ids: HashSet<&str> = self.index.ids().iter().map(String::as_str).collect();
        if let Some(missing) = self.docstore.chunks.keys().find(|id| !index_ids.contains(id.as_str())) {
            return Err(IndexLoadError::corrupt(
                dir,
                format!("chunk '{}' has no vector", missing),
            )
            .into());
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for chunk in self.docstore.chunks.values() {
            *counts.entry(chunk.document_id.as_str()).or_default() += 1;
        }
        for (id, entry) in &self.docstore.documents {
            if counts.get(id.as_str()).copied().unwrap_or(0) != entry.chunk_count {
                return Err(IndexLoadError::corrupt(
                    dir,
                    format!("document '{}' chunk count does not match", id),
                )
                .into());
            }
        }

        Ok(())
    }
}

/// Read only the metadata blob of a saved knowledge base.
pub async fn read_metadata(dir: &Path) -> Result<IndexMetadata> {
    let mut snapshot = persistence::read_snapshot(dir)
        .await
        .map_err(|e| load_error(dir, e))?;
    let bytes = take_blob(&mut snapshot, dir, INDEX_BLOB)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| IndexLoadError::corrupt(dir, format!("index metadata does not decode: {}", e)).into())
}

fn take_blob(snapshot: &mut Snapshot, dir: &Path, name: &str) -> Result<Vec<u8>> {
    snapshot
        .take_blob(name)
        .ok_or_else(|| IndexLoadError::corrupt(dir, format!("manifest has no '{}' blob", name)).into())
}

fn load_error(dir: &Path, err: docqa_vector::Error) -> AppError {
    match err {
        docqa_vector::Error::NotFound(_) => IndexLoadError::not_found(dir).into(),
        docqa_vector::Error::Persistence(reason) => AppError::Storage(reason),
        other => IndexLoadError::corrupt(dir, other.to_string()).into(),
    }
}

fn vector_error(err: docqa_vector::Error) -> AppError {
    match err {
        docqa_vector::Error::DimensionMismatch { .. } | docqa_vector::Error::InvalidVector(_) => {
            AppError::embedding(err.to_string(), false)
        }
        docqa_vector::Error::DuplicateId(id) => AppError::InvalidInput(format!(
            "Chunk '{}' appears twice; document ids must be unique",
            id
        )),
        other => AppError::Internal(other.to_string()),
    }
}

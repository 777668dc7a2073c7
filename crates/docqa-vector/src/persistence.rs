//! Snapshot persistence for docqa-vector.
//!
//! A snapshot is a directory holding a set of named blobs plus a
//! `manifest.json` that records, for every blob, the file it lives in, its
//! length and its SHA-256. Blob files are never overwritten in place: each
//! save writes fresh files and then atomically renames a new manifest over the
//! old one, so a reader sees either the previous commit or the new one.
//!
//! ```text
//! store/
//! ├── manifest.json
//! ├── vectors-00000003-9f1c2a4b.bin
//! └── docstore-00000003-9f1c2a4b.json
//! ```
//!
//! Loading distinguishes two failures: [`Error::NotFound`] when nothing was
//! ever committed, and [`Error::Corrupt`] when a manifest exists but any part
//! of the snapshot fails validation.

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::FlatIndex;
use crate::types::VectorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Manifest file name inside a snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// One blob entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// File name relative to the snapshot directory.
    pub file: String,
    /// Length in bytes.
    pub len: u64,
    /// Hex-encoded SHA-256 of the file contents.
    pub sha256: String,
}

/// The commit record of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// On-disk format version.
    pub format_version: u32,
    /// Monotonic save counter for this directory.
    pub generation: u64,
    /// When this generation was committed.
    pub committed_at: DateTime<Utc>,
    /// Blobs by logical name.
    pub blobs: BTreeMap<String, BlobEntry>,
}

/// A fully validated snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The manifest that was committed.
    pub manifest: Manifest,
    blobs: BTreeMap<String, Vec<u8>>,
}

impl Snapshot {
    /// Borrow a blob by logical name.
    pub fn blob(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    /// Take ownership of a blob by logical name.
    pub fn take_blob(&mut self, name: &str) -> Option<Vec<u8>> {
        self.blobs.remove(name)
    }

    /// Generation number of this snapshot.
    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }
}

/// Write `blobs` as a new snapshot generation in `dir`.
///
/// The directory is created if needed. Blob files are written and synced
/// before the manifest is renamed into place. Unreferenced blob files of older
/// generations, including those of writers that lost a race, are removed
/// afterwards on a best-effort basis.
pub async fn write_snapshot(dir: &Path, blobs: &[(&str, &[u8])]) -> Result<Manifest> {
    tokio::fs::create_dir_all(dir).await?;

    let previous = match read_manifest(dir).await {
        Ok(manifest) => Some(manifest),
        Err(Error::NotFound(_)) => None,
        Err(e) => {
            warn!(path = ?dir, error = %e, "Overwriting unreadable snapshot");
            None
        }
    };
    let generation = previous.as_ref().map_or(1, |m| m.generation + 1);
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let tag = &tag[..8];

    let mut entries = BTreeMap::new();
    for (name, bytes) in blobs {
        validate_blob_name(name)?;
        if entries.contains_key(*name) {
            return Err(Error::Persistence(format!("Duplicate blob name: {}", name)));
        }

        let file = blob_file_name(name, generation, tag);
        write_durable(&dir.join(&file), bytes).await?;

        entries.insert(
            name.to_string(),
            BlobEntry {
                file,
                len: bytes.len() as u64,
                sha256: sha256_hex(bytes),
            },
        );
    }

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        generation,
        committed_at: Utc::now(),
        blobs: entries,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| Error::Persistence(format!("Failed to serialize manifest: {}", e)))?;

    // The commit point.
    write_durable(&dir.join(MANIFEST_FILE), &manifest_json).await?;
    sync_dir(dir).await?;

    remove_stale(dir, &manifest).await;

    info!(path = ?dir, generation, blobs = manifest.blobs.len(), "Committed snapshot");
    Ok(manifest)
}

/// Read and parse the manifest of a snapshot without touching its blobs.
pub async fn read_manifest(dir: &Path) -> Result<Manifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let bytes = match tokio::fs::read(&manifest_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound(dir.to_path_buf()));
        }
        Err(e) => {
            return Err(Error::corrupt(dir, format!("Cannot read manifest: {}", e)));
        }
    };

    let manifest: Manifest = serde_json::from_slice(&bytes)
        .map_err(|e| Error::corrupt(dir, format!("Unparseable manifest: {}", e)))?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::corrupt(
            dir,
            format!(
                "Unsupported format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            ),
        ));
    }

    Ok(manifest)
}

/// Read a snapshot and verify every blob against its manifest entry.
///
/// A blob that disappears because a newer generation was committed in the
/// meantime sends the reader to the new manifest. A blob missing under the
/// current manifest is corruption.
pub async fn read_snapshot(dir: &Path) -> Result<Snapshot> {
    let mut manifest = read_manifest(dir).await?;

    for _ in 0..READ_ATTEMPTS {
        let (name, file) = match read_blobs(dir, &manifest).await? {
            BlobRead::Complete(blobs) => {
                debug!(path = ?dir, generation = manifest.generation, "Read snapshot");
                return Ok(Snapshot { manifest, blobs });
            }
            BlobRead::Missing { name, file } => (name, file),
        };

        let current = read_manifest(dir).await?;
        if current.blobs == manifest.blobs {
            return Err(Error::corrupt(
                dir,
                format!("Blob '{}' is missing ({})", name, file),
            ));
        }
        debug!(
            path = ?dir,
            from = manifest.generation,
            to = current.generation,
            "Snapshot replaced during read, retrying"
        );
        manifest = current;
    }

    Err(Error::Persistence(format!(
        "Snapshot at {} kept changing while being read",
        dir.display()
    )))
}

/// Manifests a reader follows before giving up on a store under heavy writes.
const READ_ATTEMPTS: usize = 16;

enum BlobRead {
    Complete(BTreeMap<String, Vec<u8>>),
    Missing { name: String, file: String },
}

async fn read_blobs(dir: &Path, manifest: &Manifest) -> Result<BlobRead> {
    let mut blobs = BTreeMap::new();
    for (name, entry) in &manifest.blobs {
        let bytes = match tokio::fs::read(dir.join(&entry.file)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(BlobRead::Missing {
                    name: name.clone(),
                    file: entry.file.clone(),
                });
            }
            Err(e) => {
                return Err(Error::corrupt(
                    dir,
                    format!("Cannot read blob '{}': {}", name, e),
                ));
            }
        };

        if bytes.len() as u64 != entry.len {
            return Err(Error::corrupt(
                dir,
                format!(
                    "Blob '{}' has {} bytes, manifest records {}",
                    name,
                    bytes.len(),
                    entry.len
                ),
            ));
        }
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(Error::corrupt(
                dir,
                format!("Blob '{}' checksum mismatch", name),
            ));
        }

        blobs.insert(name.clone(), bytes);
    }
    Ok(BlobRead::Complete(blobs))
}

#[derive(Serialize, Deserialize)]
struct StoredIndex {
    config: IndexConfig,
    ids: Vec<VectorId>,
    data: Vec<f32>,
}

/// Encode an index into a compact binary blob. Floats are stored bit-exact.
pub fn encode_index(index: &FlatIndex) -> Result<Vec<u8>> {
    let stored = StoredIndex {
        config: index.config(),
        ids: index.ids().to_vec(),
        data: index.raw_data().to_vec(),
    };
    postcard::to_allocvec(&stored)
        .map_err(|e| Error::Persistence(format!("Failed to encode index: {}", e)))
}

/// Decode a blob produced by [`encode_index`].
pub fn decode_index(bytes: &[u8]) -> Result<FlatIndex> {
    let stored: StoredIndex = postcard::from_bytes(bytes)
        .map_err(|e| Error::Persistence(format!("Failed to decode index: {}", e)))?;
    FlatIndex::from_parts(stored.config, stored.ids, stored.data)
}

/// Compute the hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn validate_blob_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == MANIFEST_FILE
        || name.contains(['/', '\\'])
        || name.starts_with('.')
    {
        return Err(Error::Persistence(format!("Invalid blob name: '{}'", name)));
    }
    Ok(())
}

/// `vectors.bin` at generation 3 becomes `vectors-00000003-<tag>.bin`.
fn blob_file_name(name: &str, generation: u64, tag: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{:08}-{}.{}", stem, generation, tag, ext),
        None => format!("{}-{:08}-{}", name, generation, tag),
    }
}

async fn write_durable(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    let handle = tokio::fs::File::open(dir).await?;
    handle.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Generation encoded in a blob file name, `None` for any other file.
fn blob_file_generation(file: &str) -> Option<u64> {
    let base = file.rsplit_once('.').map_or(file, |(base, _)| base);
    let mut parts = base.rsplitn(3, '-');
    let tag = parts.next()?;
    let generation = parts.next()?;
    let stem = parts.next()?;

    let tag_ok = tag.len() == 8 && tag.bytes().all(|b| b.is_ascii_hexdigit());
    let generation_ok = generation.len() >= 8 && generation.bytes().all(|b| b.is_ascii_digit());
    if stem.is_empty() || !tag_ok || !generation_ok {
        return None;
    }
    generation.parse().ok()
}

/// Files of the current generation are left alone: they may belong to a
/// writer that has not committed yet.
async fn remove_stale(dir: &Path, current: &Manifest) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = ?dir, error = %e, "Cannot list snapshot for cleanup");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(path = ?dir, error = %e, "Cannot list snapshot for cleanup");
                break;
            }
        };
        let file = entry.file_name().to_string_lossy().into_owned();
        let stale = blob_file_generation(&file)
            .is_some_and(|generation| generation < current.generation)
            && !current.blobs.values().any(|e| e.file == file);
        if !stale {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(entry.path()).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(file = %file, error = %e, "Failed to remove stale blob");
            }
        }
    }
}

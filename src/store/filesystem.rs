//! Filesystem artifact store
//!
//! Artifacts live in a flat directory: `{root}/{key}` holds the body and
//! `{root}/{key}.meta` holds JSON metadata (content type, digest, time).
//! Both are written to a uniquely named temp file first and renamed into
//! place, so readers never observe a partial body and concurrent writers
//! resolve to whichever rename lands last. Temp names do not embed the key,
//! so `<key>.meta` is the longest name the store creates.
//!
//! Two writers racing on one key can leave one writer's body beside the
//! other's sidecar. `get` hashes the body it read and drops a digest that
//! does not match it.

use crate::error::StorageError;
use crate::store::{content_digest, validate_key, Artifact, ArtifactMeta, BlobStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    digest: String,
    stored_at: chrono::DateTime<Utc>,
}

/// Flat-directory blob store
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create artifact directory at {:?}: {}", root, e),
            ))
        })?;
        Ok(Self { root })
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.meta", key))
    }

    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let temp_path = self
            .root
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        fs::write(&temp_path, bytes).await.map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to write {:?}: {}", temp_path, e),
            ))
        })?;

        if let Err(e) = fs::rename(&temp_path, target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to move {:?} into place: {}", target, e),
            )));
        }
        Ok(())
    }

    async fn read_sidecar(&self, key: &str) -> Result<Option<Sidecar>, StorageError> {
        match fs::read(self.sidecar_path(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::CorruptMetadata {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    fn build_meta(key: &str, size: u64, sidecar: Option<Sidecar>) -> ArtifactMeta {
        match sidecar {
            Some(sidecar) => ArtifactMeta {
                key: key.to_string(),
                size,
                content_type: sidecar.content_type,
                digest: Some(sidecar.digest),
                stored_at: Some(sidecar.stored_at),
            },
            None => ArtifactMeta {
                key: key.to_string(),
                size,
                content_type: FALLBACK_CONTENT_TYPE.to_string(),
                digest: None,
                stored_at: None,
            },
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<ArtifactMeta, StorageError> {
        validate_key(key)?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            digest: content_digest(body),
            stored_at: Utc::now(),
        };
        let sidecar_bytes = serde_json::to_vec(&sidecar).map_err(|e| {
            StorageError::CorruptMetadata {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        // Metadata first: the body rename is the commit point for `head`.
        self.write_atomic(&self.sidecar_path(key), &sidecar_bytes)
            .await?;
        self.write_atomic(&self.body_path(key), body).await?;

        debug!(key, bytes = body.len(), root = %self.root.display(), "Artifact written");
        Ok(Self::build_meta(key, body.len() as u64, Some(sidecar)))
    }

    async fn head(&self, key: &str) -> Result<Option<ArtifactMeta>, StorageError> {
        validate_key(key)?;
        let metadata = match fs::metadata(self.body_path(key)).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::IoError(e)),
        };
        if !metadata.is_file() {
            return Ok(None);
        }
        let sidecar = self.read_sidecar(key).await?;
        Ok(Some(Self::build_meta(key, metadata.len(), sidecar)))
    }

    async fn get(&self, key: &str) -> Result<Artifact, StorageError> {
        validate_key(key)?;
        let body = match fs::read(self.body_path(key)).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };
        let sidecar = self.read_sidecar(key).await?;
        let mut meta = Self::build_meta(key, body.len() as u64, sidecar);
        let body_digest = content_digest(&body);
        if meta.digest.as_ref().is_some_and(|d| *d != body_digest) {
            debug!(key, "Sidecar digest does not match body; dropping it");
            meta.digest = None;
        }
        Ok(Artifact { meta, body })
    }

    fn store_name(&self) -> &str {
        "filesystem"
    }
}

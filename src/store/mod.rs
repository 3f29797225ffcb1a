//! Artifact Store
//!
//! Key/value blob storage for generated artifacts. The store is the single
//! source of truth for completion: a session is ready exactly when its
//! artifact key exists. Writes overwrite (last writer wins); there is no
//! compare-and-swap and no versioning.

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemBlobStore;
pub use memory::MemoryBlobStore;

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata returned by an existence check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    /// blake3 hex digest of the body, when recorded
    pub digest: Option<String>,
    pub stored_at: Option<DateTime<Utc>>,
}

/// A stored artifact with its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    pub body: Vec<u8>,
}

impl Artifact {
    /// Body as text; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blob store capability
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `body` under `key`, replacing any previous artifact.
    async fn put(&self, key: &str, body: &[u8], content_type: &str)
        -> Result<ArtifactMeta, StorageError>;

    /// Existence check. `Ok(None)` when the key is absent.
    async fn head(&self, key: &str) -> Result<Option<ArtifactMeta>, StorageError>;

    /// Read an artifact. `StorageError::NotFound` when the key is absent.
    async fn get(&self, key: &str) -> Result<Artifact, StorageError>;

    /// Store name for logs
    fn store_name(&self) -> &str;
}

/// Digest recorded alongside every artifact
pub fn content_digest(body: &[u8]) -> String {
    hex::encode(blake3::hash(body).as_bytes())
}

/// Longest accepted key (bytes). The filesystem store's longest name is
/// `<key>.meta`, which must fit in a 255-byte file name.
pub const MAX_KEY_LEN: usize = 240;

/// Reject keys that could escape a flat namespace or overflow a file name.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

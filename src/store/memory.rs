//! In-process artifact store

use crate::error::StorageError;
use crate::store::{content_digest, validate_key, Artifact, ArtifactMeta, BlobStore};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// HashMap-backed blob store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryBlobStore {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<ArtifactMeta, StorageError> {
        validate_key(key)?;
        let meta = ArtifactMeta {
            key: key.to_string(),
            size: body.len() as u64,
            content_type: content_type.to_string(),
            digest: Some(content_digest(body)),
            stored_at: Some(Utc::now()),
        };
        self.artifacts.write().insert(
            key.to_string(),
            Artifact {
                meta: meta.clone(),
                body: body.to_vec(),
            },
        );
        Ok(meta)
    }

    async fn head(&self, key: &str) -> Result<Option<ArtifactMeta>, StorageError> {
        validate_key(key)?;
        Ok(self.artifacts.read().get(key).map(|a| a.meta.clone()))
    }

    async fn get(&self, key: &str) -> Result<Artifact, StorageError> {
        validate_key(key)?;
        self.artifacts
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

//! Status Service
//!
//! Read-only view of a session's progress. The artifact's presence is the
//! only signal: absent means `Pending` (queued, running, or failed without
//! redelivery yet, which callers cannot tell apart), present means ready.

use crate::error::{StatusError, StorageError};
use crate::store::BlobStore;
use crate::types::{artifact_key, validate_session_id, SessionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// How a ready artifact is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// Embed the document in the status reply
    #[default]
    Inline,
    /// Return a URL to the document
    Url,
}

pub struct StatusService {
    store: Arc<dyn BlobStore>,
    mode: StatusMode,
    public_base_url: String,
}

impl StatusService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            mode: StatusMode::Inline,
            public_base_url: String::new(),
        }
    }

    /// Answer ready sessions with `<public_base_url>/artifacts/<key>`.
    pub fn with_url_mode(mut self, public_base_url: impl Into<String>) -> Self {
        self.mode = StatusMode::Url;
        self.public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn mode(&self) -> StatusMode {
        self.mode
    }

    pub async fn resolve(&self, session_id: &str) -> Result<SessionStatus, StatusError> {
        validate_session_id(session_id).map_err(StatusError::Validation)?;
        let key = artifact_key(session_id);

        if self.store.head(&key).await?.is_none() {
            debug!(session_id, "Artifact absent; session pending");
            return Ok(SessionStatus::Pending);
        }

        match self.mode {
            StatusMode::Url => Ok(SessionStatus::ReadyAt {
                url: format!("{}/artifacts/{}", self.public_base_url, key),
            }),
            StatusMode::Inline => match self.store.get(&key).await {
                Ok(artifact) => Ok(SessionStatus::Ready {
                    html: artifact.text(),
                }),
                // Removed between head and get
                Err(StorageError::NotFound(_)) => Ok(SessionStatus::Pending),
                Err(e) => Err(e.into()),
            },
        }
    }
}

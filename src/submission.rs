//! Submission Service
//!
//! Validates an incoming request and performs exactly one enqueue. The
//! caller learns only that the job is durably queued.

use crate::error::SubmitError;
use crate::queue::WorkQueue;
use crate::types::{validate_session_id, JobMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Raw submission as received from a client. Both fields may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

impl SubmitRequest {
    pub fn new(prompt: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            session_id: Some(session_id.into()),
        }
    }
}

/// Successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip)]
    pub message_id: String,
}

pub struct SubmissionService {
    queue: Arc<dyn WorkQueue>,
    guest_session_id: Option<String>,
}

impl SubmissionService {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            queue,
            guest_session_id: None,
        }
    }

    /// Substitute `guest_session_id` when a request carries no session id.
    pub fn with_guest_session(mut self, guest_session_id: Option<String>) -> Self {
        self.guest_session_id = guest_session_id.filter(|s| !s.trim().is_empty());
        self
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<Accepted, SubmitError> {
        let message = self.validate(request)?;
        let body = message.to_body().map_err(|e| {
            SubmitError::Validation(format!("Failed to encode job: {}", e))
        })?;

        let message_id = self.queue.send(body).await.map_err(|e| {
            warn!(
                session_id = %message.session_id,
                queue = self.queue.queue_name(),
                error = %e,
                "Failed to enqueue generation job"
            );
            SubmitError::Enqueue(e)
        })?;

        info!(
            session_id = %message.session_id,
            message_id = %message_id,
            "Generation job accepted"
        );
        Ok(Accepted {
            session_id: message.session_id,
            message_id,
        })
    }

    fn validate(&self, request: SubmitRequest) -> Result<JobMessage, SubmitError> {
        let prompt = request
            .prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SubmitError::Validation("Missing prompt or sessionId".to_string()))?;

        let session_id = match request.session_id.filter(|s| !s.trim().is_empty()) {
            Some(session_id) => session_id,
            None => self.guest_session_id.clone().ok_or_else(|| {
                SubmitError::Validation("Missing prompt or sessionId".to_string())
            })?,
        };
        validate_session_id(&session_id).map_err(SubmitError::Validation)?;

        Ok(JobMessage::new(prompt, session_id))
    }
}

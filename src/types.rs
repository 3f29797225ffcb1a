//! Shared job and session data model.
//!
//! `JobMessage` is the only contract between the submission side and the
//! worker side of the queue. Everything else is derived from it.

use crate::store::MAX_KEY_LEN;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type declared for every persisted artifact
pub const ARTIFACT_CONTENT_TYPE: &str = "text/html";

/// Upper bound on session id length (bytes), leaving room for the
/// `.html` suffix within the store's key limit
pub const MAX_SESSION_ID_LEN: usize = MAX_KEY_LEN - ".html".len();

/// Queue message body: `{"prompt": ..., "sessionId": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub prompt: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl JobMessage {
    pub fn new(prompt: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: session_id.into(),
        }
    }

    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a queue body. Empty fields are rejected so a worker never
    /// generates for a job the submission side would have refused.
    pub fn from_body(body: &str) -> Result<Self, String> {
        let message: JobMessage =
            serde_json::from_str(body).map_err(|e| format!("invalid job payload: {}", e))?;
        if message.prompt.trim().is_empty() {
            return Err("job payload has an empty prompt".to_string());
        }
        validate_session_id(&message.session_id)?;
        Ok(message)
    }
}

/// A job as seen by a worker attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub session_id: String,
    pub prompt: String,
    /// Time the submission side sent the message
    pub enqueued_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn from_message(message: JobMessage, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            session_id: message.session_id,
            prompt: message.prompt,
            enqueued_at,
        }
    }

    pub fn artifact_key(&self) -> String {
        artifact_key(&self.session_id)
    }
}

/// Worker output for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub session_id: String,
    pub html: String,
}

/// Observable state of a session.
///
/// There is no failed state: a session whose job failed without redelivery
/// reads as `Pending`, because artifact presence is the only record kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    /// Artifact present, content inlined
    Ready { html: String },
    /// Artifact present, content served elsewhere
    ReadyAt { url: String },
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Ready { .. } | SessionStatus::ReadyAt { .. } => "ready",
        }
    }
}

/// Canonical artifact key: `<sessionId>.html`
pub fn artifact_key(session_id: &str) -> String {
    format!("{}.html", session_id)
}

/// Check a session id before it is used as part of an artifact key.
pub fn validate_session_id(session_id: &str) -> Result<(), String> {
    if session_id.trim().is_empty() {
        return Err("sessionId must not be empty".to_string());
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(format!(
            "sessionId must be at most {} bytes",
            MAX_SESSION_ID_LEN
        ));
    }
    if session_id.contains('/') || session_id.contains('\\') || session_id.contains("..") {
        return Err("sessionId must not contain path separators or '..'".to_string());
    }
    if session_id.starts_with('.') {
        return Err("sessionId must not start with '.'".to_string());
    }
    if session_id.chars().any(char::is_control) {
        return Err("sessionId must not contain control characters".to_string());
    }
    Ok(())
}

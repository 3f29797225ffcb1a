//! Error types for the site generation pipeline.

use std::time::Duration;
use thiserror::Error;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Artifact metadata corrupt for {key}: {reason}")]
    CorruptMetadata { key: String, reason: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Work queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Receipt is stale for message {0}; it was redelivered after its visibility timeout")]
    StaleReceipt(String),

    #[error("Queue record corrupt: {0}")]
    Corrupt(String),
}

impl From<sled::Error> for QueueError {
    fn from(err: sled::Error) -> Self {
        QueueError::Unavailable(format!("sled: {}", err))
    }
}

/// Generation backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend error: {0}")]
    ProviderError(String),

    #[error("Backend request failed: {0}")]
    RequestFailed(String),

    #[error("Backend authentication failed: {0}")]
    AuthFailed(String),

    #[error("Backend rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Backend model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Backend response malformed: {0}")]
    MalformedResponse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

/// Submission errors
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Failed to enqueue job: {0}")]
    Enqueue(#[from] QueueError),
}

/// Status resolution errors
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Invalid status request: {0}")]
    Validation(String),

    #[error("Artifact store error: {0}")]
    Store(#[from] StorageError),
}

/// Startup and wiring errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

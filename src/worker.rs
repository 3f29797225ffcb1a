//! Worker
//!
//! Turns one queue delivery into one persisted artifact. A job is committed
//! (acknowledged) only after the artifact write succeeds. Every failure
//! before that point leaves the message unacknowledged, so retry is the
//! queue's visibility-timeout redelivery and nothing else. Writes overwrite,
//! which makes a repeated attempt for the same session harmless.

use crate::error::{BackendError, QueueError, StorageError};
use crate::extract::{extract_html, Extraction};
use crate::provider::{prompt, GenerationBackend};
use crate::queue::{Delivery, WorkQueue};
use crate::store::BlobStore;
use crate::types::{GenerationJob, GenerationResult, JobMessage, ARTIFACT_CONTENT_TYPE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod pool;

pub use pool::{WorkerPool, WorkerPoolConfig, WorkerStats};

/// Errors longer than this are cut in log output
pub const LOG_ERROR_MAX_CHARS: usize = 300;

/// Why a delivery was left unacknowledged
#[derive(Debug, Error)]
pub enum AbandonReason {
    #[error("malformed job payload: {0}")]
    MalformedPayload(String),

    #[error("generation failed: {0}")]
    Backend(#[from] BackendError),

    #[error("artifact write failed: {0}")]
    Storage(#[from] StorageError),

    #[error("acknowledge failed after artifact write: {0}")]
    Acknowledge(#[from] QueueError),
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbandonReason::MalformedPayload(_) => "malformed_payload",
            AbandonReason::Backend(_) => "backend",
            AbandonReason::Storage(_) => "storage",
            AbandonReason::Acknowledge(_) => "acknowledge",
        }
    }
}

/// Result of processing one delivery
#[derive(Debug)]
pub enum ProcessOutcome {
    Committed {
        session_id: String,
        key: String,
        bytes: usize,
        extraction: Extraction,
    },
    Abandoned {
        reason: AbandonReason,
    },
}

impl ProcessOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ProcessOutcome::Committed { .. })
    }
}

pub struct Worker {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn BlobStore>,
    backend: Arc<dyn GenerationBackend>,
    backend_timeout: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn BlobStore>,
        backend: Arc<dyn GenerationBackend>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            backend,
            backend_timeout,
        }
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Process one delivery. Never panics and never returns an error; a
    /// failure is reported as `Abandoned` and the message is left for
    /// redelivery.
    pub async fn process(&self, delivery: &Delivery) -> ProcessOutcome {
        let started = Instant::now();
        let mut session_id = None;

        let result = self.run(delivery, &mut session_id).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                if let ProcessOutcome::Committed {
                    session_id,
                    key,
                    bytes,
                    extraction,
                } = &outcome
                {
                    info!(
                        message_id = %delivery.message_id,
                        session_id = %session_id,
                        key = %key,
                        bytes,
                        extraction = extraction.kind.as_str(),
                        receive_count = delivery.receive_count,
                        duration_ms,
                        "Generation job committed"
                    );
                }
                outcome
            }
            Err(reason) => {
                warn!(
                    message_id = %delivery.message_id,
                    session_id = session_id.as_deref().unwrap_or("-"),
                    backend = self.backend.backend_name(),
                    receive_count = delivery.receive_count,
                    reason = reason.as_str(),
                    error = %truncate_for_log(&reason.to_string(), LOG_ERROR_MAX_CHARS),
                    duration_ms,
                    "Generation job abandoned; leaving message for redelivery"
                );
                ProcessOutcome::Abandoned { reason }
            }
        }
    }

    async fn run(
        &self,
        delivery: &Delivery,
        session_id: &mut Option<String>,
    ) -> Result<ProcessOutcome, AbandonReason> {
        let message =
            JobMessage::from_body(&delivery.body).map_err(AbandonReason::MalformedPayload)?;
        let job = GenerationJob::from_message(message, delivery.sent_at);
        *session_id = Some(job.session_id.clone());

        debug!(
            message_id = %delivery.message_id,
            session_id = %job.session_id,
            backend = self.backend.backend_name(),
            model = self.backend.model_name(),
            "Invoking generation backend"
        );
        let text = self.generate(&job).await?;

        let extraction = extract_html(&text);
        if extraction.low_confidence {
            warn!(
                session_id = %job.session_id,
                chars = extraction.html.chars().count(),
                extraction = extraction.kind.as_str(),
                "Extracted document is implausibly short; persisting anyway"
            );
        }

        let key = job.artifact_key();
        let result = GenerationResult {
            session_id: job.session_id,
            html: extraction.html.clone(),
        };
        let meta = self
            .store
            .put(&key, result.html.as_bytes(), ARTIFACT_CONTENT_TYPE)
            .await?;

        self.queue.ack(delivery).await?;

        Ok(ProcessOutcome::Committed {
            session_id: result.session_id,
            key,
            bytes: meta.size as usize,
            extraction,
        })
    }

    async fn generate(&self, job: &GenerationJob) -> Result<String, BackendError> {
        let rendered = prompt::render(&job.prompt);
        let response = tokio::time::timeout(self.backend_timeout, self.backend.invoke(&rendered))
            .await
            .map_err(|_| BackendError::Timeout(self.backend_timeout))??;
        self.backend.extract_text(&response)
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

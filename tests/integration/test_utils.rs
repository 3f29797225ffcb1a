//! Shared test doubles and fixtures for integration tests

use async_trait::async_trait;
use parking_lot::Mutex;
use sitegen::error::{BackendError, QueueError, StorageError};
use sitegen::provider::{GenerationBackend, RawResponse};
use sitegen::queue::{Delivery, MemoryWorkQueue, QueueSettings, QueueStats, WorkQueue};
use sitegen::store::{Artifact, ArtifactMeta, BlobStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wrap `body` in the document markers, padded past the plausibility floor.
pub fn document(body: &str) -> String {
    format!(
        "Here you go.\n<!-- START HTML --><!DOCTYPE html><html><head><title>{}</title></head><body><main>{}</main></body></html><!-- END HTML -->",
        body,
        body.repeat(4)
    )
}

/// Queue with a short visibility timeout so redelivery is observable.
pub fn fast_queue(visibility_ms: u64, max_receive_count: Option<u32>) -> Arc<MemoryWorkQueue> {
    Arc::new(MemoryWorkQueue::new(QueueSettings {
        visibility_timeout: Duration::from_millis(visibility_ms),
        max_receive_count,
        poll_interval: Duration::from_millis(10),
    }))
}

pub enum Step {
    Reply(String),
    Fail(String),
}

/// Backend that plays back a fixed script, then repeats the last step.
pub struct ScriptedBackend {
    steps: Vec<Step>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Step::Reply(text.into())])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![Step::Fail(message.into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn invoke(&self, prompt: &str) -> Result<RawResponse, BackendError> {
        self.prompts.lock().push(prompt.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .get(call)
            .or_else(|| self.steps.last())
            .ok_or_else(|| BackendError::ProviderError("empty script".to_string()))?;
        match step {
            Step::Reply(text) => Ok(RawResponse::ok(text.clone())),
            Step::Fail(message) => Err(BackendError::RequestFailed(message.clone())),
        }
    }

    fn extract_text(&self, response: &RawResponse) -> Result<String, BackendError> {
        Ok(response.body.clone())
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Store whose every operation fails as if the backing service were down.
pub struct UnavailableStore;

#[async_trait]
impl BlobStore for UnavailableStore {
    async fn put(
        &self,
        _key: &str,
        _body: &[u8],
        _content_type: &str,
    ) -> Result<ArtifactMeta, StorageError> {
        Err(StorageError::IoError(std::io::Error::other("store offline")))
    }

    async fn head(&self, _key: &str) -> Result<Option<ArtifactMeta>, StorageError> {
        Err(StorageError::IoError(std::io::Error::other("store offline")))
    }

    async fn get(&self, _key: &str) -> Result<Artifact, StorageError> {
        Err(StorageError::IoError(std::io::Error::other("store offline")))
    }

    fn store_name(&self) -> &str {
        "unavailable"
    }
}

/// Queue that refuses every send.
pub struct UnavailableQueue;

#[async_trait]
impl WorkQueue for UnavailableQueue {
    async fn send(&self, _body: String) -> Result<String, QueueError> {
        Err(QueueError::Unavailable("queue offline".to_string()))
    }

    async fn receive(&self, _wait: Duration) -> Result<Option<Delivery>, QueueError> {
        Err(QueueError::Unavailable("queue offline".to_string()))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        Err(QueueError::MessageNotFound(delivery.message_id.clone()))
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        Err(QueueError::Unavailable("queue offline".to_string()))
    }

    fn queue_name(&self) -> &str {
        "unavailable"
    }
}

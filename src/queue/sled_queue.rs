//! Durable work queue on sled
//!
//! Each message is one record in the `messages` tree, keyed by message id
//! and encoded with bincode. Leasing a message is a compare-and-swap on its
//! record, so two consumers racing for the same message cannot both win the
//! same visibility window. Messages survive process restarts; a message that
//! was in flight when the process died becomes visible again once its
//! visibility timeout passes.

use crate::error::QueueError;
use crate::queue::record::{now_ms, QueuedMessage};
use crate::queue::{long_poll, Delivery, QueueSettings, QueueStats, WorkQueue};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

const MESSAGES_TREE: &str = "messages";

pub struct SledWorkQueue {
    db: sled::Db,
    messages: sled::Tree,
    notify: Notify,
    settings: QueueSettings,
}

impl SledWorkQueue {
    /// Open (or create) a queue database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, settings: QueueSettings) -> Result<Self, QueueError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            QueueError::Unavailable(format!(
                "Failed to open queue database at {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        let messages = db.open_tree(MESSAGES_TREE)?;
        Ok(Self {
            db,
            messages,
            notify: Notify::new(),
            settings,
        })
    }

    /// Number of messages held, visible or not
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn decode(bytes: &[u8]) -> Result<QueuedMessage, QueueError> {
        bincode::deserialize(bytes)
            .map_err(|e| QueueError::Corrupt(format!("Failed to decode queued message: {}", e)))
    }

    fn encode(message: &QueuedMessage) -> Result<Vec<u8>, QueueError> {
        bincode::serialize(message)
            .map_err(|e| QueueError::Corrupt(format!("Failed to encode queued message: {}", e)))
    }

    fn try_receive(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_ms();
        for item in self.messages.iter() {
            let (key, value) = item?;
            let message = match Self::decode(&value) {
                Ok(message) => message,
                Err(e) => {
                    warn!(key = %String::from_utf8_lossy(&key), error = %e, "Skipping undecodable queue record");
                    continue;
                }
            };
            if !message.is_visible(now) {
                continue;
            }

            if message.is_exhausted(self.settings.max_receive_count) {
                let removed = self
                    .messages
                    .compare_and_swap(&key, Some(value.as_ref()), None::<Vec<u8>>)?;
                if removed.is_ok() {
                    warn!(
                        message_id = %message.id,
                        receive_count = message.receive_count,
                        "Dropping message after maximum receive count"
                    );
                }
                continue;
            }

            let leased = message.leased(now, self.settings.visibility_timeout);
            let swapped = self.messages.compare_and_swap(
                &key,
                Some(value.as_ref()),
                Some(Self::encode(&leased)?),
            )?;
            match swapped {
                Ok(()) => return Ok(Some(leased.to_delivery())),
                // Another consumer leased it between our read and swap
                Err(_) => continue,
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl WorkQueue for SledWorkQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let message = QueuedMessage::new(body, now_ms());
        self.messages
            .insert(message.id.as_bytes(), Self::encode(&message)?)?;
        self.db.flush_async().await?;
        self.notify.notify_one();
        debug!(message_id = %message.id, "Message sent");
        Ok(message.id)
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        long_poll(&self.notify, wait, self.settings.poll_interval, || {
            self.try_receive()
        })
        .await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let key = delivery.message_id.as_bytes();
        let value = self
            .messages
            .get(key)?
            .ok_or_else(|| QueueError::MessageNotFound(delivery.message_id.clone()))?;
        let current = Self::decode(&value)?;
        if current.receipt.as_deref() != Some(delivery.receipt.as_str()) {
            return Err(QueueError::StaleReceipt(delivery.message_id.clone()));
        }

        let removed = self
            .messages
            .compare_and_swap(key, Some(value.as_ref()), None::<Vec<u8>>)?;
        if removed.is_err() {
            return Err(QueueError::StaleReceipt(delivery.message_id.clone()));
        }
        self.db.flush_async().await?;
        debug!(message_id = %delivery.message_id, "Message acknowledged");
        Ok(())
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let now = now_ms();
        let mut stats = QueueStats::default();
        for item in self.messages.iter() {
            let (_, value) = item?;
            if Self::decode(&value)?.is_visible(now) {
                stats.visible += 1;
            } else {
                stats.in_flight += 1;
            }
        }
        Ok(stats)
    }

    fn queue_name(&self) -> &str {
        "sled"
    }
}

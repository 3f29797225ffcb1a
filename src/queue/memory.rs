//! In-process work queue
//!
//! Same visibility-timeout semantics as the durable queue, kept in a
//! `BTreeMap` so receive order follows send order. Not durable.

use crate::error::QueueError;
use crate::queue::record::{now_ms, QueuedMessage};
use crate::queue::{long_poll, Delivery, QueueSettings, QueueStats, WorkQueue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub struct MemoryWorkQueue {
    messages: Mutex<BTreeMap<String, QueuedMessage>>,
    notify: Notify,
    settings: QueueSettings,
}

impl MemoryWorkQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            messages: Mutex::new(BTreeMap::new()),
            notify: Notify::new(),
            settings,
        }
    }

    /// Number of messages held, visible or not
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Bodies of every held message, in send order
    pub fn bodies(&self) -> Vec<String> {
        self.messages
            .lock()
            .values()
            .map(|message| message.body.clone())
            .collect()
    }

    fn try_receive(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_ms();
        let mut messages = self.messages.lock();

        let mut exhausted = Vec::new();
        let mut leased = None;
        for (id, message) in messages.iter() {
            if !message.is_visible(now) {
                continue;
            }
            if message.is_exhausted(self.settings.max_receive_count) {
                exhausted.push(id.clone());
                continue;
            }
            leased = Some(message.leased(now, self.settings.visibility_timeout));
            break;
        }

        for id in exhausted {
            if let Some(dropped) = messages.remove(&id) {
                warn!(
                    message_id = %dropped.id,
                    receive_count = dropped.receive_count,
                    "Dropping message after maximum receive count"
                );
            }
        }

        let Some(leased) = leased else {
            return Ok(None);
        };
        let delivery = leased.to_delivery();
        messages.insert(leased.id.clone(), leased);
        Ok(Some(delivery))
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let message = QueuedMessage::new(body, now_ms());
        let id = message.id.clone();
        self.messages.lock().insert(id.clone(), message);
        self.notify.notify_one();
        debug!(message_id = %id, "Message sent");
        Ok(id)
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        long_poll(&self.notify, wait, self.settings.poll_interval, || {
            self.try_receive()
        })
        .await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut messages = self.messages.lock();
        let current = messages
            .get(&delivery.message_id)
            .ok_or_else(|| QueueError::MessageNotFound(delivery.message_id.clone()))?;
        if current.receipt.as_deref() != Some(delivery.receipt.as_str()) {
            return Err(QueueError::StaleReceipt(delivery.message_id.clone()));
        }
        messages.remove(&delivery.message_id);
        debug!(message_id = %delivery.message_id, "Message acknowledged");
        Ok(())
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let now = now_ms();
        let messages = self.messages.lock();
        let visible = messages.values().filter(|m| m.is_visible(now)).count();
        Ok(QueueStats {
            visible,
            in_flight: messages.len() - visible,
        })
    }

    fn queue_name(&self) -> &str {
        "memory"
    }
}

//! Work Queue
//!
//! At-least-once queue with a per-message visibility timeout. A received
//! message stays hidden from other consumers until its visibility timeout
//! elapses; if it has not been acknowledged by then it is delivered again
//! with a fresh receipt. Retry is entirely the queue's redelivery: consumers
//! keep no retry counters of their own.

pub mod memory;
mod record;
pub mod sled_queue;

pub use memory::MemoryWorkQueue;
pub use sled_queue::SledWorkQueue;

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};

/// One delivery of a queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    /// Handle identifying this delivery; required to acknowledge
    pub receipt: String,
    pub body: String,
    /// 1 on first delivery, incremented on every redelivery
    pub receive_count: u32,
    pub sent_at: DateTime<Utc>,
}

/// Point-in-time queue counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages a `receive` could return now
    pub visible: usize,
    /// Messages hidden by an unexpired visibility timeout
    pub in_flight: usize,
}

/// Queue behaviour shared by every implementation
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub visibility_timeout: Duration,
    /// Drop a message once it has been received this many times
    pub max_receive_count: Option<u32>,
    /// Re-check interval while long-polling
    pub poll_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(300),
            max_receive_count: None,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Work queue capability
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Durably enqueue `body`, returning the message id.
    async fn send(&self, body: String) -> Result<String, QueueError>;

    /// Receive one visible message, waiting up to `wait` for one to appear.
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Delete the delivered message. Fails with `StaleReceipt` if the
    /// message was redelivered since `delivery` was handed out.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Queue name for logs
    fn queue_name(&self) -> &str;
}

/// Repeat `attempt` until it yields a delivery or `wait` runs out.
/// Sends wake the poller early through `notify`.
pub(crate) async fn long_poll<F>(
    notify: &Notify,
    wait: Duration,
    poll_interval: Duration,
    mut attempt: F,
) -> Result<Option<Delivery>, QueueError>
where
    F: FnMut() -> Result<Option<Delivery>, QueueError>,
{
    let deadline = Instant::now() + wait;
    loop {
        if let Some(delivery) = attempt()? {
            return Ok(Some(delivery));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = notify.notified() => {}
            _ = sleep(nap) => {}
        }
    }
}

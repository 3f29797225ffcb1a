//! Stored form of a queued message and its lease transitions.

use crate::queue::Delivery;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QueuedMessage {
    pub id: String,
    pub body: String,
    pub sent_at_ms: i64,
    pub receive_count: u32,
    /// Hidden until this instant (epoch millis)
    pub visible_at_ms: i64,
    /// Receipt of the latest delivery
    pub receipt: Option<String>,
}

impl QueuedMessage {
    pub fn new(body: String, now_ms: i64) -> Self {
        // Zero-padded send time first so key order follows send order
        let id = format!("{:020}-{}", now_ms.max(0), uuid::Uuid::new_v4().simple());
        Self {
            id,
            body,
            sent_at_ms: now_ms,
            receive_count: 0,
            visible_at_ms: now_ms,
            receipt: None,
        }
    }

    pub fn is_visible(&self, now_ms: i64) -> bool {
        self.visible_at_ms <= now_ms
    }

    /// True once the message has used up its allowed receives.
    pub fn is_exhausted(&self, max_receive_count: Option<u32>) -> bool {
        max_receive_count.is_some_and(|max| self.receive_count >= max)
    }

    /// New state for a delivery starting at `now_ms`.
    pub fn leased(&self, now_ms: i64, visibility_timeout: Duration) -> Self {
        let timeout_ms = i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX);
        Self {
            receive_count: self.receive_count + 1,
            visible_at_ms: now_ms.saturating_add(timeout_ms),
            receipt: Some(uuid::Uuid::new_v4().to_string()),
            ..self.clone()
        }
    }

    pub fn to_delivery(&self) -> Delivery {
        Delivery {
            message_id: self.id.clone(),
            receipt: self.receipt.clone().unwrap_or_default(),
            body: self.body.clone(),
            receive_count: self.receive_count,
            sent_at: Utc
                .timestamp_millis_opt(self.sent_at_ms)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

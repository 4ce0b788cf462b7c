//! In-memory queue backend.
//!
//! Implements [`QueueClient`] over process-local state: visibility timeouts,
//! receive counts and FIFO content deduplication behave like the real queue,
//! which makes dispatcher and scan behaviour testable without infrastructure.
//! Not for production use.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::messaging::queue::{MessageReceipt, OutboundMessage, QueueClient, QueueMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    attributes: HashMap<String, String>,
    receive_count: u32,
    visible_at: Instant,
    enqueued_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    /// Deduplication id -> message id of the accepted send.
    dedup: HashMap<String, String>,
    /// Every accepted (non-deduplicated) send, in order.
    sends: Vec<OutboundMessage>,
}

#[derive(Debug, Default)]
struct Inner {
    queues: HashMap<String, QueueState>,
    counter: u64,
}

/// Process-local [`QueueClient`] with FIFO semantics.
#[derive(Debug, Default)]
pub struct InMemoryQueueClient {
    inner: Mutex<Inner>,
}

impl InMemoryQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently in `queue`, leased or not, without receiving them.
    pub fn peek_all(&self, queue: &str) -> Vec<QueueMessage> {
        let inner = self.inner.lock();
        inner
            .queues
            .get(queue)
            .map(|state| {
                state
                    .messages
                    .iter()
                    .map(|stored| QueueMessage {
                        id: stored.id.clone(),
                        receipt: MessageReceipt::Token(stored.id.clone()),
                        body: stored.body.clone(),
                        attributes: stored.attributes.clone(),
                        receive_count: stored.receive_count,
                        enqueued_at: Some(stored.enqueued_at),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, queue: &str) -> usize {
        let inner = self.inner.lock();
        inner.queues.get(queue).map_or(0, |s| s.messages.len())
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Accepted sends to `queue`, duplicates excluded, in publish order.
    pub fn sends(&self, queue: &str) -> Vec<OutboundMessage> {
        let inner = self.inner.lock();
        inner
            .queues
            .get(queue)
            .map(|s| s.sends.clone())
            .unwrap_or_default()
    }

    fn try_receive(
        &self,
        queue: &str,
        max_messages: i32,
        visibility_timeout: Duration,
    ) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let state = inner.queues.entry(queue.to_string()).or_default();

        let mut received = Vec::new();
        for stored in state.messages.iter_mut() {
            if received.len() >= max_messages as usize {
                break;
            }
            if stored.visible_at > now {
                continue;
            }
            stored.visible_at = now + visibility_timeout;
            stored.receive_count += 1;
            received.push(QueueMessage {
                id: stored.id.clone(),
                receipt: MessageReceipt::Token(stored.id.clone()),
                body: stored.body.clone(),
                attributes: stored.attributes.clone(),
                receive_count: stored.receive_count,
                enqueued_at: Some(stored.enqueued_at),
            });
        }
        received
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        visibility_timeout: Duration,
        poll_wait: Duration,
        token: &CancellationToken,
    ) -> Result<Vec<QueueMessage>> {
        if token.is_cancelled() {
            return Ok(Vec::new());
        }

        let batch = self.try_receive(queue, max_messages, visibility_timeout);
        if !batch.is_empty() || poll_wait.is_zero() {
            return Ok(batch);
        }

        tokio::select! {
            _ = token.cancelled() => Ok(Vec::new()),
            _ = tokio::time::sleep(poll_wait) => {
                Ok(self.try_receive(queue, max_messages, visibility_timeout))
            }
        }
    }

    async fn delete(&self, queue: &str, receipt: &MessageReceipt) -> Result<()> {
        let id = match receipt {
            MessageReceipt::Token(id) => id.clone(),
            MessageReceipt::Numeric(n) => n.to_string(),
        };
        let mut inner = self.inner.lock();
        let state = inner
            .queues
            .get_mut(queue)
            .ok_or_else(|| SyncError::Queue(format!("unknown queue '{queue}'")))?;
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        if state.messages.len() == before {
            return Err(SyncError::Queue(format!(
                "no message '{id}' in queue '{queue}'"
            )));
        }
        Ok(())
    }

    async fn send(&self, queue: &str, message: &OutboundMessage) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let id = format!("mem-{}", inner.counter);
        let state = inner.queues.entry(queue.to_string()).or_default();

        if let Some(dedup_id) = message.deduplication_id() {
            if let Some(existing) = state.dedup.get(dedup_id) {
                // Within the dedup window the send is accepted but no new
                // message is stored.
                return Ok(existing.clone());
            }
            state.dedup.insert(dedup_id.to_string(), id.clone());
        }

        state.sends.push(message.clone());
        state.messages.push_back(StoredMessage {
            id: id.clone(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            receive_count: 0,
            visible_at: Instant::now(),
            enqueued_at: Utc::now(),
        });
        Ok(id)
    }

    async fn extend_visibility(
        &self,
        queue: &str,
        receipt: &MessageReceipt,
        timeout: Duration,
    ) -> Result<()> {
        let id = match receipt {
            MessageReceipt::Token(id) => id.clone(),
            MessageReceipt::Numeric(n) => n.to_string(),
        };
        let mut inner = self.inner.lock();
        let state = inner
            .queues
            .get_mut(queue)
            .ok_or_else(|| SyncError::Queue(format!("unknown queue '{queue}'")))?;
        let stored = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| SyncError::Queue(format!("no message '{id}' in queue '{queue}'")))?;
        stored.visible_at = Instant::now() + timeout;
        Ok(())
    }
}

impl InMemoryQueueClient {
    /// Seed a queue with a raw body and explicit attributes, as if a
    /// notification had been delivered from outside.
    pub async fn seed(
        &self,
        queue: &str,
        body: impl Into<String>,
        attrs: &[(&str, &str)],
    ) -> String {
        let mut message = OutboundMessage {
            body: body.into(),
            attributes: HashMap::new(),
        };
        for (name, value) in attrs {
            message = message.with_attribute(name, value.to_string());
        }
        self.send(queue, &message).await.unwrap_or_default()
    }
}

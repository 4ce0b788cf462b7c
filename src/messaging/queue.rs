//! Queue message types and the transport abstraction.
//!
//! [`QueueClient`] is the narrow seam between the sync engine and whatever
//! queue actually carries messages (pgmq in production, an in-memory fake in
//! tests). Everything above it works in terms of [`QueueMessage`] and
//! [`OutboundMessage`] and never sees backend handles directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::attributes;
use crate::error::Result;

/// Backend-specific handle used to delete or re-time a received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageReceipt {
    /// pgmq message id.
    Numeric(i64),
    /// Opaque receipt token (used by the in-memory backend and tests).
    Token(String),
}

impl MessageReceipt {
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            MessageReceipt::Numeric(id) => Some(*id),
            MessageReceipt::Token(_) => None,
        }
    }
}

/// A message as received from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Queue-assigned message id.
    pub id: String,
    /// Handle for delete / visibility operations on this delivery.
    pub receipt: MessageReceipt,
    /// Raw body, usually a JSON notification envelope.
    pub body: String,
    /// Transport attributes (subject, correlation id, FIFO metadata).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// How many times this message has been delivered, including this one.
    pub receive_count: u32,
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl QueueMessage {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A message to be published, with its transport attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: HashMap<String, String>,
}

impl OutboundMessage {
    /// Create a message stamped with the standard subject, correlation and
    /// publish-time attributes.
    pub fn new(subject: &str, correlation_id: &str, body: String) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(attributes::SUBJECT.to_string(), subject.to_string());
        attrs.insert(
            attributes::CORRELATION_ID.to_string(),
            correlation_id.to_string(),
        );
        attrs.insert(
            attributes::EVENT_TIME_UTC.to_string(),
            Utc::now().to_rfc3339(),
        );
        Self {
            body,
            attributes: attrs,
        }
    }

    /// Attach FIFO routing attributes.
    pub fn with_fifo(mut self, group_id: String, deduplication_id: String) -> Self {
        self.attributes
            .insert(attributes::MESSAGE_GROUP_ID.to_string(), group_id);
        self.attributes.insert(
            attributes::MESSAGE_DEDUPLICATION_ID.to_string(),
            deduplication_id,
        );
        self
    }

    pub fn with_attribute(mut self, name: &str, value: String) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.attribute(attributes::SUBJECT)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.attribute(attributes::MESSAGE_GROUP_ID)
    }

    pub fn deduplication_id(&self) -> Option<&str> {
        self.attribute(attributes::MESSAGE_DEDUPLICATION_ID)
    }
}

/// Transport operations the sync engine needs from a queue backend.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `max_messages` from `queue`, hiding them from other
    /// consumers for `visibility_timeout`. Waits up to `poll_wait` for a
    /// message to arrive before returning an empty batch.
    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        visibility_timeout: Duration,
        poll_wait: Duration,
        token: &CancellationToken,
    ) -> Result<Vec<QueueMessage>>;

    /// Permanently remove a received message.
    async fn delete(&self, queue: &str, receipt: &MessageReceipt) -> Result<()>;

    /// Publish a message, returning the queue-assigned id.
    async fn send(&self, queue: &str, message: &OutboundMessage) -> Result<String>;

    /// Push the visibility timeout of a received message further out.
    async fn extend_visibility(
        &self,
        queue: &str,
        receipt: &MessageReceipt,
        timeout: Duration,
    ) -> Result<()>;
}

/// Something that can publish outbound messages.
///
/// Scan and handler code depends on this rather than on [`QueueClient`] so
/// tests can capture published messages without a queue.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage, token: &CancellationToken) -> Result<()>;
}

/// Publishes to a fixed queue through a [`QueueClient`].
pub struct QueuePublisher {
    client: Arc<dyn QueueClient>,
    queue: String,
}

impl QueuePublisher {
    pub fn new(client: Arc<dyn QueueClient>, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl MessagePublisher for QueuePublisher {
    async fn publish(&self, message: OutboundMessage, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(crate::error::SyncError::Cancelled);
        }
        let message_id = self.client.send(&self.queue, &message).await?;
        debug!(
            queue = %self.queue,
            message_id = %message_id,
            subject = message.subject().unwrap_or("<none>"),
            "📤 Published outbound message"
        );
        Ok(())
    }
}

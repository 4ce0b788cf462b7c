//! Dead letter routing for messages that failed non-retryably.
//!
//! A routed message keeps its original body and attributes and gains the
//! `DLQ_*` failure metadata so operators can see what happened without
//! correlating logs. Routing sends to the dead letter queue first and only
//! then deletes the original; a crash in between leaves a duplicate in the
//! DLQ rather than losing the message.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::constants::dlq;
use crate::error::{Result, SyncError};
use crate::messaging::queue::{OutboundMessage, QueueClient, QueueMessage};

pub struct DeadLetterRouter {
    client: Arc<dyn QueueClient>,
    source_queue: String,
    dead_letter_queue: Option<String>,
}

impl DeadLetterRouter {
    pub fn new(
        client: Arc<dyn QueueClient>,
        source_queue: impl Into<String>,
        dead_letter_queue: Option<String>,
    ) -> Self {
        Self {
            client,
            source_queue: source_queue.into(),
            dead_letter_queue,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dead_letter_queue.is_some()
    }

    /// Move a failed message to the dead letter queue.
    ///
    /// Returns `Ok(false)` when no dead letter queue is configured, leaving
    /// the message on the source queue for visibility-timeout redelivery.
    pub async fn route(&self, raw: &QueueMessage, error: &SyncError) -> Result<bool> {
        let Some(dlq_name) = self.dead_letter_queue.as_deref() else {
            debug!(
                message_id = %raw.id,
                "No dead letter queue configured, leaving message for redelivery"
            );
            return Ok(false);
        };

        let dead_message = build_dead_letter_message(raw, error);
        self.client.send(dlq_name, &dead_message).await?;
        self.client.delete(&self.source_queue, &raw.receipt).await?;

        warn!(
            message_id = %raw.id,
            queue = %self.source_queue,
            dead_letter_queue = %dlq_name,
            reason = error.kind_name(),
            receive_count = raw.receive_count,
            "⚠️ Moved message to dead letter queue"
        );
        Ok(true)
    }
}

fn build_dead_letter_message(raw: &QueueMessage, error: &SyncError) -> OutboundMessage {
    let mut attributes = raw.attributes.clone();
    attributes.insert(
        dlq::FAILURE_REASON.to_string(),
        error.kind_name().to_string(),
    );
    attributes.insert(
        dlq::FAILURE_MESSAGE.to_string(),
        truncate_chars(&error.to_string(), dlq::FAILURE_MESSAGE_MAX_LEN),
    );
    attributes.insert(dlq::ORIGINAL_MESSAGE_ID.to_string(), raw.id.clone());
    attributes.insert(
        dlq::RECEIVE_COUNT.to_string(),
        raw.receive_count.to_string(),
    );
    attributes.insert(
        dlq::FAILURE_TIMESTAMP.to_string(),
        Utc::now().to_rfc3339(),
    );

    OutboundMessage {
        body: raw.body.clone(),
        attributes,
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

//! pgmq-backed queue client.
//!
//! Production transport: messages live in PostgreSQL via the pgmq extension.
//! Each queue row stores a `{body, attributes}` JSON payload so transport
//! attributes survive the trip. Visibility extension goes through the
//! `pgmq.set_vt()` SQL function; deduplication is a best-effort check against
//! the queue table, keyed by the `MessageDeduplicationId` attribute.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use pgmq::PGMQueue;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::attributes;
use crate::error::{Result, SyncError};
use crate::messaging::queue::{MessageReceipt, OutboundMessage, QueueClient, QueueMessage};

/// JSON shape of a message row in pgmq.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePayload {
    body: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// [`QueueClient`] over the pgmq extension.
#[derive(Debug, Clone)]
pub struct PgmqQueueClient {
    pgmq: PGMQueue,
}

impl PgmqQueueClient {
    /// Connect using a database url.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("🚀 Connecting to pgmq");
        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| SyncError::Queue(format!("pgmq connect failed: {e}")))?;
        info!("✅ Connected to pgmq");
        Ok(Self { pgmq })
    }

    /// Reuse an existing connection pool (BYOP - Bring Your Own Pool).
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        info!("🚀 Creating pgmq client with shared connection pool");
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    /// Create a queue if it does not exist.
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        validate_queue_name(queue_name)?;
        debug!("📋 Creating queue: {}", queue_name);
        self.pgmq
            .create(queue_name)
            .await
            .map_err(|e| SyncError::Queue(format!("failed to create queue {queue_name}: {e}")))?;
        info!("✅ Queue ready: {}", queue_name);
        Ok(())
    }

    /// Underlying connection pool, for callers that share it.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pgmq.connection
    }

    async fn read_once(
        &self,
        queue: &str,
        max_messages: i32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let vt = visibility_timeout.as_secs().min(i32::MAX as u64) as i32;
        let messages = self
            .pgmq
            .read_batch::<serde_json::Value>(queue, Some(vt), max_messages)
            .await
            .map_err(|e| SyncError::Queue(format!("failed to read from {queue}: {e}")))?
            .unwrap_or_default();

        Ok(messages.into_iter().map(to_queue_message).collect())
    }

    /// Look up a prior send with the same deduplication id, if any.
    async fn find_duplicate(&self, queue: &str, dedup_id: &str) -> Result<Option<i64>> {
        // Table name cannot be bound; queue names are validated to a safe
        // character set before use.
        let sql = format!(
            "SELECT msg_id FROM pgmq.q_{queue} \
             WHERE message->'attributes'->>'{}' = $1 LIMIT 1",
            attributes::MESSAGE_DEDUPLICATION_ID
        );
        let existing: Option<i64> = sqlx::query_scalar(&sql)
            .bind(dedup_id)
            .fetch_optional(&self.pgmq.connection)
            .await
            .map_err(|e| SyncError::Queue(format!("dedup lookup failed on {queue}: {e}")))?;
        Ok(existing)
    }
}

fn to_queue_message(msg: pgmq::types::Message<serde_json::Value>) -> QueueMessage {
    // Foreign producers may enqueue bare JSON; treat anything that is not
    // wire-shaped as an attribute-less body.
    let (body, attrs) = match serde_json::from_value::<WirePayload>(msg.message.clone()) {
        Ok(wire) => (wire.body, wire.attributes),
        Err(_) => (msg.message.to_string(), HashMap::new()),
    };
    QueueMessage {
        id: msg.msg_id.to_string(),
        receipt: MessageReceipt::Numeric(msg.msg_id),
        body,
        attributes: attrs,
        receive_count: msg.read_ct.max(0) as u32,
        enqueued_at: Some(msg.enqueued_at),
    }
}

fn numeric_receipt(receipt: &MessageReceipt) -> Result<i64> {
    receipt.as_numeric().ok_or_else(|| {
        SyncError::Queue("pgmq operations require a numeric message receipt".to_string())
    })
}

fn validate_queue_name(queue: &str) -> Result<()> {
    let valid = !queue.is_empty()
        && queue
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::Queue(format!("invalid queue name '{queue}'")))
    }
}

#[async_trait]
impl QueueClient for PgmqQueueClient {
    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        visibility_timeout: Duration,
        poll_wait: Duration,
        token: &CancellationToken,
    ) -> Result<Vec<QueueMessage>> {
        validate_queue_name(queue)?;
        if token.is_cancelled() {
            return Ok(Vec::new());
        }

        let batch = self.read_once(queue, max_messages, visibility_timeout).await?;
        if !batch.is_empty() || poll_wait.is_zero() {
            return Ok(batch);
        }

        // pgmq has no server-side long poll, so wait client-side and retry
        // once before handing an empty batch back to the caller's loop.
        tokio::select! {
            _ = token.cancelled() => Ok(Vec::new()),
            _ = tokio::time::sleep(poll_wait) => {
                self.read_once(queue, max_messages, visibility_timeout).await
            }
        }
    }

    async fn delete(&self, queue: &str, receipt: &MessageReceipt) -> Result<()> {
        let msg_id = numeric_receipt(receipt)?;
        debug!("🗑️ Deleting message {} from queue: {}", msg_id, queue);
        self.pgmq
            .delete(queue, msg_id)
            .await
            .map_err(|e| SyncError::Queue(format!("failed to delete message {msg_id}: {e}")))?;
        Ok(())
    }

    async fn send(&self, queue: &str, message: &OutboundMessage) -> Result<String> {
        validate_queue_name(queue)?;

        if let Some(dedup_id) = message.deduplication_id() {
            if let Some(existing) = self.find_duplicate(queue, dedup_id).await? {
                debug!(
                    queue = %queue,
                    msg_id = existing,
                    "Deduplicated send, message already queued"
                );
                return Ok(existing.to_string());
            }
        }

        let wire = WirePayload {
            body: message.body.clone(),
            attributes: message.attributes.clone(),
        };
        let payload = serde_json::to_value(&wire)
            .map_err(|e| SyncError::Queue(format!("failed to encode message: {e}")))?;
        let msg_id = self
            .pgmq
            .send(queue, &payload)
            .await
            .map_err(|e| SyncError::Queue(format!("failed to send to {queue}: {e}")))?;
        debug!("📤 Message sent to queue: {} with id: {}", queue, msg_id);
        Ok(msg_id.to_string())
    }

    async fn extend_visibility(
        &self,
        queue: &str,
        receipt: &MessageReceipt,
        timeout: Duration,
    ) -> Result<()> {
        validate_queue_name(queue)?;
        let msg_id = numeric_receipt(receipt)?;
        let vt = timeout.as_secs().min(i32::MAX as u64) as i32;
        sqlx::query("SELECT * FROM pgmq.set_vt($1, $2, $3)")
            .bind(queue)
            .bind(msg_id)
            .bind(vt)
            .fetch_optional(&self.pgmq.connection)
            .await
            .map_err(|e| {
                SyncError::Queue(format!("failed to extend visibility of {msg_id}: {e}"))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name_validation() {
        assert!(validate_queue_name("bridge_sync_inbound").is_ok());
        assert!(validate_queue_name("q1").is_ok());
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("bad-name").is_err());
        assert!(validate_queue_name("drop table; --").is_err());
    }

    #[test]
    fn test_wire_payload_round_trip() {
        let mut attrs = HashMap::new();
        attrs.insert("Subject".to_string(), "HoldingUpdate".to_string());
        let wire = WirePayload {
            body: "{\"x\":1}".to_string(),
            attributes: attrs,
        };
        let value = serde_json::to_value(&wire).unwrap();
        let back: WirePayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.body, "{\"x\":1}");
        assert_eq!(back.attributes.get("Subject").unwrap(), "HoldingUpdate");
    }

    #[test]
    fn test_foreign_payload_falls_back_to_bare_body() {
        let msg = pgmq::types::Message {
            msg_id: 7,
            vt: chrono::Utc::now(),
            read_ct: 2,
            enqueued_at: chrono::Utc::now(),
            message: serde_json::json!({"plain": true}),
        };
        let qm = to_queue_message(msg);
        assert_eq!(qm.id, "7");
        assert_eq!(qm.receipt, MessageReceipt::Numeric(7));
        assert_eq!(qm.receive_count, 2);
        assert!(qm.attributes.is_empty());
        assert!(qm.body.contains("plain"));
    }

    // Requires a PostgreSQL instance with the pgmq extension; run with
    // DATABASE_URL set and --ignored.
    #[tokio::test]
    #[ignore]
    async fn test_send_receive_delete_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let client = PgmqQueueClient::new(&url).await.unwrap();
        let queue = "bridgesync_pgmq_test";
        client.create_queue(queue).await.unwrap();

        let token = CancellationToken::new();
        let out = OutboundMessage::new("HoldingUpdate", "corr", "{\"n\":1}".to_string());
        client.send(queue, &out).await.unwrap();

        let batch = client
            .receive(queue, 10, Duration::from_secs(30), Duration::ZERO, &token)
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].attribute("Subject"), Some("HoldingUpdate"));
        client.delete(queue, &batch[0].receipt).await.unwrap();
    }
}

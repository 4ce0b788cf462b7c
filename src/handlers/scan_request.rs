//! Scan request handling.
//!
//! A `ScanRequest` message asks for one full scan run of a bridge dataset.
//! The run executes under the per-source scan lease, so concurrent requests
//! for the same source coalesce: whoever loses the lease race drops the
//! request and relies on the holder's run. An interrupted run returns an
//! error so the queue redelivers the request and a later run starts over;
//! FIFO deduplication downstream absorbs the repeated update messages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bridge::BridgeClient;
use crate::config::{LockConfig, ScansConfig};
use crate::constants::{subjects, ScanKind};
use crate::error::{Result, SyncError};
use crate::events::EventPublisher;
use crate::locking::LockRunner;
use crate::messaging::envelope::UnwrappedMessage;
use crate::messaging::queue::MessagePublisher;
use crate::models::messages::ScanRequestMessage;
use crate::orchestration::{HoldingScan, PartyScan, ScanCursor, ScanPager};
use crate::registry::MessageHandler;

/// Handles `ScanRequest`: runs one on-demand scan under the scan lease.
pub struct ScanRequestHandler {
    bridge: Arc<dyn BridgeClient>,
    publisher: Arc<dyn MessagePublisher>,
    events: EventPublisher,
    lock_runner: Arc<LockRunner>,
    scans: ScansConfig,
    lock: LockConfig,
}

impl ScanRequestHandler {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        publisher: Arc<dyn MessagePublisher>,
        events: EventPublisher,
        lock_runner: Arc<LockRunner>,
        scans: ScansConfig,
        lock: LockConfig,
    ) -> Self {
        Self {
            bridge,
            publisher,
            events,
            lock_runner,
            scans,
            lock,
        }
    }
}

#[async_trait]
impl MessageHandler for ScanRequestHandler {
    fn subject(&self) -> &str {
        subjects::SCAN_REQUEST
    }

    async fn handle(&self, message: &UnwrappedMessage, token: &CancellationToken) -> Result<()> {
        let parsed = ScanRequestMessage::parse(&message.payload)?;
        if parsed.source.trim().is_empty() {
            return Err(SyncError::MalformedPayload(
                "scan request source is blank".to_string(),
            ));
        }
        // Requests published by schedulers carry no correlation id; mint one
        // so every update message from this run still shares a trace.
        let correlation_id = if message.correlation_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            message.correlation_id.clone()
        };

        let kind = parsed.scan_kind;
        let key = self.lock.scan_lock_key(&parsed.source);
        let bridge = self.bridge.clone();
        let publisher = self.publisher.clone();
        let events = self.events.clone();
        let config = self.scans.for_kind(kind).clone();
        let source = parsed.source.clone();

        let outcome = self
            .lock_runner
            .run_exclusive(&key, token, move |scan_token| async move {
                let pager = ScanPager::new(publisher, events, config);
                let mut cursor = ScanCursor::new();
                match kind {
                    ScanKind::BulkScan => {
                        let scan = HoldingScan::new(bridge, source);
                        pager.run(&scan, &mut cursor, &correlation_id, &scan_token).await
                    }
                    ScanKind::PartyScan => {
                        let scan = PartyScan::new(bridge, source);
                        pager.run(&scan, &mut cursor, &correlation_id, &scan_token).await
                    }
                }
            })
            .await?;

        match outcome {
            None => {
                info!(
                    source = %parsed.source,
                    kind = %kind,
                    "Scan lease held elsewhere, coalescing request"
                );
                Ok(())
            }
            Some(stats) if !stats.completed => {
                warn!(
                    source = %parsed.source,
                    kind = %kind,
                    published = stats.published,
                    "Scan interrupted, requesting redelivery"
                );
                Err(SyncError::Cancelled)
            }
            Some(stats) => {
                info!(
                    source = %parsed.source,
                    kind = %kind,
                    published = stats.published,
                    pages = stats.pages,
                    "Scan request served"
                );
                Ok(())
            }
        }
    }
}

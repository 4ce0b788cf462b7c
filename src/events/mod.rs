//! Dispatch observers and lifecycle events published by the sync engine.
//!
//! Message outcomes, scan progress, reconciliation results and lock
//! transitions are broadcast so embedding hosts can watch the engine without
//! coupling to its internals. Publishing never blocks and never fails: with
//! no subscribers an event is simply dropped.
//!
//! The dispatcher notifies a [`DispatchObserver`] exactly once per settled
//! message; [`DispatchEventPublisher`] is the stock observer that forwards
//! those notifications onto the broadcast channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::constants::ScanKind;
use crate::error::SyncError;
use crate::messaging::envelope::UnwrappedMessage;
use crate::messaging::queue::QueueMessage;

/// Something observable happened inside the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A dispatched message was handled successfully and acknowledged.
    MessageHandled {
        message_id: String,
        subject: String,
        correlation_id: String,
    },
    /// A dispatched message failed and was left for redelivery or moved to
    /// the dead letter queue.
    MessageFailed {
        message_id: String,
        error_kind: String,
        error: String,
    },
    /// A scan page finished: identifiers were published for update.
    ScanPageProcessed {
        source: String,
        scan_kind: ScanKind,
        page_returned: i64,
        published: usize,
        skip: i64,
    },
    /// A scan walked off the end of the dataset or hit its batch limit.
    ScanCompleted {
        source: String,
        scan_kind: ScanKind,
        total_published: usize,
        pages: u32,
    },
    /// A reconciliation applied its plan against the store.
    ReconciliationApplied {
        entity: String,
        upserts: usize,
        deletes: usize,
    },
    /// The scan lock was acquired by this process.
    LockAcquired { key: String },
    /// The scan lock was released.
    LockReleased { key: String },
    /// A lock renewal failed while guarded work was still running.
    LockRenewalFailed { key: String },
}

impl SyncEvent {
    /// Stable event name for logging and host-side filtering.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::MessageHandled { .. } => "dispatch.message_handled",
            SyncEvent::MessageFailed { .. } => "dispatch.message_failed",
            SyncEvent::ScanPageProcessed { .. } => "scan.page_processed",
            SyncEvent::ScanCompleted { .. } => "scan.completed",
            SyncEvent::ReconciliationApplied { .. } => "reconciliation.applied",
            SyncEvent::LockAcquired { .. } => "lock.acquired",
            SyncEvent::LockReleased { .. } => "lock.released",
            SyncEvent::LockRenewalFailed { .. } => "lock.renewal_failed",
        }
    }
}

/// A published event with its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event: SyncEvent,
    pub published_at: DateTime<Utc>,
}

/// Broadcast publisher for [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: SyncEvent) {
        let published = PublishedEvent {
            event,
            published_at: Utc::now(),
        };
        let _ = self.sender.send(published);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Notified by the dispatcher exactly once per settled message.
///
/// Cancellation mid-handle is not reported through either method: the
/// message is simply left for redelivery, and an interrupted dispatch is not
/// a failure.
#[async_trait]
pub trait DispatchObserver: Send + Sync {
    /// The handler succeeded and the message was acknowledged.
    async fn message_handled(&self, message: &UnwrappedMessage, raw: &QueueMessage);

    /// The dispatch failed; the message was left for redelivery or moved to
    /// the dead letter queue. `message_id` is the raw queue message id, since
    /// failures can occur before unwrapping succeeds.
    async fn message_failed(&self, message_id: &str, error: &SyncError, raw: &QueueMessage);
}

/// Stock observer that forwards dispatch outcomes onto the event channel.
#[derive(Debug, Clone)]
pub struct DispatchEventPublisher {
    events: EventPublisher,
}

impl DispatchEventPublisher {
    pub fn new(events: EventPublisher) -> Self {
        Self { events }
    }
}

#[async_trait]
impl DispatchObserver for DispatchEventPublisher {
    async fn message_handled(&self, message: &UnwrappedMessage, _raw: &QueueMessage) {
        self.events.publish(SyncEvent::MessageHandled {
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            correlation_id: message.correlation_id.clone(),
        });
    }

    async fn message_failed(&self, message_id: &str, error: &SyncError, _raw: &QueueMessage) {
        self.events.publish(SyncEvent::MessageFailed {
            message_id: message_id.to_string(),
            error_kind: error.kind_name().to_string(),
            error: error.to_string(),
        });
    }
}

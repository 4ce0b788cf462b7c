//! End-to-end dispatch: inbound queue through handler to settled outcome.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bridgesync_core::bridge::InMemoryBridgeClient;
use bridgesync_core::config::BridgeSyncConfig;
use bridgesync_core::constants::{dlq, subjects};
use bridgesync_core::error::{Result, SyncError};
use bridgesync_core::events::EventPublisher;
use bridgesync_core::handlers::{build_registry, SyncStores};
use bridgesync_core::messaging::{
    InMemoryQueueClient, MessageDispatcher, QueuePublisher, UnwrappedMessage,
};
use bridgesync_core::reconciliation::Filter;
use bridgesync_core::registry::{HandlerRegistry, MessageHandler};

use common::{drain, lock_runner, seeded_bridge, test_config, RecordingObserver};

struct Stack {
    dispatcher: MessageDispatcher,
    queue: Arc<InMemoryQueueClient>,
    bridge: Arc<InMemoryBridgeClient>,
    stores: SyncStores,
    observer: Arc<RecordingObserver>,
    config: BridgeSyncConfig,
}

fn stack() -> Stack {
    let config = test_config();
    let bridge = seeded_bridge();
    let queue = Arc::new(InMemoryQueueClient::new());
    let stores = SyncStores::in_memory();
    let events = EventPublisher::default();
    let publisher = Arc::new(QueuePublisher::new(
        queue.clone(),
        &config.messaging.outbound_queue,
    ));
    let registry = build_registry(
        bridge.clone(),
        stores.clone(),
        publisher,
        events.clone(),
        lock_runner(events),
        &config,
    );
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = MessageDispatcher::new(queue.clone(), registry, config.messaging.clone())
        .with_observer(observer.clone());
    Stack {
        dispatcher,
        queue,
        bridge,
        stores,
        observer,
        config,
    }
}

/// Wrap a payload in a notification envelope the way the upstream publisher
/// does.
fn envelope(subject: &str, correlation_id: &str, payload: &str) -> String {
    json!({
        "Type": "Notification",
        "MessageId": Uuid::new_v4().to_string(),
        "Message": payload,
        "MessageAttributes": {
            "Subject": { "Type": "String", "Value": subject },
            "CorrelationId": { "Type": "String", "Value": correlation_id }
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_holding_update_flows_through_to_silver_store() {
    let stack = stack();
    let body = envelope(
        subjects::HOLDING_UPDATE,
        "corr-1",
        "{\"holdingIdentifier\":\"SAM:12/345/6789\"}",
    );
    stack
        .queue
        .seed(&stack.config.messaging.inbound_queue, body, &[])
        .await;

    let stats = drain(&stack.dispatcher, &CancellationToken::new()).await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.dead_lettered, 0);
    assert!(stack.queue.is_empty(&stack.config.messaging.inbound_queue));

    let stored = stack
        .stores
        .silver_holdings
        .find_one(&Filter::new().eq("source", "SAM").eq("cph", "12/345/6789"))
        .await
        .unwrap()
        .expect("holding imported");
    assert_eq!(stored.name.as_deref(), Some("Hill Farm"));

    let handled = stack.observer.handled.lock();
    assert_eq!(handled.len(), 1);
    assert_eq!(handled[0].subject, subjects::HOLDING_UPDATE);
    assert_eq!(handled[0].correlation_id, "corr-1");
}

#[tokio::test]
async fn test_malformed_payload_dead_letters_with_metadata() {
    let stack = stack();
    let body = envelope(subjects::HOLDING_UPDATE, "corr-2", "not json at all");
    let seeded_id = stack
        .queue
        .seed(&stack.config.messaging.inbound_queue, body, &[])
        .await;

    let stats = drain(&stack.dispatcher, &CancellationToken::new()).await;
    assert_eq!(stats.dead_lettered, 1);
    assert!(stack.queue.is_empty(&stack.config.messaging.inbound_queue));

    let dead = stack.queue.peek_all("bridge_sync_dlq");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attribute(dlq::FAILURE_REASON), Some("MalformedPayload"));
    assert_eq!(dead[0].attribute(dlq::ORIGINAL_MESSAGE_ID), Some(seeded_id.as_str()));
    assert!(dead[0].attribute(dlq::FAILURE_MESSAGE).is_some());
    assert!(dead[0].attribute(dlq::FAILURE_TIMESTAMP).is_some());

    assert_eq!(stack.observer.failed_kinds(), vec!["MalformedPayload"]);
    assert!(stack.observer.handled.lock().is_empty());
}

#[tokio::test]
async fn test_null_envelope_message_dead_letters_as_malformed() {
    let stack = stack();
    // A notification with no inner message unwraps to an empty payload,
    // which no handler can parse.
    let body = json!({
        "Type": "Notification",
        "MessageId": "env-null",
        "Message": null,
        "MessageAttributes": {
            "Subject": { "Type": "String", "Value": subjects::HOLDING_UPDATE }
        }
    })
    .to_string();
    stack
        .queue
        .seed(&stack.config.messaging.inbound_queue, body, &[])
        .await;

    let stats = drain(&stack.dispatcher, &CancellationToken::new()).await;
    assert_eq!(stats.dead_lettered, 1);
    let dead = stack.queue.peek_all("bridge_sync_dlq");
    assert_eq!(dead[0].attribute(dlq::FAILURE_REASON), Some("MalformedPayload"));
}

#[tokio::test]
async fn test_unknown_subject_dead_letters_as_handler_not_found() {
    let stack = stack();
    let body = envelope("HerdMovement", "corr-3", "{}");
    stack
        .queue
        .seed(&stack.config.messaging.inbound_queue, body, &[])
        .await;

    let stats = drain(&stack.dispatcher, &CancellationToken::new()).await;
    assert_eq!(stats.dead_lettered, 1);
    let dead = stack.queue.peek_all("bridge_sync_dlq");
    assert_eq!(dead[0].attribute(dlq::FAILURE_REASON), Some("HandlerNotFound"));
}

#[tokio::test]
async fn test_retryable_failure_leaves_message_for_redelivery() {
    let stack = stack();
    stack.bridge.fail_next("503 from upstream");
    let body = envelope(
        subjects::HOLDING_UPDATE,
        "corr-4",
        "{\"holdingIdentifier\":\"12/345/6789\"}",
    );
    stack
        .queue
        .seed(&stack.config.messaging.inbound_queue, body, &[])
        .await;

    let stats = stack
        .dispatcher
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.retrying, 1);
    assert_eq!(stats.dead_lettered, 0);

    // Still on the queue, invisible until the visibility timeout lapses.
    assert_eq!(stack.queue.len(&stack.config.messaging.inbound_queue), 1);
    assert!(stack.queue.peek_all("bridge_sync_dlq").is_empty());
    assert_eq!(stack.observer.failed_kinds(), vec!["Bridge"]);
}

struct MisconfiguredHandler;

#[async_trait]
impl MessageHandler for MisconfiguredHandler {
    fn subject(&self) -> &str {
        subjects::HOLDING_UPDATE
    }

    async fn handle(&self, _message: &UnwrappedMessage, _token: &CancellationToken) -> Result<()> {
        Err(SyncError::Configuration("store connection unset".to_string()))
    }
}

#[tokio::test]
async fn test_unclassified_failure_is_left_alone() {
    let config = test_config();
    let queue = Arc::new(InMemoryQueueClient::new());
    let registry = Arc::new(HandlerRegistry::new());
    registry.register(Arc::new(MisconfiguredHandler));
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = MessageDispatcher::new(queue.clone(), registry, config.messaging.clone())
        .with_observer(observer.clone());

    let body = envelope(subjects::HOLDING_UPDATE, "corr-5", "{}");
    queue
        .seed(&config.messaging.inbound_queue, body, &[])
        .await;

    let stats = dispatcher.poll_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(stats.left, 1);
    assert_eq!(stats.dead_lettered, 0);

    // Neither acknowledged nor dead lettered: an operator decides.
    assert_eq!(queue.len(&config.messaging.inbound_queue), 1);
    assert!(queue.peek_all("bridge_sync_dlq").is_empty());
    assert_eq!(observer.failed_kinds(), vec!["Configuration"]);
}

#[tokio::test]
async fn test_mixed_batch_settles_each_message_independently() {
    let stack = stack();
    let inbound = stack.config.messaging.inbound_queue.clone();
    stack
        .queue
        .seed(
            &inbound,
            envelope(
                subjects::HOLDING_UPDATE,
                "corr-6",
                "{\"holdingIdentifier\":\"98/765/4321\"}",
            ),
            &[],
        )
        .await;
    stack
        .queue
        .seed(&inbound, envelope(subjects::PARTY_UPDATE, "corr-7", "broken"), &[])
        .await;
    stack
        .queue
        .seed(&inbound, envelope("HerdMovement", "corr-8", "{}"), &[])
        .await;

    let stats = drain(&stack.dispatcher, &CancellationToken::new()).await;
    assert_eq!(stats.received, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.dead_lettered, 2);
    assert!(stack.queue.is_empty(&inbound));
    assert_eq!(stack.queue.peek_all("bridge_sync_dlq").len(), 2);
}

//! FIFO grouping and deduplication behavior of outbound update messages.

use std::sync::Arc;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use bridgesync_core::constants::ScanKind;
use bridgesync_core::messaging::fifo::{deduplication_id, group_id};
use bridgesync_core::messaging::{FifoScope, InMemoryQueueClient, MessagePublisher, QueuePublisher};
use bridgesync_core::models::messages::{HoldingUpdateMessage, ScanRequestMessage};

const UPDATES: &str = "updates";

#[test]
fn test_qualified_and_bare_identifiers_group_together() {
    let qualified = HoldingUpdateMessage::new("SAM:12/345/6789", "SAM")
        .to_outbound("corr-1")
        .unwrap();
    let bare = HoldingUpdateMessage::new("12/345/6789", "SAM")
        .to_outbound("corr-1")
        .unwrap();

    // Same holding, same ordering group, regardless of who named it.
    assert_eq!(qualified.group_id(), bare.group_id());
    assert_eq!(qualified.group_id(), Some("CPH_12_345_6789"));

    // Payloads differ, so dedup must not collapse them.
    assert_ne!(qualified.deduplication_id(), bare.deduplication_id());
}

#[test]
fn test_scan_requests_group_per_source_and_kind() {
    let bulk = ScanRequestMessage::new("SAM", ScanKind::BulkScan)
        .to_outbound("corr-1")
        .unwrap();
    let party = ScanRequestMessage::new("SAM", ScanKind::PartyScan)
        .to_outbound("corr-1")
        .unwrap();
    let other_source = ScanRequestMessage::new("CTS", ScanKind::BulkScan)
        .to_outbound("corr-1")
        .unwrap();

    assert_eq!(bulk.group_id(), Some("SYSTEM_SAM_BULK_SCAN"));
    assert_eq!(party.group_id(), Some("SYSTEM_SAM_PARTY_SCAN"));
    assert_eq!(other_source.group_id(), Some("SYSTEM_CTS_BULK_SCAN"));
}

#[tokio::test]
async fn test_identical_republish_deduplicates_on_the_queue() {
    let client = Arc::new(InMemoryQueueClient::new());
    let publisher = QueuePublisher::new(client.clone(), UPDATES);
    let token = CancellationToken::new();

    let message = HoldingUpdateMessage::new("12/345/6789", "SAM");
    publisher
        .publish(message.to_outbound("corr-1").unwrap(), &token)
        .await
        .unwrap();
    publisher
        .publish(message.to_outbound("corr-1").unwrap(), &token)
        .await
        .unwrap();

    // Second publish was accepted but absorbed by the dedup window.
    assert_eq!(client.len(UPDATES), 1);
    assert_eq!(client.sends(UPDATES).len(), 1);
}

#[tokio::test]
async fn test_same_group_different_payloads_both_enqueue() {
    let client = Arc::new(InMemoryQueueClient::new());
    let publisher = QueuePublisher::new(client.clone(), UPDATES);
    let token = CancellationToken::new();

    let first = HoldingUpdateMessage::new("12/345/6789", "SAM");
    let second = HoldingUpdateMessage::new("SAM:12/345/6789", "SAM");
    publisher
        .publish(first.to_outbound("corr-1").unwrap(), &token)
        .await
        .unwrap();
    publisher
        .publish(second.to_outbound("corr-1").unwrap(), &token)
        .await
        .unwrap();

    assert_eq!(client.len(UPDATES), 2);
}

proptest! {
    /// Group ids stay inside the queue-safe charset whatever the identifier
    /// contains.
    #[test]
    fn test_party_group_charset_is_restricted(identifier in "[ -~]{1,40}") {
        prop_assume!(!identifier.trim().is_empty());
        let group = group_id(&FifoScope::Party { identifier: &identifier }).unwrap();
        prop_assert!(group.starts_with("PARTY_"));
        prop_assert!(group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    /// Content hashing is deterministic and fixed-width.
    #[test]
    fn test_deduplication_id_is_stable(
        subject in "[A-Za-z]{1,16}",
        group in "[A-Z_]{1,24}",
        payload in "[ -~]{0,64}",
    ) {
        let first = deduplication_id(&subject, &group, &payload);
        let second = deduplication_id(&subject, &group, &payload);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), 64);
        prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#![allow(dead_code)] // Each test binary uses a different subset of these fixtures

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bridgesync_core::bridge::{
    BridgeGroupMark, BridgeHerd, BridgeHolding, BridgeHoldingParty, BridgeParty, BridgePartyRole,
    InMemoryBridgeClient,
};
use bridgesync_core::config::{BridgeSyncConfig, MessagingConfig};
use bridgesync_core::events::EventPublisher;
use bridgesync_core::locking::{InMemoryLockStore, LockRunner};
use bridgesync_core::messaging::{MessageDispatcher, PollStats};

/// Bridge pre-loaded with three holdings and two parties. The first holding
/// carries a full set of child records so every import step has work to do.
pub fn seeded_bridge() -> Arc<InMemoryBridgeClient> {
    let bridge = InMemoryBridgeClient::new();

    bridge.add_holding(BridgeHolding {
        cph: "12/345/6789".to_string(),
        holding_name: Some("Hill Farm".to_string()),
        address: Some("1 Hill Lane".to_string()),
        postcode: Some("AB1 2CD".to_string()),
        county: Some("Borsetshire".to_string()),
        last_updated: None,
    });
    bridge.add_holding_party(BridgeHoldingParty {
        party_id: "P-1".to_string(),
        cph: "12/345/6789".to_string(),
        party_name: Some("J Smith".to_string()),
    });
    bridge.add_party_role(BridgePartyRole {
        party_id: "P-1".to_string(),
        cph: "12/345/6789".to_string(),
        role: "KEEPER".to_string(),
    });
    bridge.add_herd(BridgeHerd {
        cph: "12/345/6789".to_string(),
        herd_mark: "UK123456".to_string(),
        species: Some("CATTLE".to_string()),
    });
    bridge.add_group_mark(BridgeGroupMark {
        cph: "12/345/6789".to_string(),
        mark: "GM-1".to_string(),
        species: Some("SHEEP".to_string()),
    });

    bridge.add_holding(BridgeHolding {
        cph: "98/765/4321".to_string(),
        holding_name: Some("Valley Farm".to_string()),
        address: None,
        postcode: None,
        county: None,
        last_updated: None,
    });
    bridge.add_holding(BridgeHolding {
        cph: "55/555/5555".to_string(),
        holding_name: None,
        address: None,
        postcode: None,
        county: None,
        last_updated: None,
    });

    bridge.add_party(BridgeParty {
        party_id: "P-1".to_string(),
        party_name: Some("J Smith".to_string()),
        email: Some("j.smith@example.test".to_string()),
        telephone: None,
    });
    bridge.add_party(BridgeParty {
        party_id: "P-2".to_string(),
        party_name: Some("A Jones".to_string()),
        email: None,
        telephone: Some("01234 567890".to_string()),
    });

    Arc::new(bridge)
}

/// Configuration tuned for tests: no long polling, small scan pages and a
/// dead letter queue wired in.
pub fn test_config() -> BridgeSyncConfig {
    let mut config = BridgeSyncConfig::default();
    config.messaging = MessagingConfig {
        dead_letter_queue: Some("bridge_sync_dlq".to_string()),
        poll_wait_ms: 0,
        ..MessagingConfig::default()
    };
    config.scans.holdings.page_size = 2;
    config.scans.parties.page_size = 2;
    config
}

pub fn lock_runner(events: EventPublisher) -> Arc<LockRunner> {
    let store = Arc::new(InMemoryLockStore::new(Duration::from_secs(30)));
    Arc::new(LockRunner::new(store, Duration::from_secs(10), events))
}

/// Poll until two consecutive cycles come back empty, aggregating the stats.
/// Bounded so a test that keeps producing messages fails instead of hanging.
pub async fn drain(dispatcher: &MessageDispatcher, token: &CancellationToken) -> PollStats {
    let mut total = PollStats::default();
    let mut quiet_cycles = 0;
    for _ in 0..50 {
        let stats = dispatcher.poll_once(token).await.expect("poll failed");
        total.received += stats.received;
        total.completed += stats.completed;
        total.retrying += stats.retrying;
        total.dead_lettered += stats.dead_lettered;
        total.left += stats.left;

        if stats.received == 0 {
            quiet_cycles += 1;
            if quiet_cycles >= 2 {
                return total;
            }
        } else {
            quiet_cycles = 0;
        }
    }
    panic!("queue never drained: {total:?}");
}

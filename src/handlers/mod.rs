//! # Message Handlers
//!
//! One handler per inbound subject, each assembling its import pipeline from
//! orchestration steps:
//!
//! - **HoldingUpdateHandler**: fetch, map, persist and merge one holding
//! - **PartyUpdateHandler**: the same flow for one party
//! - **ScanRequestHandler**: walk a bridge dataset under the scan lock and
//!   fan out update messages
//!
//! Handlers are wired into a [`HandlerRegistry`] by [`build_registry`]; the
//! dispatcher resolves them by subject at dispatch time.

pub mod holding_update;
pub mod party_update;
pub mod scan_request;

use std::sync::Arc;

use crate::bridge::BridgeClient;
use crate::config::BridgeSyncConfig;
use crate::events::EventPublisher;
use crate::locking::LockRunner;
use crate::messaging::MessagePublisher;
use crate::models::gold::{GoldHolding, GoldParty};
use crate::models::silver::{
    SilverGroupMark, SilverHerd, SilverHolding, SilverHoldingParty, SilverParty, SilverPartyRole,
};
use crate::reconciliation::{InMemoryRepository, Repository};
use crate::registry::HandlerRegistry;

pub use holding_update::HoldingUpdateHandler;
pub use party_update::PartyUpdateHandler;
pub use scan_request::ScanRequestHandler;

/// Every record store the import pipelines write to.
///
/// Silver stores hold per-source raw imports; gold stores hold the merged
/// cross-source view.
#[derive(Clone)]
pub struct SyncStores {
    pub silver_holdings: Arc<dyn Repository<SilverHolding>>,
    pub silver_holding_parties: Arc<dyn Repository<SilverHoldingParty>>,
    pub silver_party_roles: Arc<dyn Repository<SilverPartyRole>>,
    pub silver_herds: Arc<dyn Repository<SilverHerd>>,
    pub silver_group_marks: Arc<dyn Repository<SilverGroupMark>>,
    pub silver_parties: Arc<dyn Repository<SilverParty>>,
    pub gold_holdings: Arc<dyn Repository<GoldHolding>>,
    pub gold_parties: Arc<dyn Repository<GoldParty>>,
}

impl SyncStores {
    /// Stores backed by process-local memory, for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            silver_holdings: Arc::new(InMemoryRepository::new()),
            silver_holding_parties: Arc::new(InMemoryRepository::new()),
            silver_party_roles: Arc::new(InMemoryRepository::new()),
            silver_herds: Arc::new(InMemoryRepository::new()),
            silver_group_marks: Arc::new(InMemoryRepository::new()),
            silver_parties: Arc::new(InMemoryRepository::new()),
            gold_holdings: Arc::new(InMemoryRepository::new()),
            gold_parties: Arc::new(InMemoryRepository::new()),
        }
    }
}

/// Build the subject registry with every handler this crate ships.
pub fn build_registry(
    bridge: Arc<dyn BridgeClient>,
    stores: SyncStores,
    publisher: Arc<dyn MessagePublisher>,
    events: EventPublisher,
    lock_runner: Arc<LockRunner>,
    config: &BridgeSyncConfig,
) -> Arc<HandlerRegistry> {
    let registry = Arc::new(HandlerRegistry::new());
    registry.register(Arc::new(HoldingUpdateHandler::new(
        bridge.clone(),
        stores.clone(),
        events.clone(),
        &config.source_system,
    )));
    registry.register(Arc::new(PartyUpdateHandler::new(
        bridge.clone(),
        stores,
        events.clone(),
        &config.source_system,
    )));
    registry.register(Arc::new(ScanRequestHandler::new(
        bridge,
        publisher,
        events,
        lock_runner,
        config.scans.clone(),
        config.lock.clone(),
    )));
    registry
}

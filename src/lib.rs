#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # BridgeSync Core
//!
//! Message-driven synchronization of agricultural holding, party and herd
//! records from an upstream bridge source into silver and gold stores.
//!
//! ## Overview
//!
//! The bridge exposes paged, read-only views of source-system records.
//! BridgeSync keeps a local copy current by reacting to queue messages:
//! `HoldingUpdate` and `PartyUpdate` re-import one entity and its child
//! records, `ScanRequest` walks a whole dataset and fans out one update
//! message per identifier. Imports land in per-source **silver** stores and
//! are folded into merged cross-source **gold** records.
//!
//! ## Architecture
//!
//! A [`messaging::MessageDispatcher`] polls the inbound queue and routes
//! each unwrapped message to its registered handler. Handlers run ordered
//! step pipelines built on [`orchestration::Orchestrator`]; failures are
//! classified as retryable (message released back to the queue) or
//! non-retryable (routed to the dead letter queue). Scans run under a
//! renewing distributed lease ([`locking::LockRunner`]) so only one process
//! walks a source at a time, on demand or from the interval-driven
//! [`scheduler::ScheduledScanRunner`].
//!
//! ## Module Organization
//!
//! - [`bridge`] - Paged read client for the upstream source
//! - [`messaging`] - Queue client, envelopes, FIFO semantics, dispatcher
//! - [`handlers`] - The three message handlers and their step pipelines
//! - [`orchestration`] - Step pipeline engine and dataset scans
//! - [`reconciliation`] - Scope-bounded upsert/delete against record stores
//! - [`models`] - Silver and gold records plus message payloads
//! - [`locking`] - Lease-based distributed locking
//! - [`scheduler`] - Interval-driven scan runs
//! - [`events`] - Broadcast lifecycle events for observers
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Structured error handling with failure classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bridgesync_core::bridge::InMemoryBridgeClient;
//! use bridgesync_core::config::BridgeSyncConfig;
//! use bridgesync_core::events::EventPublisher;
//! use bridgesync_core::handlers::{build_registry, SyncStores};
//! use bridgesync_core::locking::{InMemoryLockStore, LockRunner};
//! use bridgesync_core::messaging::{InMemoryQueueClient, MessageDispatcher, QueuePublisher};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> bridgesync_core::Result<()> {
//! let config = BridgeSyncConfig::default();
//! let events = EventPublisher::default();
//! let bridge = Arc::new(InMemoryBridgeClient::new());
//! let queue = Arc::new(InMemoryQueueClient::new());
//! let publisher = Arc::new(QueuePublisher::new(
//!     queue.clone(),
//!     &config.messaging.inbound_queue,
//! ));
//! let lock_store = Arc::new(InMemoryLockStore::new(config.lock.ttl()));
//! let lock_runner = Arc::new(LockRunner::new(
//!     lock_store,
//!     config.lock.renew_interval(),
//!     events.clone(),
//! ));
//!
//! let registry = build_registry(
//!     bridge,
//!     SyncStores::in_memory(),
//!     publisher,
//!     events.clone(),
//!     lock_runner,
//!     &config,
//! );
//! let dispatcher = MessageDispatcher::new(queue, registry, config.messaging.clone());
//! dispatcher.run(CancellationToken::new()).await
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod handlers;
pub mod locking;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod reconciliation;
pub mod registry;
pub mod scheduler;

pub use config::{BridgeSyncConfig, LockConfig, MessagingConfig, ScanKindConfig, ScansConfig};
pub use constants::{subjects, ScanKind, DETAIL_PAGE_SIZE};
pub use error::{FailureClass, Result, SyncError};
pub use events::{DispatchObserver, EventPublisher, PublishedEvent, SyncEvent};

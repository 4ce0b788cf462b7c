//! # Messaging Module
//!
//! PostgreSQL message queue (pgmq) based messaging for bridge synchronization.
//! Inbound messages arrive wrapped in notification envelopes; this module
//! unwraps them, routes them through the handler registry, and publishes
//! outbound messages with FIFO grouping attributes so work for one entity is
//! processed in order.

pub mod dead_letter;
pub mod dispatcher;
pub mod envelope;
pub mod fifo;
pub mod memory;
pub mod pgmq;
pub mod queue;

pub use dead_letter::DeadLetterRouter;
pub use dispatcher::{DispatchOutcome, MessageDispatcher, PollStats};
pub use envelope::{unwrap_message, NotificationEnvelope, UnwrappedMessage};
pub use fifo::FifoScope;
pub use memory::InMemoryQueueClient;
pub use pgmq::PgmqQueueClient;
pub use queue::{
    MessagePublisher, MessageReceipt, OutboundMessage, QueueClient, QueueMessage, QueuePublisher,
};

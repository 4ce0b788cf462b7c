//! # Handler Registry
//!
//! Maps message subjects to the handlers that process them. The dispatcher
//! resolves a handler per unwrapped message; a subject nobody registered for
//! is a non-retryable failure so bad routing shows up in the dead letter
//! queue instead of spinning on redelivery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::messaging::envelope::UnwrappedMessage;

/// Processes all messages published under one subject.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Subject this handler consumes, e.g. `HoldingUpdate`.
    fn subject(&self) -> &str;

    async fn handle(&self, message: &UnwrappedMessage, token: &CancellationToken) -> Result<()>;
}

/// Thread-safe subject -> handler map.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under its subject, replacing any existing one.
    pub fn register(&self, handler: Arc<dyn MessageHandler>) {
        let subject = handler.subject().to_string();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&subject) {
            warn!(subject = %subject, "Handler already registered, replacing");
        }
        handlers.insert(subject.clone(), handler);
        info!(subject = %subject, "Message handler registered");
    }

    /// Resolve the handler for a subject.
    pub fn resolve(&self, subject: &str) -> Result<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .get(subject)
            .cloned()
            .ok_or_else(|| SyncError::HandlerNotFound {
                subject: subject.to_string(),
            })
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.handlers.read().keys().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

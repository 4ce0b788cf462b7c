//! Message dispatch loop.
//!
//! Polls the inbound queue, unwraps each delivery, resolves a handler by
//! subject and applies the failure taxonomy to decide the message's fate:
//!
//! - handler success deletes the message
//! - retryable failures leave it for visibility-timeout redelivery
//! - non-retryable failures route it to the dead letter queue
//! - unclassified failures leave it untouched and log loudly
//!
//! Every settled message notifies the configured [`DispatchObserver`] exactly
//! once: `message_handled` after a successful delete, `message_failed` for
//! any failure outcome. Cancellation mid-handle notifies neither.
//!
//! Messages within a batch are processed sequentially so FIFO group order is
//! preserved end to end.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MessagingConfig;
use crate::error::{FailureClass, Result, SyncError};
use crate::events::{DispatchEventPublisher, DispatchObserver, EventPublisher};
use crate::messaging::dead_letter::DeadLetterRouter;
use crate::messaging::envelope::unwrap_message;
use crate::messaging::queue::{QueueClient, QueueMessage};
use crate::registry::HandlerRegistry;

/// What happened to one dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handled successfully and deleted.
    Completed,
    /// Failed retryably; left for redelivery after the visibility timeout.
    Retrying,
    /// Failed non-retryably and moved to the dead letter queue.
    DeadLettered,
    /// Left untouched: no dead letter queue, unclassified failure, or
    /// cancellation observed mid-message.
    Left,
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub received: usize,
    pub completed: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
    pub left: usize,
}

impl PollStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Completed => self.completed += 1,
            DispatchOutcome::Retrying => self.retrying += 1,
            DispatchOutcome::DeadLettered => self.dead_lettered += 1,
            DispatchOutcome::Left => self.left += 1,
        }
    }
}

pub struct MessageDispatcher {
    client: Arc<dyn QueueClient>,
    registry: Arc<HandlerRegistry>,
    dead_letters: DeadLetterRouter,
    observer: Arc<dyn DispatchObserver>,
    config: MessagingConfig,
}

impl MessageDispatcher {
    pub fn new(
        client: Arc<dyn QueueClient>,
        registry: Arc<HandlerRegistry>,
        config: MessagingConfig,
    ) -> Self {
        let dead_letters = DeadLetterRouter::new(
            client.clone(),
            config.inbound_queue.clone(),
            config.dead_letter_queue.clone(),
        );
        Self {
            client,
            registry,
            dead_letters,
            observer: Arc::new(DispatchEventPublisher::new(EventPublisher::default())),
            config,
        }
    }

    /// Replace the stock event-forwarding observer.
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Poll and dispatch until the token is cancelled.
    ///
    /// Receive errors back the loop off rather than killing it; the backoff
    /// grows with consecutive failures and resets on the first good poll.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            queue = %self.config.inbound_queue,
            subjects = ?self.registry.subjects(),
            "🚀 Message dispatcher starting"
        );

        let mut consecutive_errors: u32 = 0;
        while !token.is_cancelled() {
            match self.poll_once(&token).await {
                Ok(stats) => {
                    consecutive_errors = 0;
                    if stats.received > 0 {
                        debug!(
                            received = stats.received,
                            completed = stats.completed,
                            retrying = stats.retrying,
                            dead_lettered = stats.dead_lettered,
                            left = stats.left,
                            "Poll cycle finished"
                        );
                    }
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let backoff = self.config.error_backoff() * consecutive_errors.min(10);
                    error!(
                        error = %e,
                        consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "Poll failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }

        info!(queue = %self.config.inbound_queue, "👋 Message dispatcher stopped");
        Ok(())
    }

    /// One receive-and-dispatch cycle.
    pub async fn poll_once(&self, token: &CancellationToken) -> Result<PollStats> {
        let batch = self
            .client
            .receive(
                &self.config.inbound_queue,
                self.config.batch_size,
                self.config.visibility_timeout(),
                self.config.poll_wait(),
                token,
            )
            .await?;

        let mut stats = PollStats {
            received: batch.len(),
            ..PollStats::default()
        };

        let mut processed = 0;
        for raw in &batch {
            if token.is_cancelled() {
                // Remaining deliveries stay leased and reappear after the
                // visibility timeout.
                stats.left += batch.len() - processed;
                break;
            }
            let outcome = self.dispatch(raw, token).await;
            stats.record(outcome);
            processed += 1;
        }

        Ok(stats)
    }

    /// Dispatch a single delivery and settle it against the queue.
    pub async fn dispatch(&self, raw: &QueueMessage, token: &CancellationToken) -> DispatchOutcome {
        let unwrapped = match unwrap_message(raw) {
            Ok(u) => u,
            Err(e) => return self.settle_failure(raw, &e).await,
        };

        let handler = match self.registry.resolve(&unwrapped.subject) {
            Ok(h) => h,
            Err(e) => return self.settle_failure(raw, &e).await,
        };

        debug!(
            message_id = %unwrapped.id,
            subject = %unwrapped.subject,
            correlation_id = %unwrapped.correlation_id,
            receive_count = raw.receive_count,
            "📥 Dispatching message"
        );

        match handler.handle(&unwrapped, token).await {
            Ok(()) => match self.client.delete(&self.config.inbound_queue, &raw.receipt).await {
                Ok(()) => {
                    debug!(message_id = %unwrapped.id, "✅ Message completed");
                    self.observer.message_handled(&unwrapped, raw).await;
                    DispatchOutcome::Completed
                }
                Err(e) => {
                    // The work is done but the delete failed; the redelivery
                    // will be absorbed by idempotent handlers.
                    error!(
                        message_id = %unwrapped.id,
                        error = %e,
                        "Failed to delete completed message"
                    );
                    self.observer.message_failed(&raw.id, &e, raw).await;
                    DispatchOutcome::Retrying
                }
            },
            Err(e) if e.is_cancelled() => {
                debug!(
                    message_id = %unwrapped.id,
                    "Cancelled mid-handle, leaving message for redelivery"
                );
                DispatchOutcome::Left
            }
            Err(e) => self.settle_failure(raw, &e).await,
        }
    }

    async fn settle_failure(&self, raw: &QueueMessage, error: &SyncError) -> DispatchOutcome {
        self.observer.message_failed(&raw.id, error, raw).await;
        match error.classification() {
            FailureClass::Retryable => {
                warn!(
                    message_id = %raw.id,
                    error = %error,
                    receive_count = raw.receive_count,
                    "Retryable failure, leaving message for redelivery"
                );
                DispatchOutcome::Retrying
            }
            FailureClass::NonRetryable => match self.dead_letters.route(raw, error).await {
                Ok(true) => DispatchOutcome::DeadLettered,
                Ok(false) => DispatchOutcome::Left,
                Err(route_error) => {
                    error!(
                        message_id = %raw.id,
                        error = %route_error,
                        "❌ Dead letter routing failed, leaving message for redelivery"
                    );
                    DispatchOutcome::Retrying
                }
            },
            FailureClass::Unclassified => {
                error!(
                    message_id = %raw.id,
                    error = %error,
                    kind = error.kind_name(),
                    "Unclassified failure, leaving message untouched"
                );
                DispatchOutcome::Left
            }
        }
    }
}

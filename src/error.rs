//! # Structured Error Handling
//!
//! Every fallible operation in the crate returns [`SyncError`]. The dispatcher
//! classifies errors into a [`FailureClass`] to decide what happens to the
//! message that produced them: retryable failures are left on the queue for
//! visibility-timeout redelivery, non-retryable ones become dead-letter
//! candidates, and anything unclassified is logged and left alone so the
//! broker's receive-count policy can act as the backstop.

use std::fmt;

/// How the dispatcher should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient downstream failure; leave the message for redelivery.
    Retryable,
    /// Permanent failure; eligible for an explicit dead-letter move.
    NonRetryable,
    /// Unexpected failure; logged, message neither deleted nor dead-lettered.
    Unclassified,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Retryable => write!(f, "retryable"),
            FailureClass::NonRetryable => write!(f, "non_retryable"),
            FailureClass::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Queue receive/send/delete failure.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Bridge source query failure.
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Repository read or bulk-write failure (conflicts, timeouts).
    #[error("Repository error: {0}")]
    Repository(String),

    /// Lock store acquire/renew/release failure.
    #[error("Lock store error: {0}")]
    LockStore(String),

    /// Message payload could not be deserialized into the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload deserialized but violates a domain rule.
    #[error("Domain violation: {0}")]
    DomainViolation(String),

    /// Caller passed an argument the operation cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No handler is registered for the message subject.
    #[error("No handler registered for subject '{subject}'")]
    HandlerNotFound { subject: String },

    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The distributed lock could not be renewed while guarded work was running.
    #[error("Lock renewal failed for '{key}'")]
    LockRenewalFailed { key: String },

    /// The operation observed cancellation and stopped early.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Classification used by the dispatcher to pick the message outcome.
    pub fn classification(&self) -> FailureClass {
        match self {
            SyncError::Queue(_)
            | SyncError::Bridge(_)
            | SyncError::Repository(_)
            | SyncError::LockStore(_)
            | SyncError::Cancelled => FailureClass::Retryable,
            SyncError::MalformedPayload(_)
            | SyncError::DomainViolation(_)
            | SyncError::InvalidArgument(_)
            | SyncError::HandlerNotFound { .. } => FailureClass::NonRetryable,
            SyncError::Configuration(_) | SyncError::LockRenewalFailed { .. } => {
                FailureClass::Unclassified
            }
        }
    }

    /// Stable variant name, used as the `DLQ_FailureReason` attribute.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SyncError::Queue(_) => "Queue",
            SyncError::Bridge(_) => "Bridge",
            SyncError::Repository(_) => "Repository",
            SyncError::LockStore(_) => "LockStore",
            SyncError::MalformedPayload(_) => "MalformedPayload",
            SyncError::DomainViolation(_) => "DomainViolation",
            SyncError::InvalidArgument(_) => "InvalidArgument",
            SyncError::HandlerNotFound { .. } => "HandlerNotFound",
            SyncError::Configuration(_) => "Configuration",
            SyncError::LockRenewalFailed { .. } => "LockRenewalFailed",
            SyncError::Cancelled => "Cancelled",
        }
    }

    /// True when the error represents observed cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_mapping() {
        assert_eq!(
            SyncError::Queue("boom".into()).classification(),
            FailureClass::Retryable
        );
        assert_eq!(
            SyncError::Repository("write conflict".into()).classification(),
            FailureClass::Retryable
        );
        assert_eq!(
            SyncError::MalformedPayload("null".into()).classification(),
            FailureClass::NonRetryable
        );
        assert_eq!(
            SyncError::HandlerNotFound {
                subject: "Nope".into()
            }
            .classification(),
            FailureClass::NonRetryable
        );
        assert_eq!(
            SyncError::LockRenewalFailed { key: "scan".into() }.classification(),
            FailureClass::Unclassified
        );
    }

    #[test]
    fn test_kind_name_matches_variant() {
        assert_eq!(
            SyncError::MalformedPayload("x".into()).kind_name(),
            "MalformedPayload"
        );
        assert_eq!(SyncError::Bridge("x".into()).kind_name(), "Bridge");
        assert_eq!(SyncError::Cancelled.kind_name(), "Cancelled");
    }

    #[test]
    fn test_display_includes_context() {
        let err = SyncError::HandlerNotFound {
            subject: "HoldingUpdate".into(),
        };
        assert!(err.to_string().contains("HoldingUpdate"));
    }
}

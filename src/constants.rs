//! # System Constants
//!
//! Message attribute names, well-known subjects, FIFO group prefixes and the
//! dead-letter metadata keys shared by the messaging layer. Keeping the wire
//! vocabulary in one module means producers, the dispatcher and the tests all
//! agree on the exact strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard attributes carried by every outbound message.
pub mod attributes {
    /// Message type name with the trailing `Message` suffix stripped.
    pub const SUBJECT: &str = "Subject";
    /// Correlation id threaded through a whole processing chain.
    pub const CORRELATION_ID: &str = "CorrelationId";
    /// Publish timestamp, RFC 3339 UTC.
    pub const EVENT_TIME_UTC: &str = "EventTimeUtc";
    /// FIFO routing group, present on FIFO-routed messages only.
    pub const MESSAGE_GROUP_ID: &str = "MessageGroupId";
    /// FIFO deduplication id, present on FIFO-routed messages only.
    pub const MESSAGE_DEDUPLICATION_ID: &str = "MessageDeduplicationId";
}

/// Metadata attributes appended to a message when it is moved to the DLQ.
pub mod dlq {
    pub const FAILURE_REASON: &str = "DLQ_FailureReason";
    pub const FAILURE_MESSAGE: &str = "DLQ_FailureMessage";
    pub const ORIGINAL_MESSAGE_ID: &str = "DLQ_OriginalMessageId";
    pub const RECEIVE_COUNT: &str = "DLQ_ReceiveCount";
    pub const FAILURE_TIMESTAMP: &str = "DLQ_FailureTimestamp";

    /// `DLQ_FailureMessage` is truncated to this many characters.
    pub const FAILURE_MESSAGE_MAX_LEN: usize = 256;
}

/// Well-known message subjects, each the message type name minus `Message`.
pub mod subjects {
    pub const HOLDING_UPDATE: &str = "HoldingUpdate";
    pub const PARTY_UPDATE: &str = "PartyUpdate";
    pub const SCAN_REQUEST: &str = "ScanRequest";
}

/// FIFO group id prefixes per grouping scheme.
pub mod group_prefixes {
    pub const HOLDING: &str = "CPH_";
    pub const PARTY: &str = "PARTY_";
    pub const SYSTEM: &str = "SYSTEM_";
}

/// Subject used when an unwrapped notification carries no usable subject.
pub const DEFAULT_SUBJECT: &str = "Default";

/// Source system the crate syncs from by default.
pub const DEFAULT_SOURCE_SYSTEM: &str = "SAM";

/// Page size used when draining the child collections of one parent record
/// (holding parties, roles, herds, group marks) during an import.
pub const DETAIL_PAGE_SIZE: i64 = 200;

/// The kinds of scheduled scan the bridge source supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanKind {
    /// Full paged walk of every holding known to the bridge.
    BulkScan,
    /// Paged walk of party records.
    PartyScan,
}

impl ScanKind {
    /// Wire name used inside system FIFO group ids, e.g. `SYSTEM_SAM_BULK_SCAN`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ScanKind::BulkScan => "BULK_SCAN",
            ScanKind::PartyScan => "PARTY_SCAN",
        }
    }

    pub fn all() -> [ScanKind; 2] {
        [ScanKind::BulkScan, ScanKind::PartyScan]
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_kind_wire_names() {
        assert_eq!(ScanKind::BulkScan.wire_name(), "BULK_SCAN");
        assert_eq!(ScanKind::PartyScan.wire_name(), "PARTY_SCAN");
        assert_eq!(ScanKind::BulkScan.to_string(), "BULK_SCAN");
    }

    #[test]
    fn test_scan_kind_serializes_as_its_wire_name() {
        for kind in ScanKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.wire_name()));
        }
    }

    #[test]
    fn test_dlq_attribute_names_are_prefixed() {
        for name in [
            dlq::FAILURE_REASON,
            dlq::FAILURE_MESSAGE,
            dlq::ORIGINAL_MESSAGE_ID,
            dlq::RECEIVE_COUNT,
            dlq::FAILURE_TIMESTAMP,
        ] {
            assert!(name.starts_with("DLQ_"));
        }
    }
}

//! FIFO grouping and deduplication ids for outbound messages.
//!
//! Messages about the same entity must be processed in publish order, so
//! every outbound message carries a group id derived from the entity it
//! concerns. Group ids use a restricted character set; anything outside
//! `[A-Za-z0-9_-]` in the source identifier is mapped to `_`.

use sha2::{Digest, Sha256};

use crate::constants::{group_prefixes, ScanKind};
use crate::error::{Result, SyncError};

/// The entity scope an outbound message is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoScope<'a> {
    /// Messages about one holding, identified by CPH. Identifiers may carry
    /// a `SOURCE:` prefix, which is stripped before grouping so the same
    /// holding groups identically regardless of which system named it.
    Holding { identifier: &'a str },
    /// Messages about one party.
    Party { identifier: &'a str },
    /// System-level work (scan scheduling) for one source and scan kind.
    System {
        source_system: &'a str,
        scan_kind: ScanKind,
    },
}

/// Compute the FIFO group id for a scope.
///
/// Fails with [`SyncError::InvalidArgument`] when the identifier is blank
/// (or blank once the source prefix is stripped), since such a message could
/// never be routed to a meaningful group.
pub fn group_id(scope: &FifoScope<'_>) -> Result<String> {
    match scope {
        FifoScope::Holding { identifier } => {
            let stripped = strip_source_prefix(identifier);
            if stripped.trim().is_empty() {
                return Err(SyncError::InvalidArgument(
                    "holding identifier is blank".to_string(),
                ));
            }
            Ok(format!("{}{}", group_prefixes::HOLDING, normalize(stripped)))
        }
        FifoScope::Party { identifier } => {
            if identifier.trim().is_empty() {
                return Err(SyncError::InvalidArgument(
                    "party identifier is blank".to_string(),
                ));
            }
            Ok(format!("{}{}", group_prefixes::PARTY, normalize(identifier)))
        }
        FifoScope::System {
            source_system,
            scan_kind,
        } => {
            if source_system.trim().is_empty() {
                return Err(SyncError::InvalidArgument(
                    "source system is blank".to_string(),
                ));
            }
            Ok(format!(
                "{}{}_{}",
                group_prefixes::SYSTEM,
                normalize(source_system),
                scan_kind.wire_name()
            ))
        }
    }
}

/// Content-hash deduplication id: two messages with the same subject, group
/// and payload deduplicate to one delivery within the dedup window.
pub fn deduplication_id(subject: &str, group_id: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(b"\n");
    hasher.update(group_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Map every character outside `[A-Za-z0-9_-]` to `_`.
fn normalize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Strip a leading `SOURCE:` qualifier from an identifier, if present.
fn strip_source_prefix(identifier: &str) -> &str {
    match identifier.split_once(':') {
        Some((_, rest)) => rest,
        None => identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holding_group_strips_prefix_and_normalizes() {
        let scope = FifoScope::Holding {
            identifier: "SAM:12/345/6789",
        };
        assert_eq!(group_id(&scope).unwrap(), "CPH_12_345_6789");

        let bare = FifoScope::Holding {
            identifier: "12/345/6789",
        };
        assert_eq!(group_id(&bare).unwrap(), "CPH_12_345_6789");
    }

    #[test]
    fn test_party_group_normalizes_identifier() {
        let scope = FifoScope::Party {
            identifier: "P 100.2",
        };
        assert_eq!(group_id(&scope).unwrap(), "PARTY_P_100_2");
    }

    #[test]
    fn test_system_group_uses_scan_kind_wire_name() {
        let scope = FifoScope::System {
            source_system: "SAM",
            scan_kind: ScanKind::BulkScan,
        };
        assert_eq!(group_id(&scope).unwrap(), "SYSTEM_SAM_BULK_SCAN");
    }

    #[test]
    fn test_blank_identifier_is_rejected() {
        let blank = FifoScope::Holding { identifier: "  " };
        assert!(group_id(&blank).is_err());

        // Prefix with nothing after it strips down to blank.
        let only_prefix = FifoScope::Holding { identifier: "SAM:" };
        assert!(group_id(&only_prefix).is_err());
    }

    #[test]
    fn test_deduplication_id_is_content_addressed() {
        let a = deduplication_id("HoldingUpdate", "CPH_1", "{\"x\":1}");
        let b = deduplication_id("HoldingUpdate", "CPH_1", "{\"x\":1}");
        let c = deduplication_id("HoldingUpdate", "CPH_1", "{\"x\":2}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}

//! Typed payloads for the messages this crate publishes and consumes.
//!
//! A message's subject is its type name minus the `Message` suffix. Payloads
//! are camelCase JSON on the wire. `to_outbound` builds the full transport
//! message, FIFO attributes included, so publishers cannot forget them.

use serde::{Deserialize, Serialize};

use crate::constants::{subjects, ScanKind};
use crate::error::{Result, SyncError};
use crate::messaging::fifo::{self, FifoScope};
use crate::messaging::queue::OutboundMessage;

fn parse_payload<T: serde::de::DeserializeOwned>(subject: &str, payload: &str) -> Result<T> {
    serde_json::from_str(payload).map_err(|e| {
        SyncError::MalformedPayload(format!("cannot parse {subject} payload: {e}"))
    })
}

fn serialize_payload<T: Serialize>(subject: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        SyncError::InvalidArgument(format!("cannot serialize {subject} payload: {e}"))
    })
}

/// Request to import or refresh one holding from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoldingUpdateMessage {
    /// CPH, optionally qualified with a `SOURCE:` prefix.
    pub holding_identifier: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl HoldingUpdateMessage {
    pub fn new(holding_identifier: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            holding_identifier: holding_identifier.into(),
            source: Some(source.into()),
        }
    }

    pub fn parse(payload: &str) -> Result<Self> {
        parse_payload(subjects::HOLDING_UPDATE, payload)
    }

    /// CPH with any source qualifier removed.
    pub fn cph(&self) -> &str {
        match self.holding_identifier.split_once(':') {
            Some((_, rest)) => rest,
            None => &self.holding_identifier,
        }
    }

    pub fn to_outbound(&self, correlation_id: &str) -> Result<OutboundMessage> {
        let payload = serialize_payload(subjects::HOLDING_UPDATE, self)?;
        let group = fifo::group_id(&FifoScope::Holding {
            identifier: &self.holding_identifier,
        })?;
        let dedup = fifo::deduplication_id(subjects::HOLDING_UPDATE, &group, &payload);
        Ok(OutboundMessage::new(subjects::HOLDING_UPDATE, correlation_id, payload)
            .with_fifo(group, dedup))
    }
}

/// Request to import or refresh one party from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartyUpdateMessage {
    pub party_identifier: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl PartyUpdateMessage {
    pub fn new(party_identifier: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            party_identifier: party_identifier.into(),
            source: Some(source.into()),
        }
    }

    pub fn parse(payload: &str) -> Result<Self> {
        parse_payload(subjects::PARTY_UPDATE, payload)
    }

    pub fn to_outbound(&self, correlation_id: &str) -> Result<OutboundMessage> {
        let payload = serialize_payload(subjects::PARTY_UPDATE, self)?;
        let group = fifo::group_id(&FifoScope::Party {
            identifier: &self.party_identifier,
        })?;
        let dedup = fifo::deduplication_id(subjects::PARTY_UPDATE, &group, &payload);
        Ok(OutboundMessage::new(subjects::PARTY_UPDATE, correlation_id, payload)
            .with_fifo(group, dedup))
    }
}

/// Request to start (or continue) a paged scan of a source system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequestMessage {
    pub source: String,
    pub scan_kind: ScanKind,
}

impl ScanRequestMessage {
    pub fn new(source: impl Into<String>, scan_kind: ScanKind) -> Self {
        Self {
            source: source.into(),
            scan_kind,
        }
    }

    pub fn parse(payload: &str) -> Result<Self> {
        parse_payload(subjects::SCAN_REQUEST, payload)
    }

    pub fn to_outbound(&self, correlation_id: &str) -> Result<OutboundMessage> {
        let payload = serialize_payload(subjects::SCAN_REQUEST, self)?;
        let group = fifo::group_id(&FifoScope::System {
            source_system: &self.source,
            scan_kind: self.scan_kind,
        })?;
        let dedup = fifo::deduplication_id(subjects::SCAN_REQUEST, &group, &payload);
        Ok(OutboundMessage::new(subjects::SCAN_REQUEST, correlation_id, payload)
            .with_fifo(group, dedup))
    }
}

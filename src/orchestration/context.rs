//! Per-pipeline contexts threaded through sync steps.
//!
//! Each pipeline owns a plain struct: steps read what earlier steps wrote
//! and fill in their own fields. Keeping the fields typed (rather than a
//! string-keyed bag) means a step that needs data a predecessor never
//! produced fails to compile instead of failing at dispatch time.

use chrono::{DateTime, Utc};

use crate::bridge::{
    BridgeGroupMark, BridgeHerd, BridgeHolding, BridgeHoldingParty, BridgeParty, BridgePartyRole,
};
use crate::models::gold::{GoldHolding, GoldParty};
use crate::models::silver::{
    SilverGroupMark, SilverHerd, SilverHolding, SilverHoldingParty, SilverParty, SilverPartyRole,
};
use crate::orchestration::scan::ScanStats;

/// Working state for one holding import: fetch, map, persist, merge.
#[derive(Debug, Clone)]
pub struct HoldingImportContext {
    pub source: String,
    pub correlation_id: String,
    /// Identifier as received, usually `"{source}:{cph}"`.
    pub holding_identifier: String,
    /// County Parish Holding number with any source prefix stripped.
    pub cph: String,
    /// Single timestamp for the whole import so every record agrees.
    pub retrieved_at: DateTime<Utc>,

    pub raw_holding: Option<BridgeHolding>,
    pub raw_parties: Vec<BridgeHoldingParty>,
    pub raw_roles: Vec<BridgePartyRole>,
    pub raw_herds: Vec<BridgeHerd>,
    pub raw_group_marks: Vec<BridgeGroupMark>,

    pub silver_holding: Option<SilverHolding>,
    pub silver_parties: Vec<SilverHoldingParty>,
    pub silver_roles: Vec<SilverPartyRole>,
    pub silver_herds: Vec<SilverHerd>,
    pub silver_group_marks: Vec<SilverGroupMark>,

    pub gold_holding: Option<GoldHolding>,
}

impl HoldingImportContext {
    pub fn new(source: &str, correlation_id: &str, holding_identifier: &str) -> Self {
        let cph = match holding_identifier.split_once(':') {
            Some((_, rest)) => rest.to_string(),
            None => holding_identifier.to_string(),
        };
        Self {
            source: source.to_string(),
            correlation_id: correlation_id.to_string(),
            holding_identifier: holding_identifier.to_string(),
            cph,
            retrieved_at: Utc::now(),
            raw_holding: None,
            raw_parties: Vec::new(),
            raw_roles: Vec::new(),
            raw_herds: Vec::new(),
            raw_group_marks: Vec::new(),
            silver_holding: None,
            silver_parties: Vec::new(),
            silver_roles: Vec::new(),
            silver_herds: Vec::new(),
            silver_group_marks: Vec::new(),
            gold_holding: None,
        }
    }
}

/// Working state for one party import.
#[derive(Debug, Clone)]
pub struct PartyImportContext {
    pub source: String,
    pub correlation_id: String,
    pub party_identifier: String,
    pub retrieved_at: DateTime<Utc>,

    pub raw_party: Option<BridgeParty>,
    pub raw_roles: Vec<BridgePartyRole>,

    pub silver_party: Option<SilverParty>,
    pub silver_roles: Vec<SilverPartyRole>,

    pub gold_party: Option<GoldParty>,
}

impl PartyImportContext {
    pub fn new(source: &str, correlation_id: &str, party_identifier: &str) -> Self {
        Self {
            source: source.to_string(),
            correlation_id: correlation_id.to_string(),
            party_identifier: party_identifier.to_string(),
            retrieved_at: Utc::now(),
            raw_party: None,
            raw_roles: Vec::new(),
            silver_party: None,
            silver_roles: Vec::new(),
            gold_party: None,
        }
    }
}

/// Working state for one scheduled scan run across both scan kinds.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub source: String,
    pub correlation_id: String,
    pub holdings: Option<ScanStats>,
    pub parties: Option<ScanStats>,
}

impl ScanContext {
    pub fn new(source: &str, correlation_id: &str) -> Self {
        Self {
            source: source.to_string(),
            correlation_id: correlation_id.to_string(),
            holdings: None,
            parties: None,
        }
    }

    /// Update messages published across every scan in this run.
    pub fn total_published(&self) -> usize {
        self.holdings.as_ref().map_or(0, |s| s.published)
            + self.parties.as_ref().map_or(0, |s| s.published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holding_context_strips_source_prefix() {
        let ctx = HoldingImportContext::new("SAM", "corr-1", "SAM:12/345/6789");
        assert_eq!(ctx.cph, "12/345/6789");
        assert_eq!(ctx.holding_identifier, "SAM:12/345/6789");
    }

    #[test]
    fn test_holding_context_without_prefix_keeps_identifier() {
        let ctx = HoldingImportContext::new("SAM", "corr-1", "12/345/6789");
        assert_eq!(ctx.cph, "12/345/6789");
    }

    #[test]
    fn test_scan_context_totals_both_kinds() {
        let mut ctx = ScanContext::new("SAM", "corr-2");
        assert_eq!(ctx.total_published(), 0);
        ctx.holdings = Some(ScanStats {
            published: 7,
            ..ScanStats::default()
        });
        ctx.parties = Some(ScanStats {
            published: 3,
            ..ScanStats::default()
        });
        assert_eq!(ctx.total_published(), 10);
    }
}

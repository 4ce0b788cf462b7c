//! In-memory bridge backend.
//!
//! Implements [`BridgeClient`] over process-local record sets with the same
//! `top`/`skip` window arithmetic as the real endpoints, which makes scans
//! and import pipelines testable without infrastructure. Not for production
//! use.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::bridge::{
    BridgeClient, BridgeGroupMark, BridgeHerd, BridgeHolding, BridgeHoldingParty, BridgeParty,
    BridgePartyRole, BridgePage, PageRequest,
};
use crate::error::{Result, SyncError};

/// Process-local [`BridgeClient`] backed by seedable record sets.
#[derive(Debug, Default)]
pub struct InMemoryBridgeClient {
    holdings: Mutex<Vec<BridgeHolding>>,
    holding_parties: Mutex<Vec<BridgeHoldingParty>>,
    party_roles: Mutex<Vec<BridgePartyRole>>,
    herds: Mutex<Vec<BridgeHerd>>,
    group_marks: Mutex<Vec<BridgeGroupMark>>,
    parties: Mutex<Vec<BridgeParty>>,
    fail_next: Mutex<Option<String>>,
}

impl InMemoryBridgeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_holding(&self, holding: BridgeHolding) {
        self.holdings.lock().push(holding);
    }

    pub fn add_holding_party(&self, party: BridgeHoldingParty) {
        self.holding_parties.lock().push(party);
    }

    pub fn add_party_role(&self, role: BridgePartyRole) {
        self.party_roles.lock().push(role);
    }

    pub fn add_herd(&self, herd: BridgeHerd) {
        self.herds.lock().push(herd);
    }

    pub fn add_group_mark(&self, mark: BridgeGroupMark) {
        self.group_marks.lock().push(mark);
    }

    pub fn add_party(&self, party: BridgeParty) {
        self.parties.lock().push(party);
    }

    /// Drop a holding and its child records, as if the bridge no longer
    /// returned them.
    pub fn remove_holding(&self, cph: &str) {
        self.holdings.lock().retain(|h| h.cph != cph);
        self.holding_parties.lock().retain(|p| p.cph != cph);
        self.party_roles.lock().retain(|r| r.cph != cph);
        self.herds.lock().retain(|h| h.cph != cph);
        self.group_marks.lock().retain(|m| m.cph != cph);
    }

    pub fn remove_herd(&self, cph: &str, herd_mark: &str) {
        self.herds
            .lock()
            .retain(|h| !(h.cph == cph && h.herd_mark == herd_mark));
    }

    pub fn remove_party(&self, party_id: &str) {
        self.parties.lock().retain(|p| p.party_id != party_id);
    }

    pub fn remove_party_role(&self, party_id: &str, role: &str) {
        self.party_roles
            .lock()
            .retain(|r| !(r.party_id == party_id && r.role == role));
    }

    /// Make the next page fetch fail with a bridge error.
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    fn check_fault(&self, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(SyncError::Bridge(reason));
        }
        Ok(())
    }

    fn page_of<T: Clone>(rows: Vec<T>, page: PageRequest) -> Option<BridgePage<T>> {
        let total = rows.len() as i64;
        let start = page.skip.max(0) as usize;
        let window = if start >= rows.len() || page.top <= 0 {
            Vec::new()
        } else {
            let end = (start + page.top as usize).min(rows.len());
            rows[start..end].to_vec()
        };
        Some(BridgePage::new(window, page.top, page.skip, total))
    }
}

#[async_trait]
impl BridgeClient for InMemoryBridgeClient {
    async fn holdings_page(
        &self,
        page: PageRequest,
        cph: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHolding>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .holdings
            .lock()
            .iter()
            .filter(|h| cph.is_none_or(|c| h.cph == c))
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }

    async fn holding_parties_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHoldingParty>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .holding_parties
            .lock()
            .iter()
            .filter(|p| p.cph == cph)
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }

    async fn party_roles_page(
        &self,
        cph: Option<&str>,
        party_id: Option<&str>,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgePartyRole>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .party_roles
            .lock()
            .iter()
            .filter(|r| cph.is_none_or(|c| r.cph == c))
            .filter(|r| party_id.is_none_or(|p| r.party_id == p))
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }

    async fn herds_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHerd>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .herds
            .lock()
            .iter()
            .filter(|h| h.cph == cph)
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }

    async fn group_marks_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeGroupMark>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .group_marks
            .lock()
            .iter()
            .filter(|m| m.cph == cph)
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }

    async fn parties_page(
        &self,
        page: PageRequest,
        party_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeParty>>> {
        self.check_fault(token)?;
        let rows: Vec<_> = self
            .parties
            .lock()
            .iter()
            .filter(|p| party_id.is_none_or(|id| p.party_id == id))
            .cloned()
            .collect();
        Ok(Self::page_of(rows, page))
    }
}

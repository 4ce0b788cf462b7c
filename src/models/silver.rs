//! Silver-layer records: per-source snapshots of bridge data.
//!
//! Silver is the first landing zone for imported records. Every record keeps
//! the `source` system it came from plus the natural key fields the bridge
//! uses, and a surrogate `id` that stays stable across re-imports so that
//! downstream consumers can follow references while the record is refreshed
//! underneath them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::{
    BridgeGroupMark, BridgeHerd, BridgeHolding, BridgeHoldingParty, BridgeParty, BridgePartyRole,
};
use crate::reconciliation::{Filter, Reconcilable};

/// A holding (farm premises identified by CPH) as known to one source system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverHolding {
    pub id: Uuid,
    pub source: String,
    pub cph: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub county: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverHolding {
    pub fn from_bridge(source: &str, raw: &BridgeHolding, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            cph: raw.cph.clone(),
            name: raw.holding_name.clone(),
            address: raw.address.clone(),
            postcode: raw.postcode.clone(),
            county: raw.county.clone(),
            retrieved_at,
        }
    }

    /// Filter identifying this holding by natural key.
    pub fn natural_filter(&self) -> Filter {
        Filter::new()
            .eq("source", self.source.as_str())
            .eq("cph", self.cph.as_str())
    }

    /// Keep the stored surrogate id when refreshing an existing record.
    pub fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }
}

/// A party associated with a holding, scoped to one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverHoldingParty {
    pub id: Uuid,
    pub source: String,
    pub cph: String,
    pub party_id: String,
    pub party_name: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverHoldingParty {
    pub fn from_bridge(
        source: &str,
        raw: &BridgeHoldingParty,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            cph: raw.cph.clone(),
            party_id: raw.party_id.clone(),
            party_name: raw.party_name.clone(),
            retrieved_at,
        }
    }
}

impl Reconcilable for SilverHoldingParty {
    type Key = (String, String);

    fn reconcile_key(&self) -> Self::Key {
        (self.party_id.clone(), self.cph.clone())
    }

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }

    fn key_filter(&self) -> Filter {
        Filter::new()
            .eq("party_id", self.party_id.as_str())
            .eq("cph", self.cph.as_str())
    }
}

/// One role a party plays at a holding. A party can hold several roles at
/// the same holding, so the role name is part of the key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverPartyRole {
    pub id: Uuid,
    pub source: String,
    pub cph: String,
    pub party_id: String,
    pub role: String,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverPartyRole {
    pub fn from_bridge(source: &str, raw: &BridgePartyRole, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            cph: raw.cph.clone(),
            party_id: raw.party_id.clone(),
            role: raw.role.clone(),
            retrieved_at,
        }
    }
}

impl Reconcilable for SilverPartyRole {
    type Key = (String, String, String, String);

    fn reconcile_key(&self) -> Self::Key {
        (
            self.source.clone(),
            self.cph.clone(),
            self.party_id.clone(),
            self.role.clone(),
        )
    }

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }

    fn key_filter(&self) -> Filter {
        Filter::new()
            .eq("source", self.source.as_str())
            .eq("cph", self.cph.as_str())
            .eq("party_id", self.party_id.as_str())
            .eq("role", self.role.as_str())
    }
}

/// A herd registered at a holding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverHerd {
    pub id: Uuid,
    pub source: String,
    pub cph: String,
    pub herd_mark: String,
    pub species: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverHerd {
    pub fn from_bridge(source: &str, raw: &BridgeHerd, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            cph: raw.cph.clone(),
            herd_mark: raw.herd_mark.clone(),
            species: raw.species.clone(),
            retrieved_at,
        }
    }
}

impl Reconcilable for SilverHerd {
    type Key = (String, String, String);

    fn reconcile_key(&self) -> Self::Key {
        (
            self.source.clone(),
            self.cph.clone(),
            self.herd_mark.clone(),
        )
    }

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }

    fn key_filter(&self) -> Filter {
        Filter::new()
            .eq("source", self.source.as_str())
            .eq("cph", self.cph.as_str())
            .eq("herd_mark", self.herd_mark.as_str())
    }
}

/// A group mark registered at a holding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverGroupMark {
    pub id: Uuid,
    pub source: String,
    pub cph: String,
    pub mark: String,
    pub species: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverGroupMark {
    pub fn from_bridge(source: &str, raw: &BridgeGroupMark, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            cph: raw.cph.clone(),
            mark: raw.mark.clone(),
            species: raw.species.clone(),
            retrieved_at,
        }
    }
}

impl Reconcilable for SilverGroupMark {
    type Key = (String, String, String);

    fn reconcile_key(&self) -> Self::Key {
        (self.source.clone(), self.cph.clone(), self.mark.clone())
    }

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }

    fn key_filter(&self) -> Filter {
        Filter::new()
            .eq("source", self.source.as_str())
            .eq("cph", self.cph.as_str())
            .eq("mark", self.mark.as_str())
    }
}

/// A party (person or organisation) as known to one source system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilverParty {
    pub id: Uuid,
    pub source: String,
    pub party_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl SilverParty {
    pub fn from_bridge(source: &str, raw: &BridgeParty, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            party_id: raw.party_id.clone(),
            name: raw.party_name.clone(),
            email: raw.email.clone(),
            telephone: raw.telephone.clone(),
            retrieved_at,
        }
    }

    pub fn natural_filter(&self) -> Filter {
        Filter::new()
            .eq("source", self.source.as_str())
            .eq("party_id", self.party_id.as_str())
    }

    pub fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
    }
}

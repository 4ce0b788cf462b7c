//! Gold-layer records: the source-merged view served to consumers.
//!
//! Gold records are keyed by the business identifier alone (no `source`
//! column). Each import merges the freshly landed silver record in and
//! appends the contributing source to `sources`, so a gold record remembers
//! every system that has ever reported it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::silver::{SilverHolding, SilverParty};
use crate::reconciliation::Filter;

/// Merged holding view across all source systems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoldHolding {
    pub id: Uuid,
    pub cph: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub county: Option<String>,
    pub sources: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl GoldHolding {
    /// Build a fresh gold record from a silver import.
    pub fn from_silver(silver: &SilverHolding, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cph: silver.cph.clone(),
            name: silver.name.clone(),
            address: silver.address.clone(),
            postcode: silver.postcode.clone(),
            county: silver.county.clone(),
            sources: vec![silver.source.clone()],
            updated_at,
        }
    }

    /// Merge a newer silver import into this record, keeping identity and
    /// the union of contributing sources.
    pub fn merge_silver(&mut self, silver: &SilverHolding, updated_at: DateTime<Utc>) {
        self.name = silver.name.clone();
        self.address = silver.address.clone();
        self.postcode = silver.postcode.clone();
        self.county = silver.county.clone();
        if !self.sources.iter().any(|s| s == &silver.source) {
            self.sources.push(silver.source.clone());
        }
        self.updated_at = updated_at;
    }

    pub fn natural_filter(&self) -> Filter {
        Filter::new().eq("cph", self.cph.as_str())
    }
}

/// Merged party view across all source systems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoldParty {
    pub id: Uuid,
    pub party_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub sources: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl GoldParty {
    pub fn from_silver(silver: &SilverParty, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            party_id: silver.party_id.clone(),
            name: silver.name.clone(),
            email: silver.email.clone(),
            telephone: silver.telephone.clone(),
            sources: vec![silver.source.clone()],
            updated_at,
        }
    }

    pub fn merge_silver(&mut self, silver: &SilverParty, updated_at: DateTime<Utc>) {
        self.name = silver.name.clone();
        self.email = silver.email.clone();
        self.telephone = silver.telephone.clone();
        if !self.sources.iter().any(|s| s == &silver.source) {
            self.sources.push(silver.source.clone());
        }
        self.updated_at = updated_at;
    }

    pub fn natural_filter(&self) -> Filter {
        Filter::new().eq("party_id", self.party_id.as_str())
    }
}

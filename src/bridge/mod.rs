//! # Bridge Source Client
//!
//! The bridge is the upstream system of record for holdings, parties and
//! herds. This crate only ever talks to it through [`BridgeClient`], a paged
//! query abstraction; the concrete HTTP transport lives in the embedding host.
//!
//! Every query returns an optional [`BridgePage`]: `None` and an empty page
//! are both treated by callers as "no more data". Bridge failures propagate
//! unchanged, since retry policy belongs to the dispatcher layer, not here.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};

pub mod memory;

pub use memory::InMemoryBridgeClient;

/// One page of a paged bridge query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgePage<T> {
    pub data: Vec<T>,
    pub count: i64,
    pub top: i64,
    pub skip: i64,
    pub total_count: i64,
}

impl<T> BridgePage<T> {
    pub fn new(data: Vec<T>, top: i64, skip: i64, total_count: i64) -> Self {
        let count = data.len() as i64;
        Self {
            data,
            count,
            top,
            skip,
            total_count,
        }
    }

    /// Number of rows actually returned in this page.
    pub fn returned(&self) -> i64 {
        self.data.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Window requested from a paged bridge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub top: i64,
    pub skip: i64,
}

impl PageRequest {
    pub fn new(top: i64, skip: i64) -> Self {
        Self { top, skip }
    }
}

/// Raw holding record as the bridge returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHolding {
    pub cph: String,
    pub holding_name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub county: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Raw party-at-holding association.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHoldingParty {
    pub party_id: String,
    pub cph: String,
    pub party_name: Option<String>,
}

/// Raw role a party plays at a holding (keeper, agent, owner).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePartyRole {
    pub party_id: String,
    pub cph: String,
    pub role: String,
}

/// Raw herd registered at a holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHerd {
    pub cph: String,
    pub herd_mark: String,
    pub species: Option<String>,
}

/// Raw group mark registered at a holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeGroupMark {
    pub cph: String,
    pub mark: String,
    pub species: Option<String>,
}

/// Raw party record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeParty {
    pub party_id: String,
    pub party_name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

/// Paged query surface of the bridge source.
///
/// `cph`/`party_id` filters narrow a dataset to one parent entity; `None`
/// walks the whole dataset (the scan path).
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn holdings_page(
        &self,
        page: PageRequest,
        cph: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHolding>>>;

    async fn holding_parties_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHoldingParty>>>;

    async fn party_roles_page(
        &self,
        cph: Option<&str>,
        party_id: Option<&str>,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgePartyRole>>>;

    async fn herds_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeHerd>>>;

    async fn group_marks_page(
        &self,
        cph: &str,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeGroupMark>>>;

    async fn parties_page(
        &self,
        page: PageRequest,
        party_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<BridgeParty>>>;
}

/// Drain a paged endpoint into one vector.
///
/// `fetch` is called with successive `top`/`skip` windows until the endpoint
/// returns `None`, an empty page or a short page. Used by import pipelines
/// that need every child record of one parent entity; scans page explicitly
/// instead so they can stop at a batch limit.
pub async fn fetch_all_pages<T, F, Fut>(page_size: i64, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Option<BridgePage<T>>>>,
{
    if page_size <= 0 {
        return Err(SyncError::InvalidArgument(format!(
            "page size must be positive, got {page_size}"
        )));
    }

    let mut all = Vec::new();
    let mut skip = 0i64;
    loop {
        let page = match fetch(PageRequest::new(page_size, skip)).await? {
            Some(page) if !page.is_empty() => page,
            _ => break,
        };
        let returned = page.returned();
        skip += returned;
        all.extend(page.data);
        if returned < page_size {
            break;
        }
    }
    Ok(all)
}

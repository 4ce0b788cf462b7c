//! Party import pipeline.
//!
//! Handles one `PartyUpdate` message: fetch the party and its role records
//! from the bridge, map them to silver, persist and reconcile, then merge
//! into the gold party. Mirrors the holding pipeline with a party-shaped
//! context; roles are reconciled scoped to this source and party id.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::{fetch_all_pages, BridgeClient, PageRequest};
use crate::constants::{subjects, DETAIL_PAGE_SIZE};
use crate::error::{Result, SyncError};
use crate::events::{EventPublisher, SyncEvent};
use crate::handlers::SyncStores;
use crate::messaging::envelope::UnwrappedMessage;
use crate::models::gold::GoldParty;
use crate::models::messages::PartyUpdateMessage;
use crate::models::silver::{SilverParty, SilverPartyRole};
use crate::orchestration::{Orchestrator, PartyImportContext, SyncStep};
use crate::reconciliation::{reconcile, Filter, Repository};
use crate::registry::MessageHandler;

/// Handles `PartyUpdate`: imports one party from the bridge.
pub struct PartyUpdateHandler {
    pipeline: Orchestrator<PartyImportContext>,
    default_source: String,
}

impl PartyUpdateHandler {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        stores: SyncStores,
        events: EventPublisher,
        default_source: &str,
    ) -> Self {
        let pipeline = Orchestrator::builder("party-import")
            .step(Arc::new(FetchPartyStep { bridge }))
            .step(Arc::new(MapPartyStep))
            .step(Arc::new(PersistPartyStep {
                stores: stores.clone(),
                events,
            }))
            .step(Arc::new(MergeGoldPartyStep {
                gold_parties: stores.gold_parties,
            }))
            .build();
        Self {
            pipeline,
            default_source: default_source.to_string(),
        }
    }
}

#[async_trait]
impl MessageHandler for PartyUpdateHandler {
    fn subject(&self) -> &str {
        subjects::PARTY_UPDATE
    }

    async fn handle(&self, message: &UnwrappedMessage, token: &CancellationToken) -> Result<()> {
        let parsed = PartyUpdateMessage::parse(&message.payload)?;
        if parsed.party_identifier.trim().is_empty() {
            return Err(SyncError::MalformedPayload(
                "party identifier is blank".to_string(),
            ));
        }
        let source = parsed
            .source
            .clone()
            .unwrap_or_else(|| self.default_source.clone());

        let mut ctx =
            PartyImportContext::new(&source, &message.correlation_id, &parsed.party_identifier);
        self.pipeline.execute(&mut ctx, token).await
    }
}

/// Pulls the party record and its roles from the bridge.
struct FetchPartyStep {
    bridge: Arc<dyn BridgeClient>,
}

#[async_trait]
impl SyncStep<PartyImportContext> for FetchPartyStep {
    fn name(&self) -> &str {
        "fetch-party"
    }

    async fn execute(&self, ctx: &mut PartyImportContext, token: &CancellationToken) -> Result<()> {
        let party_id = ctx.party_identifier.clone();

        let party_page = self
            .bridge
            .parties_page(PageRequest::new(1, 0), Some(&party_id), token)
            .await?;
        ctx.raw_party = party_page.and_then(|p| p.data.into_iter().next());

        ctx.raw_roles = fetch_all_pages(DETAIL_PAGE_SIZE, |page| {
            self.bridge
                .party_roles_page(None, Some(&party_id), page, token)
        })
        .await?;

        debug!(
            party_id = %ctx.party_identifier,
            party_found = ctx.raw_party.is_some(),
            roles = ctx.raw_roles.len(),
            "📥 Fetched party from bridge"
        );
        Ok(())
    }
}

struct MapPartyStep;

#[async_trait]
impl SyncStep<PartyImportContext> for MapPartyStep {
    fn name(&self) -> &str {
        "map-party"
    }

    async fn execute(
        &self,
        ctx: &mut PartyImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        match &ctx.raw_party {
            Some(raw) => {
                ctx.silver_party =
                    Some(SilverParty::from_bridge(&ctx.source, raw, ctx.retrieved_at));
            }
            None => {
                warn!(
                    party_id = %ctx.party_identifier,
                    source = %ctx.source,
                    "⚠️ Party not returned by bridge, keeping stored party"
                );
            }
        }

        ctx.silver_roles = ctx
            .raw_roles
            .iter()
            .map(|raw| SilverPartyRole::from_bridge(&ctx.source, raw, ctx.retrieved_at))
            .collect();
        Ok(())
    }
}

/// Upserts the silver party and reconciles its role set.
struct PersistPartyStep {
    stores: SyncStores,
    events: EventPublisher,
}

#[async_trait]
impl SyncStep<PartyImportContext> for PersistPartyStep {
    fn name(&self) -> &str {
        "persist-party"
    }

    async fn execute(
        &self,
        ctx: &mut PartyImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        if let Some(silver) = &mut ctx.silver_party {
            if let Some(existing) = self
                .stores
                .silver_parties
                .find_one(&silver.natural_filter())
                .await?
            {
                silver.adopt_identity(&existing);
            }
            self.stores
                .silver_parties
                .bulk_upsert(&[(silver.natural_filter(), silver.clone())])
                .await?;
        }

        let scope = Filter::new()
            .eq("source", ctx.source.as_str())
            .eq("party_id", ctx.party_identifier.as_str());
        let outcome = reconcile(
            self.stores.silver_party_roles.as_ref(),
            &scope,
            ctx.silver_roles.clone(),
            "party_roles",
        )
        .await?;
        self.events.publish(SyncEvent::ReconciliationApplied {
            entity: "party_roles".to_string(),
            upserts: outcome.upserted as usize,
            deletes: outcome.deleted as usize,
        });
        Ok(())
    }
}

/// Folds the imported silver party into the gold party.
struct MergeGoldPartyStep {
    gold_parties: Arc<dyn Repository<GoldParty>>,
}

#[async_trait]
impl SyncStep<PartyImportContext> for MergeGoldPartyStep {
    fn name(&self) -> &str {
        "merge-gold-party"
    }

    async fn execute(
        &self,
        ctx: &mut PartyImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        let Some(silver) = &ctx.silver_party else {
            debug!(party_id = %ctx.party_identifier, "No silver party, gold left unchanged");
            return Ok(());
        };

        let filter = Filter::new().eq("party_id", silver.party_id.as_str());
        let gold = match self.gold_parties.find_one(&filter).await? {
            Some(mut existing) => {
                existing.merge_silver(silver, ctx.retrieved_at);
                existing
            }
            None => GoldParty::from_silver(silver, ctx.retrieved_at),
        };
        self.gold_parties
            .bulk_upsert(&[(gold.natural_filter(), gold.clone())])
            .await?;
        ctx.gold_party = Some(gold);
        Ok(())
    }
}

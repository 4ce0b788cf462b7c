//! Holding import pipeline.
//!
//! Handles one `HoldingUpdate` message end to end: fetch the holding and
//! its child records from the bridge, map them to silver records stamped
//! with one retrieval timestamp, persist the holding and reconcile every
//! child set, then merge the result into the gold holding.
//!
//! Child sets are reconciled against the store scoped to this source and
//! CPH, so records the bridge no longer returns are deleted as orphans. A
//! holding the bridge no longer returns at all is left in place: deleting a
//! parent on a single empty read is riskier than carrying it stale.

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
use crate::models::gold::GoldHolding;
use crate::models::messages::HoldingUpdateMessage;
use crate::models::silver::{
    SilverGroupMark, SilverHerd, SilverHolding, SilverHoldingParty, SilverPartyRole,
};
use crate::orchestration::{HoldingImportContext, Orchestrator, SyncStep};
use crate::reconciliation::{reconcile, Filter};
use crate::registry::MessageHandler;

/// Handles `HoldingUpdate`: imports one holding from the bridge.
pub struct HoldingUpdateHandler {
    pipeline: Orchestrator<HoldingImportContext>,
    default_source: String,
}

impl HoldingUpdateHandler {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        stores: SyncStores,
        events: EventPublisher,
        default_source: &str,
    ) -> Self {
        let pipeline = Orchestrator::builder("holding-import")
            .step(Arc::new(FetchHoldingStep { bridge }))
            .step(Arc::new(MapHoldingStep))
            .step(Arc::new(PersistHoldingStep {
                stores: stores.clone(),
                events,
            }))
            .step(Arc::new(MergeGoldHoldingStep {
                gold_holdings: stores.gold_holdings,
            }))
            .build();
        Self {
            pipeline,
            default_source: default_source.to_string(),
        }
    }
}

#[async_trait]
impl MessageHandler for HoldingUpdateHandler {
    fn subject(&self) -> &str {
        subjects::HOLDING_UPDATE
    }

    async fn handle(&self, message: &UnwrappedMessage, token: &CancellationToken) -> Result<()> {
        let parsed = HoldingUpdateMessage::parse(&message.payload)?;
        if parsed.cph().trim().is_empty() {
            return Err(SyncError::MalformedPayload(
                "holding identifier is blank".to_string(),
            ));
        }
        let source = parsed
            .source
            .clone()
            .unwrap_or_else(|| self.default_source.clone());

        let mut ctx = HoldingImportContext::new(
            &source,
            &message.correlation_id,
            &parsed.holding_identifier,
        );
        self.pipeline.execute(&mut ctx, token).await
    }
}

/// Pulls the holding and all of its child records from the bridge.
struct FetchHoldingStep {
    bridge: Arc<dyn BridgeClient>,
}

#[async_trait]
impl SyncStep<HoldingImportContext> for FetchHoldingStep {
    fn name(&self) -> &str {
        "fetch-holding"
    }

    async fn execute(
        &self,
        ctx: &mut HoldingImportContext,
        token: &CancellationToken,
    ) -> Result<()> {
        let cph = ctx.cph.clone();

        let holding_page = self
            .bridge
            .holdings_page(PageRequest::new(1, 0), Some(&cph), token)
            .await?;
        ctx.raw_holding = holding_page.and_then(|p| p.data.into_iter().next());

        ctx.raw_parties = fetch_all_pages(DETAIL_PAGE_SIZE, |page| {
            self.bridge.holding_parties_page(&cph, page, token)
        })
        .await?;
        ctx.raw_roles = fetch_all_pages(DETAIL_PAGE_SIZE, |page| {
            self.bridge.party_roles_page(Some(&cph), None, page, token)
        })
        .await?;
        ctx.raw_herds = fetch_all_pages(DETAIL_PAGE_SIZE, |page| {
            self.bridge.herds_page(&cph, page, token)
        })
        .await?;
        ctx.raw_group_marks = fetch_all_pages(DETAIL_PAGE_SIZE, |page| {
            self.bridge.group_marks_page(&cph, page, token)
        })
        .await?;

        debug!(
            cph = %ctx.cph,
            holding_found = ctx.raw_holding.is_some(),
            parties = ctx.raw_parties.len(),
            roles = ctx.raw_roles.len(),
            herds = ctx.raw_herds.len(),
            group_marks = ctx.raw_group_marks.len(),
            "📥 Fetched holding from bridge"
        );
        Ok(())
    }
}

/// Maps raw bridge records to silver records stamped with one timestamp.
struct MapHoldingStep;

#[async_trait]
impl SyncStep<HoldingImportContext> for MapHoldingStep {
    fn name(&self) -> &str {
        "map-holding"
    }

    async fn execute(
        &self,
        ctx: &mut HoldingImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        match &ctx.raw_holding {
            Some(raw) => {
                ctx.silver_holding =
                    Some(SilverHolding::from_bridge(&ctx.source, raw, ctx.retrieved_at));
            }
            None => {
                warn!(
                    cph = %ctx.cph,
                    source = %ctx.source,
                    "⚠️ Holding not returned by bridge, keeping stored holding"
                );
            }
        }

        ctx.silver_parties = ctx
            .raw_parties
            .iter()
            .map(|raw| SilverHoldingParty::from_bridge(&ctx.source, raw, ctx.retrieved_at))
            .collect();
        ctx.silver_roles = ctx
            .raw_roles
            .iter()
            .map(|raw| SilverPartyRole::from_bridge(&ctx.source, raw, ctx.retrieved_at))
            .collect();
        ctx.silver_herds = ctx
            .raw_herds
            .iter()
            .map(|raw| SilverHerd::from_bridge(&ctx.source, raw, ctx.retrieved_at))
            .collect();
        ctx.silver_group_marks = ctx
            .raw_group_marks
            .iter()
            .map(|raw| SilverGroupMark::from_bridge(&ctx.source, raw, ctx.retrieved_at))
            .collect();
        Ok(())
    }
}

/// Upserts the silver holding and reconciles every child record set.
struct PersistHoldingStep {
    stores: SyncStores,
    events: EventPublisher,
}

impl PersistHoldingStep {
    fn publish_outcome(
        &self,
        entity: &str,
        outcome: &crate::reconciliation::ReconcileOutcome,
    ) {
        self.events.publish(SyncEvent::ReconciliationApplied {
            entity: entity.to_string(),
            upserts: outcome.upserted as usize,
            deletes: outcome.deleted as usize,
        });
    }
}

#[async_trait]
impl SyncStep<HoldingImportContext> for PersistHoldingStep {
    fn name(&self) -> &str {
        "persist-holding"
    }

    async fn execute(
        &self,
        ctx: &mut HoldingImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        if let Some(silver) = &mut ctx.silver_holding {
            if let Some(existing) = self
                .stores
                .silver_holdings
                .find_one(&silver.natural_filter())
                .await?
            {
                silver.adopt_identity(&existing);
            }
            self.stores
                .silver_holdings
                .bulk_upsert(&[(silver.natural_filter(), silver.clone())])
                .await?;
        }

        // Child sets are reconciled even when the holding vanished upstream,
        // so stale children do not outlive their parent's data.
        let scope = Filter::new()
            .eq("source", ctx.source.as_str())
            .eq("cph", ctx.cph.as_str());

        let outcome = reconcile(
            self.stores.silver_holding_parties.as_ref(),
            &scope,
            ctx.silver_parties.clone(),
            "holding_parties",
        )
        .await?;
        self.publish_outcome("holding_parties", &outcome);

        let outcome = reconcile(
            self.stores.silver_party_roles.as_ref(),
            &scope,
            ctx.silver_roles.clone(),
            "party_roles",
        )
        .await?;
        self.publish_outcome("party_roles", &outcome);

        let outcome = reconcile(
            self.stores.silver_herds.as_ref(),
            &scope,
            ctx.silver_herds.clone(),
            "herds",
        )
        .await?;
        self.publish_outcome("herds", &outcome);

        let outcome = reconcile(
            self.stores.silver_group_marks.as_ref(),
            &scope,
            ctx.silver_group_marks.clone(),
            "group_marks",
        )
        .await?;
        self.publish_outcome("group_marks", &outcome);

        Ok(())
    }
}

/// Folds the imported silver holding into the gold holding.
struct MergeGoldHoldingStep {
    gold_holdings: Arc<dyn crate::reconciliation::Repository<GoldHolding>>,
}

#[async_trait]
impl SyncStep<HoldingImportContext> for MergeGoldHoldingStep {
    fn name(&self) -> &str {
        "merge-gold-holding"
    }

    async fn execute(
        &self,
        ctx: &mut HoldingImportContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        let Some(silver) = &ctx.silver_holding else {
            debug!(cph = %ctx.cph, "No silver holding, gold left unchanged");
            return Ok(());
        };

        let filter = Filter::new().eq("cph", silver.cph.as_str());
        let gold = match self.gold_holdings.find_one(&filter).await? {
            Some(mut existing) => {
                existing.merge_silver(silver, ctx.retrieved_at);
                existing
            }
            None => GoldHolding::from_silver(silver, ctx.retrieved_at),
        };
        self.gold_holdings
            .bulk_upsert(&[(gold.natural_filter(), gold.clone())])
            .await?;
        ctx.gold_holding = Some(gold);
        Ok(())
    }
}

//! Paged bridge scans that fan out update messages.
//!
//! A scan walks one bridge dataset page by page and publishes an update
//! message per distinct, non-blank identifier. The heavy lifting happens
//! later, when the dispatcher imports each record individually, so a scan
//! never touches the stores itself.
//!
//! The cursor is owned by the caller and only ever moves forward, which is
//! what makes a run resumable after shutdown. Completion is decided by page
//! arithmetic alone:
//!
//! - a page shorter than the requested `top` ends the scan
//! - a null or empty page ends the scan with no page action
//! - a positive batch limit ends the scan once `skip` reaches it
//!
//! Identifier deduplication is run-scoped: a resumed run starts with an
//! empty seen-set, and an identifier republished across runs is absorbed
//! downstream by FIFO deduplication and idempotent imports.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeClient, BridgePage, PageRequest};
use crate::config::ScanKindConfig;
use crate::constants::ScanKind;
use crate::error::Result;
use crate::events::{EventPublisher, SyncEvent};
use crate::messaging::{MessagePublisher, OutboundMessage};
use crate::models::{HoldingUpdateMessage, PartyUpdateMessage};

/// Resumable position within one scan of a bridge dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor {
    /// Page size for this scan. Initialized from config on first use and
    /// kept stable afterwards so the completion arithmetic stays coherent.
    pub current_top: Option<i64>,
    /// Offset of the next page.
    pub current_skip: i64,
    /// Rows the last page actually returned.
    pub current_count: i64,
    /// Dataset size as reported by the bridge on the last page.
    pub total_count: i64,
    pub scan_completed: bool,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one fetched page and recompute completion.
    ///
    /// A page shorter than `top` means the dataset is exhausted. A positive
    /// `batch_limit` completes the scan once `skip` reaches it, bounding how
    /// far a single run may walk.
    pub fn advance(&mut self, returned: i64, total_count: i64, batch_limit: i64) {
        self.current_count = returned;
        self.total_count = total_count;
        self.current_skip += returned;
        let top = self.current_top.unwrap_or(0);
        self.scan_completed =
            returned < top || (batch_limit > 0 && self.current_skip >= batch_limit);
    }
}

/// Counters for one pager run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages: u32,
    /// Identifiers returned by the bridge, blanks and duplicates included.
    pub seen: usize,
    /// Update messages actually published.
    pub published: usize,
    /// Identifiers skipped because they already appeared earlier in the run.
    pub duplicates_skipped: usize,
    /// Skip position when the run ended.
    pub final_skip: i64,
    /// False when the run was interrupted by shutdown before finishing.
    pub completed: bool,
}

/// One scannable bridge dataset.
///
/// Implementations reduce each page to bare identifiers and build the update
/// message published for each one; the pager owns blank-skipping,
/// deduplication and cursor movement.
#[async_trait]
pub trait PagedScan: Send + Sync {
    fn kind(&self) -> ScanKind;

    /// Source system the identifiers belong to.
    fn source_system(&self) -> &str;

    /// One page of identifiers, `None` when the bridge reports no page.
    async fn fetch_page(
        &self,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<String>>>;

    fn update_message(&self, identifier: &str, correlation_id: &str) -> Result<OutboundMessage>;
}

/// Scans the holdings dataset, publishing one holding-update per CPH.
pub struct HoldingScan {
    bridge: Arc<dyn BridgeClient>,
    source: String,
}

impl HoldingScan {
    pub fn new(bridge: Arc<dyn BridgeClient>, source: impl Into<String>) -> Self {
        Self {
            bridge,
            source: source.into(),
        }
    }
}

#[async_trait]
impl PagedScan for HoldingScan {
    fn kind(&self) -> ScanKind {
        ScanKind::BulkScan
    }

    fn source_system(&self) -> &str {
        &self.source
    }

    async fn fetch_page(
        &self,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<String>>> {
        let fetched = self.bridge.holdings_page(page, None, token).await?;
        Ok(fetched.map(|p| {
            let cphs = p.data.into_iter().map(|h| h.cph).collect();
            BridgePage::new(cphs, p.top, p.skip, p.total_count)
        }))
    }

    fn update_message(&self, identifier: &str, correlation_id: &str) -> Result<OutboundMessage> {
        // Holding identifiers travel source-qualified so mixed-source
        // consumers can tell them apart.
        let qualified = format!("{}:{}", self.source, identifier);
        HoldingUpdateMessage::new(qualified, self.source.as_str()).to_outbound(correlation_id)
    }
}

/// Scans the parties dataset, publishing one party-update per party id.
pub struct PartyScan {
    bridge: Arc<dyn BridgeClient>,
    source: String,
}

impl PartyScan {
    pub fn new(bridge: Arc<dyn BridgeClient>, source: impl Into<String>) -> Self {
        Self {
            bridge,
            source: source.into(),
        }
    }
}

#[async_trait]
impl PagedScan for PartyScan {
    fn kind(&self) -> ScanKind {
        ScanKind::PartyScan
    }

    fn source_system(&self) -> &str {
        &self.source
    }

    async fn fetch_page(
        &self,
        page: PageRequest,
        token: &CancellationToken,
    ) -> Result<Option<BridgePage<String>>> {
        let fetched = self.bridge.parties_page(page, None, token).await?;
        Ok(fetched.map(|p| {
            let ids = p.data.into_iter().map(|party| party.party_id).collect();
            BridgePage::new(ids, p.top, p.skip, p.total_count)
        }))
    }

    fn update_message(&self, identifier: &str, correlation_id: &str) -> Result<OutboundMessage> {
        PartyUpdateMessage::new(identifier, self.source.as_str()).to_outbound(correlation_id)
    }
}

/// Drives a [`PagedScan`] forward from a caller-owned cursor.
pub struct ScanPager {
    publisher: Arc<dyn MessagePublisher>,
    events: EventPublisher,
    config: ScanKindConfig,
}

impl ScanPager {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        events: EventPublisher,
        config: ScanKindConfig,
    ) -> Self {
        Self {
            publisher,
            events,
            config,
        }
    }

    /// Run the scan until the dataset is exhausted, the batch limit is
    /// reached, or shutdown interrupts the run.
    ///
    /// Interruption returns partial stats with `completed: false` and the
    /// cursor parked where the run stopped, so the caller can leave the
    /// triggering request for redelivery. Fetch and publish errors propagate
    /// with the cursor still pointing at the failed page.
    pub async fn run(
        &self,
        scan: &dyn PagedScan,
        cursor: &mut ScanCursor,
        correlation_id: &str,
        token: &CancellationToken,
    ) -> Result<ScanStats> {
        let kind = scan.kind();
        let source = scan.source_system().to_string();
        let mut stats = ScanStats::default();
        let mut seen_this_run: HashSet<String> = HashSet::new();

        if cursor.scan_completed {
            debug!(
                source = %source,
                scan_kind = %kind,
                "Scan already completed, nothing to do"
            );
            stats.completed = true;
            stats.final_skip = cursor.current_skip;
            return Ok(stats);
        }

        info!(
            source = %source,
            scan_kind = %kind,
            skip = cursor.current_skip,
            batch_limit = self.config.batch_limit,
            correlation_id,
            "🚀 Starting scan run"
        );

        while !cursor.scan_completed {
            if token.is_cancelled() {
                warn!(
                    source = %source,
                    scan_kind = %kind,
                    skip = cursor.current_skip,
                    "🔄 Scan interrupted, cursor parked"
                );
                stats.final_skip = cursor.current_skip;
                return Ok(stats);
            }

            let top = *cursor.current_top.get_or_insert(self.config.page_size);
            let request = PageRequest::new(top, cursor.current_skip);

            let page = match scan.fetch_page(request, token).await? {
                Some(page) if !page.is_empty() => page,
                // Null and empty pages end the scan without a page action.
                _ => {
                    cursor.scan_completed = true;
                    break;
                }
            };

            let returned = page.returned();
            let total_count = page.total_count;
            let mut published_this_page = 0usize;

            for identifier in &page.data {
                stats.seen += 1;
                let trimmed = identifier.trim();
                if trimmed.is_empty() {
                    debug!(source = %source, scan_kind = %kind, "Skipping blank identifier");
                    continue;
                }
                if !seen_this_run.insert(trimmed.to_string()) {
                    stats.duplicates_skipped += 1;
                    debug!(
                        source = %source,
                        scan_kind = %kind,
                        identifier = trimmed,
                        "Skipping identifier already published this run"
                    );
                    continue;
                }
                let message = scan.update_message(trimmed, correlation_id)?;
                self.publisher.publish(message, token).await?;
                published_this_page += 1;
            }

            stats.published += published_this_page;
            cursor.advance(returned, total_count, self.config.batch_limit);
            stats.pages += 1;

            debug!(
                source = %source,
                scan_kind = %kind,
                page = stats.pages,
                returned,
                published = published_this_page,
                skip = cursor.current_skip,
                total_count = cursor.total_count,
                "📋 Scan page processed"
            );
            self.events.publish(SyncEvent::ScanPageProcessed {
                source: source.clone(),
                scan_kind: kind,
                page_returned: returned,
                published: published_this_page,
                skip: cursor.current_skip,
            });

            let delay = self.config.page_delay();
            if !cursor.scan_completed && !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {
                        warn!(
                            source = %source,
                            scan_kind = %kind,
                            skip = cursor.current_skip,
                            "🔄 Scan interrupted during page delay"
                        );
                        stats.final_skip = cursor.current_skip;
                        return Ok(stats);
                    }
                    _ = sleep(delay) => {}
                }
            }
        }

        stats.completed = true;
        stats.final_skip = cursor.current_skip;
        info!(
            source = %source,
            scan_kind = %kind,
            pages = stats.pages,
            published = stats.published,
            duplicates_skipped = stats.duplicates_skipped,
            final_skip = stats.final_skip,
            "✅ Scan completed"
        );
        self.events.publish(SyncEvent::ScanCompleted {
            source,
            scan_kind: kind,
            total_published: stats.published,
            pages: stats.pages,
        });
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use crate::error::SyncError;

    use super::*;

    /// Serves a scripted sequence of identifier pages.
    struct ScriptedScan {
        pages: Mutex<Vec<Option<Vec<&'static str>>>>,
        requests: Mutex<Vec<PageRequest>>,
        total_count: i64,
    }

    impl ScriptedScan {
        fn new(pages: Vec<Option<Vec<&'static str>>>, total_count: i64) -> Self {
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
                total_count,
            }
        }
    }

    #[async_trait]
    impl PagedScan for ScriptedScan {
        fn kind(&self) -> ScanKind {
            ScanKind::BulkScan
        }

        fn source_system(&self) -> &str {
            "SAM"
        }

        async fn fetch_page(
            &self,
            page: PageRequest,
            _token: &CancellationToken,
        ) -> Result<Option<BridgePage<String>>> {
            self.requests.lock().push(page);
            let mut pages = self.pages.lock();
            if pages.is_empty() {
                return Ok(None);
            }
            Ok(pages.remove(0).map(|ids| {
                let ids = ids.into_iter().map(str::to_string).collect();
                BridgePage::new(ids, page.top, page.skip, self.total_count)
            }))
        }

        fn update_message(
            &self,
            identifier: &str,
            correlation_id: &str,
        ) -> Result<OutboundMessage> {
            let qualified = format!("SAM:{identifier}");
            HoldingUpdateMessage::new(qualified, "SAM").to_outbound(correlation_id)
        }
    }

    /// Records published messages; optionally cancels a token after N sends.
    struct CapturingPublisher {
        sent: Mutex<Vec<OutboundMessage>>,
        cancel_after: Option<usize>,
        token: CancellationToken,
    }

    impl CapturingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                cancel_after: None,
                token: CancellationToken::new(),
            })
        }

        fn cancelling_after(count: usize, token: CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                cancel_after: Some(count),
                token,
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl MessagePublisher for CapturingPublisher {
        async fn publish(&self, message: OutboundMessage, _token: &CancellationToken) -> Result<()> {
            let mut sent = self.sent.lock();
            sent.push(message);
            if let Some(limit) = self.cancel_after {
                if sent.len() >= limit {
                    self.token.cancel();
                }
            }
            Ok(())
        }
    }

    fn pager(publisher: Arc<dyn MessagePublisher>, config: ScanKindConfig) -> ScanPager {
        ScanPager::new(publisher, EventPublisher::new(64), config)
    }

    fn config(page_size: i64, batch_limit: i64) -> ScanKindConfig {
        ScanKindConfig {
            page_size,
            batch_limit,
            ..ScanKindConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scan_walks_pages_until_short_page() {
        let scan = ScriptedScan::new(
            vec![
                Some(vec!["A1", "A2", "A3", "A4", "A5"]),
                Some(vec!["B1", "B2", "B3", "B4", "B5"]),
                Some(vec!["C1", "C2", "C3"]),
            ],
            13,
        );
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.pages, 3);
        assert_eq!(stats.published, 13);
        assert_eq!(stats.final_skip, 13);
        assert!(stats.completed);
        assert!(cursor.scan_completed);
        assert_eq!(cursor.current_top, Some(5));
        assert_eq!(cursor.total_count, 13);
        assert_eq!(
            scan.requests
                .lock()
                .iter()
                .map(|r| (r.top, r.skip))
                .collect::<Vec<_>>(),
            [(5, 0), (5, 5), (5, 10)]
        );
        assert_eq!(publisher.sent_count(), 13);
    }

    #[tokio::test]
    async fn test_cross_page_duplicate_published_once() {
        // Second page repeats one identifier from the first.
        let scan = ScriptedScan::new(
            vec![
                Some(vec!["A", "B", "C", "D", "E"]),
                Some(vec!["E", "F", "G"]),
            ],
            8,
        );
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.published, 7);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(stats.seen, 8);
        assert_eq!(cursor.current_skip, 8);
        assert!(cursor.scan_completed);
        assert_eq!(publisher.sent_count(), 7);
    }

    #[tokio::test]
    async fn test_batch_limit_completes_mid_dataset() {
        let scan = ScriptedScan::new(
            vec![
                Some(vec!["A1", "A2", "A3", "A4", "A5"]),
                Some(vec!["B1", "B2", "B3", "B4", "B5"]),
                Some(vec!["C1", "C2", "C3", "C4", "C5"]),
            ],
            50,
        );
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 8));
        let mut cursor = ScanCursor::new();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        // skip reaches 10 >= limit 8 after the second page.
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.published, 10);
        assert!(stats.completed);
        assert!(cursor.scan_completed);
        assert_eq!(cursor.current_skip, 10);
    }

    #[tokio::test]
    async fn test_null_page_completes_without_page_action() {
        let scan = ScriptedScan::new(vec![None], 0);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();
        let mut events = p.events.subscribe();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.pages, 0);
        assert_eq!(stats.published, 0);
        assert!(stats.completed);
        assert!(cursor.scan_completed);
        assert_eq!(cursor.current_skip, 0);
        // Straight to completion: no page event was published.
        match events.recv().await.unwrap().event {
            SyncEvent::ScanCompleted {
                total_published, ..
            } => assert_eq!(total_published, 0),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_page_completes_without_page_action() {
        let scan = ScriptedScan::new(vec![Some(vec![])], 0);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.pages, 0);
        assert!(stats.completed);
        assert!(cursor.scan_completed);
        assert_eq!(publisher.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_identifiers_are_skipped() {
        let scan = ScriptedScan::new(vec![Some(vec!["  ", "A", ""])], 3);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.published, 1);
        assert_eq!(stats.seen, 3);
        assert_eq!(stats.duplicates_skipped, 0);
        assert_eq!(publisher.sent_count(), 1);
        // Blank rows still count toward the page arithmetic.
        assert_eq!(cursor.current_skip, 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page_parks_cursor() {
        let scan = ScriptedScan::new(vec![Some(vec!["A"])], 1);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();
        let token = CancellationToken::new();
        token.cancel();

        let stats = p.run(&scan, &mut cursor, "corr-1", &token).await.unwrap();

        assert!(!stats.completed);
        assert_eq!(stats.pages, 0);
        assert!(!cursor.scan_completed);
        assert!(scan.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_between_pages_stops_the_run() {
        let scan = ScriptedScan::new(
            vec![
                Some(vec!["A1", "A2", "A3", "A4", "A5"]),
                Some(vec!["B1", "B2", "B3", "B4", "B5"]),
            ],
            10,
        );
        let token = CancellationToken::new();
        let publisher = CapturingPublisher::cancelling_after(5, token.clone());
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor::new();

        let stats = p.run(&scan, &mut cursor, "corr-1", &token).await.unwrap();

        assert!(!stats.completed);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.published, 5);
        assert!(!cursor.scan_completed);
        // Cursor parked at the next page, ready for a resumed run.
        assert_eq!(cursor.current_skip, 5);
        assert_eq!(scan.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_cursor_is_not_rescanned() {
        let scan = ScriptedScan::new(vec![Some(vec!["A"])], 1);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor {
            scan_completed: true,
            current_skip: 42,
            ..ScanCursor::new()
        };

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        assert!(stats.completed);
        assert_eq!(stats.pages, 0);
        assert_eq!(stats.final_skip, 42);
        assert!(scan.requests.lock().is_empty());
        assert_eq!(publisher.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_resumed_cursor_keeps_its_top() {
        let scan = ScriptedScan::new(vec![Some(vec!["F", "G"])], 10);
        let publisher = CapturingPublisher::new();
        // Config says 5 but the cursor was started with top 3; the run
        // keeps paging at 3.
        let p = pager(publisher.clone(), config(5, 0));
        let mut cursor = ScanCursor {
            current_top: Some(3),
            current_skip: 6,
            ..ScanCursor::new()
        };

        let stats = p
            .run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        {
            let requests = scan.requests.lock();
            assert_eq!((requests[0].top, requests[0].skip), (3, 6));
        }
        assert!(stats.completed);
        assert_eq!(cursor.current_skip, 8);
    }

    #[tokio::test]
    async fn test_page_and_completion_events_in_order() {
        let scan = ScriptedScan::new(vec![Some(vec!["A", "B", "C"])], 3);
        let publisher = CapturingPublisher::new();
        let p = pager(publisher, config(5, 0));
        let mut events = p.events.subscribe();
        let mut cursor = ScanCursor::new();

        p.run(&scan, &mut cursor, "corr-1", &CancellationToken::new())
            .await
            .unwrap();

        match events.recv().await.unwrap().event {
            SyncEvent::ScanPageProcessed {
                page_returned,
                published,
                skip,
                ..
            } => {
                assert_eq!(page_returned, 3);
                assert_eq!(published, 3);
                assert_eq!(skip, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match events.recv().await.unwrap().event {
            SyncEvent::ScanCompleted {
                total_published,
                pages,
                ..
            } => {
                assert_eq!(total_published, 3);
                assert_eq!(pages, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_with_cursor_parked() {
        struct FailingScan;

        #[async_trait]
        impl PagedScan for FailingScan {
            fn kind(&self) -> ScanKind {
                ScanKind::BulkScan
            }

            fn source_system(&self) -> &str {
                "SAM"
            }

            async fn fetch_page(
                &self,
                _page: PageRequest,
                _token: &CancellationToken,
            ) -> Result<Option<BridgePage<String>>> {
                Err(SyncError::Bridge("503 from upstream".to_string()))
            }

            fn update_message(
                &self,
                identifier: &str,
                correlation_id: &str,
            ) -> Result<OutboundMessage> {
                HoldingUpdateMessage::new(identifier, "SAM").to_outbound(correlation_id)
            }
        }

        let publisher = CapturingPublisher::new();
        let p = pager(publisher, config(5, 0));
        let mut cursor = ScanCursor::new();

        let err = p
            .run(
                &FailingScan,
                &mut cursor,
                "corr-1",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Bridge(_)));
        assert!(!cursor.scan_completed);
        assert_eq!(cursor.current_skip, 0);
    }

    #[test]
    fn test_cursor_advance_arithmetic() {
        let mut cursor = ScanCursor::new();
        cursor.current_top = Some(5);

        cursor.advance(5, 8, 0);
        assert!(!cursor.scan_completed);
        assert_eq!(cursor.current_skip, 5);

        cursor.advance(3, 8, 0);
        assert!(cursor.scan_completed);
        assert_eq!(cursor.current_skip, 8);

        let mut limited = ScanCursor::new();
        limited.current_top = Some(5);
        limited.advance(5, 50, 5);
        assert!(limited.scan_completed);
    }

    #[tokio::test]
    async fn test_holding_scan_maps_pages_and_messages() {
        use crate::bridge::{BridgeHolding, InMemoryBridgeClient};

        let bridge = InMemoryBridgeClient::new();
        bridge.add_holding(BridgeHolding {
            cph: "12/345/6789".to_string(),
            holding_name: Some("Hill Farm".to_string()),
            address: None,
            postcode: None,
            county: None,
            last_updated: None,
        });
        let scan = HoldingScan::new(Arc::new(bridge), "SAM");

        assert_eq!(scan.kind(), ScanKind::BulkScan);
        let page = scan
            .fetch_page(PageRequest::new(10, 0), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.data, ["12/345/6789"]);

        let message = scan.update_message("12/345/6789", "corr-9").unwrap();
        let payload: HoldingUpdateMessage = serde_json::from_str(&message.body).unwrap();
        assert_eq!(payload.holding_identifier, "SAM:12/345/6789");
        assert_eq!(payload.source.as_deref(), Some("SAM"));
    }

    #[tokio::test]
    async fn test_party_scan_uses_raw_party_ids() {
        use crate::bridge::{BridgeParty, InMemoryBridgeClient};

        let bridge = InMemoryBridgeClient::new();
        bridge.add_party(BridgeParty {
            party_id: "P-100".to_string(),
            party_name: Some("J Smith".to_string()),
            email: None,
            telephone: None,
        });
        let scan = PartyScan::new(Arc::new(bridge), "SAM");

        assert_eq!(scan.kind(), ScanKind::PartyScan);
        let page = scan
            .fetch_page(PageRequest::new(10, 0), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.data, ["P-100"]);

        let message = scan.update_message("P-100", "corr-9").unwrap();
        let payload: PartyUpdateMessage = serde_json::from_str(&message.body).unwrap();
        assert_eq!(payload.party_identifier, "P-100");
    }
}

//! Interval-driven scan scheduling.
//!
//! [`ScheduledScanRunner`] wakes on a fixed interval and runs every enabled
//! scan kind back to back under the per-source scan lease. The first run
//! happens one full interval after startup, so a fleet restart does not
//! trigger an immediate scan stampede; the lease then serializes runs across
//! processes, and a process that loses the race simply waits for its next
//! interval.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::bridge::BridgeClient;
use crate::config::{LockConfig, ScansConfig};
use crate::error::{Result, SyncError};
use crate::events::EventPublisher;
use crate::locking::LockRunner;
use crate::messaging::queue::MessagePublisher;
use crate::orchestration::{
    HoldingScan, Orchestrator, PartyScan, ScanContext, ScanCursor, ScanPager, SyncStep,
};

/// Result of one scheduled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRunOutcome {
    /// Every enabled scan ran to completion.
    Completed { published: usize },
    /// Another process holds the scan lease; nothing was scanned.
    SkippedLockHeld,
}

/// Runs the enabled scans for one source system on a fixed interval.
pub struct ScheduledScanRunner {
    bridge: Arc<dyn BridgeClient>,
    publisher: Arc<dyn MessagePublisher>,
    events: EventPublisher,
    lock_runner: Arc<LockRunner>,
    scans: ScansConfig,
    lock: LockConfig,
    source_system: String,
}

impl ScheduledScanRunner {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        publisher: Arc<dyn MessagePublisher>,
        events: EventPublisher,
        lock_runner: Arc<LockRunner>,
        scans: ScansConfig,
        lock: LockConfig,
        source_system: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            publisher,
            events,
            lock_runner,
            scans,
            lock,
            source_system: source_system.into(),
        }
    }

    /// Loop until `token` is cancelled, attempting a run once per interval.
    ///
    /// A failed run is logged and the loop keeps going; the next interval
    /// starts a fresh scan from the beginning of the dataset.
    pub async fn run(&self, token: &CancellationToken) {
        let interval = self.scans.schedule_interval();
        info!(
            source = %self.source_system,
            interval_secs = interval.as_secs(),
            "🚀 Scheduled scan runner started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match self.run_once(token).await {
                Ok(ScanRunOutcome::Completed { published }) => {
                    info!(
                        source = %self.source_system,
                        published,
                        "Scheduled scan run finished"
                    );
                }
                Ok(ScanRunOutcome::SkippedLockHeld) => {
                    debug!(
                        source = %self.source_system,
                        "Scheduled scan skipped, lease held elsewhere"
                    );
                }
                Err(e) if e.is_cancelled() => {
                    info!(source = %self.source_system, "🔄 Scheduled scan interrupted by shutdown");
                }
                Err(e) => {
                    error!(
                        source = %self.source_system,
                        error = %e,
                        "❌ Scheduled scan run failed"
                    );
                }
            }
        }

        info!(source = %self.source_system, "👋 Scheduled scan runner stopped");
    }

    /// Run every enabled scan once, under the scan lease.
    ///
    /// With every kind disabled this returns immediately without touching
    /// the lock.
    pub async fn run_once(&self, token: &CancellationToken) -> Result<ScanRunOutcome> {
        let mut builder = Orchestrator::builder("scheduled-scan");
        if self.scans.holdings.enabled {
            builder = builder.step(Arc::new(HoldingScanStep {
                scan: HoldingScan::new(self.bridge.clone(), self.source_system.clone()),
                pager: ScanPager::new(
                    self.publisher.clone(),
                    self.events.clone(),
                    self.scans.holdings.clone(),
                ),
            }));
        }
        if self.scans.parties.enabled {
            builder = builder.step(Arc::new(PartyScanStep {
                scan: PartyScan::new(self.bridge.clone(), self.source_system.clone()),
                pager: ScanPager::new(
                    self.publisher.clone(),
                    self.events.clone(),
                    self.scans.parties.clone(),
                ),
            }));
        }
        let pipeline = builder.build();
        if pipeline.step_names().is_empty() {
            debug!(source = %self.source_system, "No scan kinds enabled, nothing to do");
            return Ok(ScanRunOutcome::Completed { published: 0 });
        }

        let key = self.lock.scan_lock_key(&self.source_system);
        let source = self.source_system.clone();
        let correlation_id = Uuid::new_v4().to_string();

        let outcome = self
            .lock_runner
            .run_exclusive(&key, token, move |scan_token| async move {
                let mut ctx = ScanContext::new(&source, &correlation_id);
                pipeline.execute(&mut ctx, &scan_token).await?;
                Ok(ctx)
            })
            .await?;

        match outcome {
            None => Ok(ScanRunOutcome::SkippedLockHeld),
            Some(ctx) => Ok(ScanRunOutcome::Completed {
                published: ctx.total_published(),
            }),
        }
    }
}

/// Scans the holdings dataset from a fresh cursor.
struct HoldingScanStep {
    scan: HoldingScan,
    pager: ScanPager,
}

#[async_trait]
impl SyncStep<ScanContext> for HoldingScanStep {
    fn name(&self) -> &str {
        "scan-holdings"
    }

    async fn execute(&self, ctx: &mut ScanContext, token: &CancellationToken) -> Result<()> {
        let mut cursor = ScanCursor::new();
        let stats = self
            .pager
            .run(&self.scan, &mut cursor, &ctx.correlation_id, token)
            .await?;
        if !stats.completed {
            return Err(SyncError::Cancelled);
        }
        ctx.holdings = Some(stats);
        Ok(())
    }
}

/// Scans the parties dataset from a fresh cursor.
struct PartyScanStep {
    scan: PartyScan,
    pager: ScanPager,
}

#[async_trait]
impl SyncStep<ScanContext> for PartyScanStep {
    fn name(&self) -> &str {
        "scan-parties"
    }

    async fn execute(&self, ctx: &mut ScanContext, token: &CancellationToken) -> Result<()> {
        let mut cursor = ScanCursor::new();
        let stats = self
            .pager
            .run(&self.scan, &mut cursor, &ctx.correlation_id, token)
            .await?;
        if !stats.completed {
            return Err(SyncError::Cancelled);
        }
        ctx.parties = Some(stats);
        Ok(())
    }
}

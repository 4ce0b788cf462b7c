//! Lock-guarded execution with background lease renewal.
//!
//! [`LockRunner::run_exclusive`] wraps a unit of work in the full lease
//! lifecycle: acquire, renew on an interval from a spawned task, run the
//! work, then release. The work receives a child cancellation token; when a
//! renewal attempt finds the lease lost or the store unreachable, that token
//! is cancelled and the whole run fails with
//! [`SyncError::LockRenewalFailed`] so a lapsed lease can never let the
//! guarded work keep running silently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{AcquireResult, LockStore};
use crate::error::{Result, SyncError};
use crate::events::{EventPublisher, SyncEvent};

pub struct LockRunner {
    store: Arc<dyn LockStore>,
    renew_interval: Duration,
    owner: String,
    events: EventPublisher,
}

impl LockRunner {
    pub fn new(
        store: Arc<dyn LockStore>,
        renew_interval: Duration,
        events: EventPublisher,
    ) -> Self {
        let owner = format!("{}-{}", std::process::id(), Uuid::new_v4());
        Self {
            store,
            renew_interval,
            owner,
            events,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Run `work` while holding the lease on `key`.
    ///
    /// Returns `Ok(None)` when another process holds the lease. The work's
    /// token is a child of `parent`, so external shutdown also cancels it.
    pub async fn run_exclusive<T, F, Fut>(
        &self,
        key: &str,
        parent: &CancellationToken,
        work: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let lease_token = match self.store.try_acquire(key, &self.owner).await? {
            AcquireResult::Acquired { token, ttl } => {
                info!(key = %key, owner = %self.owner, ttl_secs = ttl.as_secs(), "🔒 Lock acquired");
                self.events.publish(SyncEvent::LockAcquired {
                    key: key.to_string(),
                });
                token
            }
            AcquireResult::Held { holder } => {
                info!(
                    key = %key,
                    holder = holder.as_deref().unwrap_or("<unknown>"),
                    "Lock held elsewhere, skipping"
                );
                return Ok(None);
            }
        };

        let guard = parent.child_token();
        let renewal = self.spawn_renewal(key, &lease_token, guard.clone());

        let work_result = work(guard.clone()).await;

        // Stop the renewal loop and collect its verdict before releasing.
        guard.cancel();
        let renewal_result = match renewal.await {
            Ok(result) => result,
            Err(join_error) => Err(SyncError::LockStore(format!(
                "renewal task failed: {join_error}"
            ))),
        };

        match self.store.release(key, &lease_token).await {
            Ok(true) => {
                debug!(key = %key, "🔓 Lock released");
                self.events.publish(SyncEvent::LockReleased {
                    key: key.to_string(),
                });
            }
            Ok(false) => warn!(key = %key, "Lease already gone at release"),
            Err(e) => warn!(key = %key, error = %e, "Lock release failed, lease will expire"),
        }

        // A failed renewal outranks the work result: the work was cancelled
        // mid-flight and must not report success.
        renewal_result?;
        work_result.map(Some)
    }

    fn spawn_renewal(
        &self,
        key: &str,
        lease_token: &str,
        guard: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let store = self.store.clone();
        let events = self.events.clone();
        let key = key.to_string();
        let lease_token = lease_token.to_string();
        let interval = self.renew_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(interval) => {}
                }

                match store.renew(&key, &lease_token).await {
                    Ok(result) if result.is_renewed() => {
                        trace!(key = %key, "Lease renewed");
                    }
                    Ok(result) => {
                        error!(key = %key, result = ?result, "❌ Lease renewal lost, cancelling guarded work");
                        events.publish(SyncEvent::LockRenewalFailed { key: key.clone() });
                        guard.cancel();
                        return Err(SyncError::LockRenewalFailed { key });
                    }
                    Err(e) => {
                        // Cannot prove the lease is still ours; assume the
                        // worst and stop the work.
                        error!(key = %key, error = %e, "❌ Lease renewal errored, cancelling guarded work");
                        events.publish(SyncEvent::LockRenewalFailed { key: key.clone() });
                        guard.cancel();
                        return Err(SyncError::LockRenewalFailed { key });
                    }
                }
            }
        })
    }
}

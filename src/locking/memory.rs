//! In-memory lock store for tests and single-process runs.
//!
//! No cross-process coordination and no persistence; leases live in a map
//! guarded by a mutex.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{AcquireResult, LockStore, RenewalResult};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct InMemoryLockStore {
    leases: Mutex<HashMap<String, Lease>>,
    ttl: Duration,
}

impl InMemoryLockStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::seconds(60))
    }

    /// Force-expire a lease, simulating a crashed holder.
    pub fn expire(&self, key: &str) {
        if let Some(lease) = self.leases.lock().get_mut(key) {
            lease.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    /// Invalidate the token of a live lease, simulating a takeover.
    pub fn rotate_token(&self, key: &str) {
        if let Some(lease) = self.leases.lock().get_mut(key) {
            lease.token = Uuid::new_v4().to_string();
        }
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn try_acquire(&self, key: &str, owner: &str) -> Result<AcquireResult> {
        let mut leases = self.leases.lock();
        let now = Utc::now();

        if let Some(lease) = leases.get(key) {
            if lease.expires_at > now && lease.holder != owner {
                return Ok(AcquireResult::Held {
                    holder: Some(lease.holder.clone()),
                });
            }
            // Expired, or our own lease being re-taken with a fresh token.
        }

        let token = Uuid::new_v4().to_string();
        leases.insert(
            key.to_string(),
            Lease {
                holder: owner.to_string(),
                token: token.clone(),
                expires_at: self.expiry(now),
            },
        );
        Ok(AcquireResult::Acquired {
            token,
            ttl: self.ttl,
        })
    }

    async fn renew(&self, key: &str, token: &str) -> Result<RenewalResult> {
        let mut leases = self.leases.lock();
        let now = Utc::now();

        let Some(lease) = leases.get_mut(key) else {
            return Ok(RenewalResult::Lost);
        };
        if lease.token != token {
            return Ok(RenewalResult::InvalidToken);
        }
        if lease.expires_at <= now {
            return Ok(RenewalResult::Lost);
        }

        lease.expires_at = self.expiry(now);
        Ok(RenewalResult::Renewed { ttl: self.ttl })
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let mut leases = self.leases.lock();
        let Some(lease) = leases.get(key) else {
            return Ok(false);
        };
        if lease.token != token {
            return Ok(false);
        }
        leases.remove(key);
        Ok(true)
    }

    async fn current_holder(&self, key: &str) -> Result<Option<String>> {
        let leases = self.leases.lock();
        let now = Utc::now();
        Ok(leases.get(key).and_then(|lease| {
            if lease.expires_at > now {
                Some(lease.holder.clone())
            } else {
                None
            }
        }))
    }
}

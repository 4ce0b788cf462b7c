//! PostgreSQL lock store.
//!
//! Leases live in a single table; acquisition is one upsert that only steals
//! the row when the existing lease has expired or already belongs to the
//! caller, so two processes can never both hold a live lease on one key.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::{AcquireResult, LockStore, RenewalResult};
use crate::error::{Result, SyncError};

const LOCKS_TABLE: &str = "bridge_sync_locks";

#[derive(Debug, Clone)]
pub struct PostgresLockStore {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresLockStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Create the lease table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {LOCKS_TABLE} (
                key TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                token TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("failed to create lease table: {e}")))?;
        Ok(())
    }

    fn ttl_secs(&self) -> f64 {
        self.ttl.as_secs_f64()
    }
}

#[async_trait]
impl LockStore for PostgresLockStore {
    async fn try_acquire(&self, key: &str, owner: &str) -> Result<AcquireResult> {
        let token = uuid::Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {LOCKS_TABLE} (key, holder, token, expires_at)
             VALUES ($1, $2, $3, now() + make_interval(secs => $4))
             ON CONFLICT (key) DO UPDATE
             SET holder = EXCLUDED.holder,
                 token = EXCLUDED.token,
                 expires_at = EXCLUDED.expires_at
             WHERE {LOCKS_TABLE}.expires_at <= now()
                OR {LOCKS_TABLE}.holder = EXCLUDED.holder
             RETURNING token"
        );
        let taken: Option<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .bind(owner)
            .bind(&token)
            .bind(self.ttl_secs())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("acquire failed for '{key}': {e}")))?;

        match taken {
            Some(token) => {
                debug!(key = %key, owner = %owner, "🔒 Lock acquired");
                Ok(AcquireResult::Acquired {
                    token,
                    ttl: self.ttl,
                })
            }
            None => {
                let holder = self.current_holder(key).await?;
                Ok(AcquireResult::Held { holder })
            }
        }
    }

    async fn renew(&self, key: &str, token: &str) -> Result<RenewalResult> {
        let sql = format!(
            "UPDATE {LOCKS_TABLE}
             SET expires_at = now() + make_interval(secs => $3)
             WHERE key = $1 AND token = $2 AND expires_at > now()"
        );
        let updated = sqlx::query(&sql)
            .bind(key)
            .bind(token)
            .bind(self.ttl_secs())
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("renew failed for '{key}': {e}")))?
            .rows_affected();

        if updated == 1 {
            return Ok(RenewalResult::Renewed { ttl: self.ttl });
        }

        // Distinguish a stolen lease from an expired or missing one.
        let probe_sql = format!(
            "SELECT token, expires_at > now() AS live FROM {LOCKS_TABLE} WHERE key = $1"
        );
        let row = sqlx::query(&probe_sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("renew probe failed for '{key}': {e}")))?;

        match row {
            Some(row) => {
                let current_token: String = row.get("token");
                let live: bool = row.get("live");
                if live && current_token != token {
                    Ok(RenewalResult::InvalidToken)
                } else {
                    Ok(RenewalResult::Lost)
                }
            }
            None => Ok(RenewalResult::Lost),
        }
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {LOCKS_TABLE} WHERE key = $1 AND token = $2");
        let deleted = sqlx::query(&sql)
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("release failed for '{key}': {e}")))?
            .rows_affected();
        if deleted > 0 {
            debug!(key = %key, "🔓 Lock released");
        }
        Ok(deleted > 0)
    }

    async fn current_holder(&self, key: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT holder FROM {LOCKS_TABLE} WHERE key = $1 AND expires_at > now()"
        );
        sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::LockStore(format!("holder lookup failed for '{key}': {e}")))
    }
}

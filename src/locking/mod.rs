//! # Distributed Scan Lock
//!
//! At most one process may scan a source system at a time. The lock is a
//! time-bounded lease, not an indefinite hold: the holder must renew before
//! the TTL elapses or the lease expires and another process can take it.
//! A crashed holder therefore blocks scans only until its lease runs out.
//!
//! [`LockStore`] is the coordination seam: [`memory::InMemoryLockStore`]
//! for tests, [`postgres::PostgresLockStore`] for production. The
//! [`runner::LockRunner`] ties acquisition, background renewal and release
//! around a unit of guarded work.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bridgesync_core::events::EventPublisher;
//! use bridgesync_core::locking::{InMemoryLockStore, LockRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryLockStore::new(Duration::from_secs(30)));
//! let runner = LockRunner::new(store, Duration::from_secs(10), EventPublisher::default());
//!
//! let outcome = runner
//!     .run_exclusive("bridgesync:SAM:scan", &CancellationToken::new(), |_token| async {
//!         Ok(42)
//!     })
//!     .await
//!     .unwrap();
//!
//! // Some(..) because the lease was free; a second process would see None.
//! assert_eq!(outcome, Some(42));
//! # });
//! ```

pub mod memory;
pub mod postgres;
pub mod runner;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::InMemoryLockStore;
pub use postgres::PostgresLockStore;
pub use runner::LockRunner;

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireResult {
    /// Lease acquired; the token authorises renewal and release.
    Acquired { token: String, ttl: Duration },
    /// Another holder has a live lease.
    Held { holder: Option<String> },
}

impl AcquireResult {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Acquired { token, .. } => Some(token),
            Self::Held { .. } => None,
        }
    }
}

/// Result of a lease renewal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalResult {
    /// Lease extended for another TTL.
    Renewed { ttl: Duration },
    /// Lease expired or the key no longer exists.
    Lost,
    /// The token does not match the current lease.
    InvalidToken,
}

impl RenewalResult {
    pub fn is_renewed(&self) -> bool {
        matches!(self, Self::Renewed { .. })
    }
}

/// Lease-based lock coordination.
///
/// Implementations own the lease TTL; callers identify themselves with an
/// `owner` id on acquisition and authenticate follow-up operations with the
/// lease token.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Try to take the lease on `key` for `owner`.
    async fn try_acquire(&self, key: &str, owner: &str) -> Result<AcquireResult>;

    /// Extend the lease identified by `token` for another TTL.
    async fn renew(&self, key: &str, token: &str) -> Result<RenewalResult>;

    /// Release the lease. Returns `false` when the token no longer held it.
    async fn release(&self, key: &str, token: &str) -> Result<bool>;

    /// Owner currently holding a live lease on `key`, if any.
    async fn current_holder(&self, key: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_result_accessors() {
        let acquired = AcquireResult::Acquired {
            token: "t-1".to_string(),
            ttl: Duration::from_secs(60),
        };
        assert!(acquired.is_acquired());
        assert_eq!(acquired.token(), Some("t-1"));

        let held = AcquireResult::Held {
            holder: Some("other".to_string()),
        };
        assert!(!held.is_acquired());
        assert_eq!(held.token(), None);
    }

    #[test]
    fn test_renewal_result_is_renewed() {
        assert!(RenewalResult::Renewed {
            ttl: Duration::from_secs(60)
        }
        .is_renewed());
        assert!(!RenewalResult::Lost.is_renewed());
        assert!(!RenewalResult::InvalidToken.is_renewed());
    }
}

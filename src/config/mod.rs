//! # BridgeSync Configuration System
//!
//! Typed configuration for the messaging, scan, and locking subsystems.
//! Configuration comes from YAML files with an environment overlay (see
//! [`loader::ConfigManager`]); every struct carries serde defaults so a partial
//! file or no file at all still yields a runnable configuration, and
//! [`BridgeSyncConfig::validate`] rejects the combinations the runtime cannot
//! honor (most importantly a lock renewal interval that is not strictly
//! shorter than the lease TTL).

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::ScanKind;
use crate::error::{Result, SyncError};

pub use loader::ConfigManager;

/// Root configuration for the sync core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSyncConfig {
    /// Source system identifier stamped into system FIFO groups (e.g. `SAM`).
    pub source_system: String,
    /// Queue names and dispatch loop tuning.
    pub messaging: MessagingConfig,
    /// Per-kind scan pagination settings plus the schedule interval.
    pub scans: ScansConfig,
    /// Distributed lock lease settings.
    pub lock: LockConfig,
}

impl Default for BridgeSyncConfig {
    fn default() -> Self {
        Self {
            source_system: crate::constants::DEFAULT_SOURCE_SYSTEM.to_string(),
            messaging: MessagingConfig::default(),
            scans: ScansConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

impl BridgeSyncConfig {
    /// Reject configurations the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.source_system.trim().is_empty() {
            return Err(SyncError::Configuration(
                "source_system must not be blank".to_string(),
            ));
        }
        if self.messaging.batch_size <= 0 {
            return Err(SyncError::Configuration(format!(
                "messaging.batch_size must be positive, got {}",
                self.messaging.batch_size
            )));
        }
        if self.messaging.visibility_timeout_seconds == 0 {
            return Err(SyncError::Configuration(
                "messaging.visibility_timeout_seconds must be positive".to_string(),
            ));
        }
        for kind in ScanKind::all() {
            let scan = self.scans.for_kind(kind);
            if scan.page_size <= 0 {
                return Err(SyncError::Configuration(format!(
                    "scan {} page_size must be positive, got {}",
                    kind, scan.page_size
                )));
            }
            if scan.batch_limit < 0 {
                return Err(SyncError::Configuration(format!(
                    "scan {} batch_limit must not be negative, got {}",
                    kind, scan.batch_limit
                )));
            }
        }
        if self.lock.renew_interval_seconds >= self.lock.ttl_seconds {
            return Err(SyncError::Configuration(format!(
                "lock.renew_interval_seconds ({}) must be strictly shorter than lock.ttl_seconds ({})",
                self.lock.renew_interval_seconds, self.lock.ttl_seconds
            )));
        }
        Ok(())
    }
}

/// Queue names and dispatcher tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Queue the dispatcher polls for inbound change messages.
    pub inbound_queue: String,
    /// Queue scan runs publish per-entity update messages to.
    pub outbound_queue: String,
    /// Dead-letter destination; `None` disables explicit DLQ moves.
    pub dead_letter_queue: Option<String>,
    /// Maximum messages fetched per poll.
    pub batch_size: i32,
    /// Visibility timeout applied to received messages.
    pub visibility_timeout_seconds: u32,
    /// Long-poll wait when the queue is empty.
    pub poll_wait_ms: u64,
    /// Backoff applied after a receive failure before the loop resumes.
    pub error_backoff_ms: u64,
    /// Extra visibility granted to a message before attempting a DLQ move.
    pub dlq_visibility_margin_seconds: u32,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            inbound_queue: "bridge_sync_inbound".to_string(),
            outbound_queue: "bridge_sync_updates".to_string(),
            dead_letter_queue: None,
            batch_size: 10,
            visibility_timeout_seconds: 30,
            poll_wait_ms: 1_000,
            error_backoff_ms: 1_000,
            dlq_visibility_margin_seconds: 60,
        }
    }
}

impl MessagingConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.visibility_timeout_seconds))
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn dlq_visibility_margin(&self) -> Duration {
        Duration::from_secs(u64::from(self.dlq_visibility_margin_seconds))
    }
}

/// Scan settings per kind plus the scheduler interval.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScansConfig {
    pub holdings: ScanKindConfig,
    pub parties: ScanKindConfig,
    /// How often the scheduled runner attempts a scan run.
    pub schedule_interval_seconds: u64,
}

impl Default for ScansConfig {
    fn default() -> Self {
        Self {
            holdings: ScanKindConfig::default(),
            parties: ScanKindConfig::default(),
            schedule_interval_seconds: 3_600,
        }
    }
}

impl ScansConfig {
    pub fn for_kind(&self, kind: ScanKind) -> &ScanKindConfig {
        match kind {
            ScanKind::BulkScan => &self.holdings,
            ScanKind::PartyScan => &self.parties,
        }
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_seconds)
    }
}

/// Pagination tuning for one scan kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanKindConfig {
    /// Whether the scheduled runner includes this kind at all.
    pub enabled: bool,
    /// Page size requested from the bridge (`top`).
    pub page_size: i64,
    /// Stop once `current_skip` reaches this many rows; 0 means unlimited.
    pub batch_limit: i64,
    /// Delay between pages; 0 disables the inter-page wait.
    pub page_delay_ms: u64,
}

impl Default for ScanKindConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_size: 100,
            batch_limit: 0,
            page_delay_ms: 0,
        }
    }
}

impl ScanKindConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Distributed lock lease settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// Prefix for lock keys, combined with the source system and scan kind.
    pub key_prefix: String,
    /// Lease TTL granted on acquire and on every successful renewal.
    pub ttl_seconds: u64,
    /// Interval between renewal attempts; must be strictly shorter than the TTL.
    pub renew_interval_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: "bridgesync".to_string(),
            ttl_seconds: 60,
            renew_interval_seconds: 20,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(self.renew_interval_seconds)
    }

    /// Lock key guarding the scheduled scan task, e.g. `bridgesync:SAM:scan`.
    pub fn scan_lock_key(&self, source_system: &str) -> String {
        format!("{}:{}:scan", self.key_prefix, source_system)
    }
}

//! # Set Reconciliation
//!
//! Makes a stored record set equal to a freshly imported one without losing
//! record identity. Incoming records are matched to existing ones by natural
//! key; matches keep the stored surrogate id, misses become inserts, and
//! stored records no longer present upstream are deleted as orphans.
//!
//! Planning is pure ([`ReconcilePlan::build`]), application talks to the
//! repository, and both skip entirely when they have nothing to do, so a
//! no-change import performs zero writes.

pub mod memory;
pub mod repository;

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub use memory::{InMemoryRepository, Operation};
pub use repository::{Clause, Filter, Repository};

use crate::error::Result;

/// A record type whose sets can be reconciled.
pub trait Reconcilable: Clone + Serialize + Send + Sync {
    /// Natural key matching incoming records to stored ones.
    type Key: Eq + std::hash::Hash + Clone + Send + Sync + std::fmt::Debug;

    fn reconcile_key(&self) -> Self::Key;

    /// Surrogate id, stable across re-imports.
    fn record_id(&self) -> Uuid;

    /// Take over the stored record's identity before upserting.
    fn adopt_identity(&mut self, existing: &Self);

    /// Filter that finds this record by natural key in the store.
    fn key_filter(&self) -> Filter;
}

/// The writes a reconciliation run will perform.
#[derive(Debug, Clone)]
pub struct ReconcilePlan<T: Reconcilable> {
    /// Records to write, each paired with its natural-key filter.
    pub upserts: Vec<(Filter, T)>,
    /// Stored record ids with no incoming counterpart.
    pub orphan_ids: Vec<Uuid>,
    /// Incoming records that matched a stored one.
    pub matched: usize,
    /// Incoming records with no stored counterpart.
    pub inserted: usize,
}

impl<T: Reconcilable> ReconcilePlan<T> {
    /// Plan the writes that make the stored set equal the incoming set.
    ///
    /// Duplicate natural keys in `incoming` collapse to the last occurrence,
    /// on the grounds that a later page carries the fresher record.
    pub fn build(incoming: Vec<T>, existing: &[T]) -> Self {
        let existing_by_key: HashMap<T::Key, &T> = existing
            .iter()
            .map(|record| (record.reconcile_key(), record))
            .collect();

        let mut order: Vec<T::Key> = Vec::new();
        let mut latest: HashMap<T::Key, T> = HashMap::new();
        for record in incoming {
            let key = record.reconcile_key();
            if latest.insert(key.clone(), record).is_none() {
                order.push(key);
            }
        }

        let incoming_keys: HashSet<&T::Key> = latest.keys().collect();
        let orphan_ids: Vec<Uuid> = existing
            .iter()
            .filter(|record| !incoming_keys.contains(&record.reconcile_key()))
            .map(|record| record.record_id())
            .collect();

        let mut upserts = Vec::with_capacity(order.len());
        let mut matched = 0;
        let mut inserted = 0;
        for key in order {
            let Some(mut record) = latest.remove(&key) else {
                continue;
            };
            match existing_by_key.get(&key) {
                Some(stored) => {
                    record.adopt_identity(stored);
                    matched += 1;
                }
                None => inserted += 1,
            }
            upserts.push((record.key_filter(), record));
        }

        Self {
            upserts,
            orphan_ids,
            matched,
            inserted,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.orphan_ids.is_empty()
    }
}

/// Counters from an applied reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub upserted: u64,
    pub deleted: u64,
    pub matched: usize,
    pub inserted: usize,
}

/// Reconcile `incoming` against the records matching `scope` in the store.
///
/// `scope` bounds the existing set, so orphan deletion only ever touches
/// records inside it (one source and parent entity, in practice). `entity`
/// names the record collection for logging.
pub async fn reconcile<T>(
    repository: &dyn Repository<T>,
    scope: &Filter,
    incoming: Vec<T>,
    entity: &str,
) -> Result<ReconcileOutcome>
where
    T: Reconcilable + DeserializeOwned + 'static,
{
    let existing = repository.find(scope).await?;
    let plan = ReconcilePlan::build(incoming, &existing);

    if plan.is_empty() {
        debug!(entity = entity, "Nothing to reconcile");
        return Ok(ReconcileOutcome::default());
    }

    let mut outcome = ReconcileOutcome {
        matched: plan.matched,
        inserted: plan.inserted,
        ..ReconcileOutcome::default()
    };

    if !plan.upserts.is_empty() {
        outcome.upserted = repository.bulk_upsert(&plan.upserts).await?;
    }
    if !plan.orphan_ids.is_empty() {
        outcome.deleted = repository
            .delete_many(&Filter::ids_in(&plan.orphan_ids))
            .await?;
    }

    info!(
        entity = entity,
        upserted = outcome.upserted,
        deleted = outcome.deleted,
        matched = outcome.matched,
        inserted = outcome.inserted,
        "🔄 Reconciliation applied"
    );
    Ok(outcome)
}

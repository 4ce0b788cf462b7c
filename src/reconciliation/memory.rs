//! In-memory [`Repository`] implementation.
//!
//! Backs tests and local runs. Records live in a `Vec` and filters evaluate
//! against their JSON form, mirroring how the production store treats
//! records as documents. Every mutating call is appended to an operation log
//! so tests can assert that no-change reconciliations perform no writes.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::reconciliation::repository::{to_document, Filter, Repository};

/// One mutating repository call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddMany(usize),
    BulkUpsert(usize),
    DeleteMany(u64),
}

pub struct InMemoryRepository<T> {
    records: Mutex<Vec<T>>,
    operations: Mutex<Vec<Operation>>,
}

impl<T: Clone> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            operations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all stored records.
    pub fn records(&self) -> Vec<T> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Mutating calls made so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.operations.lock().len()
    }

    fn log(&self, op: Operation) {
        self.operations.lock().push(op);
    }
}

impl<T: Clone> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn find(&self, filter: &Filter) -> Result<Vec<T>> {
        let records = self.records.lock();
        let mut found = Vec::new();
        for record in records.iter() {
            if filter.matches(&to_document(record)?) {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        let records = self.records.lock();
        for record in records.iter() {
            if filter.matches(&to_document(record)?) {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn add_many(&self, records: &[T]) -> Result<u64> {
        self.log(Operation::AddMany(records.len()));
        self.records.lock().extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn bulk_upsert(&self, entries: &[(Filter, T)]) -> Result<u64> {
        self.log(Operation::BulkUpsert(entries.len()));
        let mut records = self.records.lock();
        for (filter, incoming) in entries {
            let mut replaced = false;
            for stored in records.iter_mut() {
                if filter.matches(&to_document(stored)?) {
                    *stored = incoming.clone();
                    replaced = true;
                    break;
                }
            }
            if !replaced {
                records.push(incoming.clone());
            }
        }
        Ok(entries.len() as u64)
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        let mut records = self.records.lock();
        let mut kept = Vec::with_capacity(records.len());
        let mut deleted = 0u64;
        for record in records.drain(..) {
            if filter.matches(&to_document(&record)?) {
                deleted += 1;
            } else {
                kept.push(record);
            }
        }
        *records = kept;
        drop(records);
        self.log(Operation::DeleteMany(deleted));
        Ok(deleted)
    }
}

//! Record store abstraction used by reconciliation.
//!
//! [`Repository`] is a document-shaped CRUD seam: records serialize to JSON
//! and filters are conjunctions of field predicates over that JSON. The
//! production store implements this over its database; tests use the
//! in-memory implementation, which also logs mutation calls so the no-op
//! invariants are checkable.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// One predicate over a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Conjunction of field predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.to_string(), value.into()));
        self
    }

    pub fn is_in(mut self, field: &str, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In(field.to_string(), values));
        self
    }

    /// Filter matching records whose `id` is one of `ids`.
    pub fn ids_in(ids: &[Uuid]) -> Self {
        Self::new().is_in(
            "id",
            ids.iter().map(|id| Value::String(id.to_string())).collect(),
        )
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate this filter against a record's JSON representation.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, value) => doc.get(field) == Some(value),
            Clause::In(field, values) => doc
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        })
    }
}

/// Serialize a record for filter evaluation.
pub(crate) fn to_document<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record)
        .map_err(|e| SyncError::Repository(format!("cannot serialize record: {e}")))
}

/// CRUD operations over one record collection.
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn find(&self, filter: &Filter) -> Result<Vec<T>>;

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>>;

    async fn add_many(&self, records: &[T]) -> Result<u64>;

    /// Upsert each record against its paired filter: replace the first match
    /// or insert when nothing matches. Returns the number of records written.
    async fn bulk_upsert(&self, entries: &[(Filter, T)]) -> Result<u64>;

    /// Delete everything matching the filter, returning the count removed.
    async fn delete_many(&self, filter: &Filter) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.matches(&json!({"a": 1})));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_eq_clauses_are_conjunctive() {
        let filter = Filter::new().eq("source", "SAM").eq("cph", "12/345/6789");
        assert!(filter.matches(&json!({"source": "SAM", "cph": "12/345/6789", "x": 9})));
        assert!(!filter.matches(&json!({"source": "CTS", "cph": "12/345/6789"})));
        assert!(!filter.matches(&json!({"source": "SAM"})));
    }

    #[test]
    fn test_ids_in_matches_uuid_strings() {
        let keep = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = Filter::ids_in(&[keep]);
        assert!(filter.matches(&json!({"id": keep.to_string()})));
        assert!(!filter.matches(&json!({"id": other.to_string()})));
    }
}

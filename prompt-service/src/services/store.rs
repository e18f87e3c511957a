//! Record persistence abstraction.
//!
//! The store owns the lifecycle of every [`Record`]: it assigns identities,
//! stamps timestamps and is the only place fields are written. Callers ask for
//! a record to be created or completed and get the stored row back.

use crate::models::{ListRecords, Record};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors returned by a [`RecordStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists with the requested id.
    #[error("record not found: {id}")]
    NotFound { id: i64 },

    /// Connection loss, constraint violation, or any other backend fault.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Append/update store for records of a single variant.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record with `output_text` unset and return it with its id.
    async fn create(&self, input_text: &str) -> Result<Record, StoreError>;

    /// Set `output_text` on an existing record and refresh `updated_at`.
    async fn update_output(&self, id: i64, output_text: &str) -> Result<Record, StoreError>;

    /// Fetch a record by id.
    async fn get(&self, id: i64) -> Result<Option<Record>, StoreError>;

    /// List records newest first.
    async fn list(&self, page: ListRecords) -> Result<Vec<Record>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
struct InMemoryState {
    last_id: i64,
    records: BTreeMap<i64, Record>,
}

/// Process-local store. Ids start at 1 and increase by one per `create`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("In-memory store mutex poisoned: {}", e)))
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, input_text: &str) -> Result<Record, StoreError> {
        let mut state = self.lock()?;
        state.last_id += 1;

        let record = Record {
            id: state.last_id,
            input_text: input_text.to_string(),
            output_text: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.records.insert(record.id, record.clone());

        Ok(record)
    }

    async fn update_output(&self, id: i64, output_text: &str) -> Result<Record, StoreError> {
        let mut state = self.lock()?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;

        record.output_text = Some(output_text.to_string());
        record.updated_at = Some(Utc::now());

        Ok(record.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<Record>, StoreError> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    async fn list(&self, page: ListRecords) -> Result<Vec<Record>, StoreError> {
        let state = self.lock()?;
        let upper = page.before_id.unwrap_or(i64::MAX);

        Ok(state
            .records
            .range(..upper)
            .rev()
            .take(page.limit as usize)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = InMemoryRecordStore::new();

        let mut last = 0;
        for i in 0..5 {
            let record = store.create(&format!("prompt {}", i)).await.unwrap();
            assert!(record.id > last);
            assert!(record.output_text.is_none());
            assert!(record.updated_at.is_none());
            last = record.id;
        }
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn update_output_sets_text_and_timestamp() {
        let store = InMemoryRecordStore::new();
        let created = store.create("What is 2+2?").await.unwrap();

        let updated = store.update_output(created.id, "4").await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.input_text, "What is 2+2?");
        assert_eq!(updated.output_text.as_deref(), Some("4"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at.is_some());
        assert_eq!(store.get(created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn update_output_unknown_id_is_not_found() {
        let store = InMemoryRecordStore::new();

        let err = store.update_output(42, "4").await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound { id: 42 }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_pages_by_id() {
        let store = InMemoryRecordStore::new();
        for i in 1..=5 {
            store.create(&format!("prompt {}", i)).await.unwrap();
        }

        let first = store.list(ListRecords::new(Some(2), None)).await.unwrap();
        let ids: Vec<i64> = first.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let next = store
            .list(ListRecords::new(Some(10), Some(4)))
            .await
            .unwrap();
        let ids: Vec<i64> = next.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}

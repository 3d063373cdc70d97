//! Unit of work over a backing store.

use super::record::{BackingRecord, RecordField, RecordKind};
use super::BackingStore;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to one record within a unit of work.
pub type RecordHandle = Arc<Mutex<BackingRecord>>;

/// Records touched during one request.
///
/// Each key resolves to at most one record per unit. Resolution never
/// writes; only `set` does, and it commits immediately.
pub struct UnitOfWork {
    store: Arc<dyn BackingStore>,
    records: Mutex<HashMap<(RecordKind, String), RecordHandle>>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self {
            store,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// The record for `id`, read from the store or created in memory.
    pub fn load_or_create(&self, kind: RecordKind, id: &str) -> Result<RecordHandle> {
        let slot = (kind, id.to_string());
        if let Some(handle) = self.records.lock().get(&slot) {
            return Ok(handle.clone());
        }

        let record = match self.store.find(kind, id)? {
            Some(record) => record,
            None => {
                debug!("No {} record for {}, creating one", kind, id);
                BackingRecord::new(kind, id)
            }
        };

        let mut records = self.records.lock();
        let handle = records
            .entry(slot)
            .or_insert_with(|| Arc::new(Mutex::new(record)));
        Ok(handle.clone())
    }

    pub fn get(&self, handle: &RecordHandle, field: RecordField) -> Result<Value> {
        handle.lock().get(field)
    }

    /// Update a field and commit the record.
    pub fn set(&self, handle: &RecordHandle, field: RecordField, value: &Value) -> Result<()> {
        let mut record = handle.lock();
        let previous = record.clone();
        record.set(field, value)?;
        if let Err(e) = self.store.save(&mut record) {
            *record = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Records resolved but never written.
    pub fn pending(&self) -> Vec<(RecordKind, String)> {
        let records = self.records.lock();
        let mut pending: Vec<_> = records
            .iter()
            .filter(|(_, handle)| !handle.lock().persisted)
            .map(|((kind, id), _)| (*kind, id.clone()))
            .collect();
        pending.sort_by(|a, b| a.1.cmp(&b.1));
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use serde_json::json;

    fn unit() -> (UnitOfWork, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (UnitOfWork::new(store.clone()), store)
    }

    #[test]
    fn test_load_or_create_does_not_flush() {
        let (unit, store) = unit();
        let handle = unit.load_or_create(RecordKind::Channel, "c1").unwrap();

        assert!(!handle.lock().persisted);
        assert!(store.find(RecordKind::Channel, "c1").unwrap().is_none());
        assert_eq!(unit.pending(), vec![(RecordKind::Channel, "c1".to_string())]);
    }

    #[test]
    fn test_same_key_same_record() {
        let (unit, _store) = unit();
        let a = unit.load_or_create(RecordKind::Video, "v1").unwrap();
        let b = unit.load_or_create(RecordKind::Video, "v1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = unit.load_or_create(RecordKind::Channel, "v1").unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn test_set_commits() {
        let (unit, store) = unit();
        let handle = unit.load_or_create(RecordKind::Channel, "c1").unwrap();
        unit.set(&handle, RecordField::IsAllowed, &json!(true)).unwrap();

        assert_eq!(unit.get(&handle, RecordField::IsAllowed).unwrap(), json!(true));
        assert!(store.find(RecordKind::Channel, "c1").unwrap().unwrap().is_allowed);
        assert!(unit.pending().is_empty());
    }

    #[test]
    fn test_rejected_write_leaves_record_untouched() {
        let (unit, store) = unit();
        let handle = unit.load_or_create(RecordKind::Video, "v1").unwrap();
        assert!(unit.set(&handle, RecordField::Duration, &json!("long")).is_err());
        assert!(store.find(RecordKind::Video, "v1").unwrap().is_none());
    }
}

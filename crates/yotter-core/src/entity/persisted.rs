//! Bridge from an entity to its backing record.

use crate::error::{Result, YotterError};
use crate::store::{RecordField, RecordHandle, RecordKind, UnitOfWork};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Lazily resolved link to the backing record of one entity.
///
/// The record is loaded (or created in memory) on the first persisted read
/// or write, through the unit of work the entity was built in.
pub struct BackingLink {
    kind: RecordKind,
    key: String,
    unit: Option<Arc<UnitOfWork>>,
    record: OnceLock<RecordHandle>,
}

impl BackingLink {
    pub fn new(kind: RecordKind, key: impl Into<String>, unit: Option<Arc<UnitOfWork>>) -> Self {
        Self {
            kind,
            key: key.into(),
            unit,
            record: OnceLock::new(),
        }
    }

    /// Not bound to any store; persisted access fails.
    pub fn detached(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::new(kind, key, None)
    }

    pub fn is_attached(&self) -> bool {
        self.unit.is_some()
    }

    fn unit(&self) -> Result<&Arc<UnitOfWork>> {
        self.unit.as_ref().ok_or_else(|| YotterError::NoBackingStore {
            kind: self.kind.to_string(),
            key: self.key.clone(),
        })
    }

    pub fn record(&self) -> Result<&RecordHandle> {
        if let Some(handle) = self.record.get() {
            return Ok(handle);
        }
        let handle = self.unit()?.load_or_create(self.kind, &self.key)?;
        Ok(self.record.get_or_init(|| handle))
    }

    pub fn get(&self, field: RecordField) -> Result<Value> {
        let handle = self.record()?;
        self.unit()?.get(handle, field)
    }

    /// Write-through: the record is committed before this returns.
    pub fn set(&self, field: RecordField, value: Value) -> Result<()> {
        let handle = self.record()?;
        self.unit()?.set(handle, field, &value)
    }

    pub fn flag(&self, field: RecordField) -> Result<bool> {
        Ok(self.get(field)?.as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BackingStore, SqliteStore};
    use serde_json::json;

    #[test]
    fn test_detached_link() {
        let link = BackingLink::detached(RecordKind::Channel, "c1");
        assert!(!link.is_attached());
        assert!(matches!(
            link.get(RecordField::IsAllowed),
            Err(YotterError::NoBackingStore { .. })
        ));
    }

    #[test]
    fn test_resolves_once_and_writes_through() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let unit = Arc::new(UnitOfWork::new(store.clone()));
        let link = BackingLink::new(RecordKind::Channel, "c1", Some(unit.clone()));

        assert!(!link.flag(RecordField::IsBlocked).unwrap());
        assert!(store.find(RecordKind::Channel, "c1").unwrap().is_none());

        link.set(RecordField::IsBlocked, json!(true)).unwrap();
        assert!(store.find(RecordKind::Channel, "c1").unwrap().unwrap().is_blocked);

        let again = unit.load_or_create(RecordKind::Channel, "c1").unwrap();
        assert!(Arc::ptr_eq(link.record().unwrap(), &again));
    }
}

//! Allow/block lists for restricted mode.

use super::record::{RecordField, RecordKind};
use super::unit::UnitOfWork;
use super::BackingStore;
use crate::error::{Result, YotterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Which list an entry goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationList {
    Allowed,
    Blocked,
}

impl ModerationList {
    pub fn field(&self) -> RecordField {
        match self {
            ModerationList::Allowed => RecordField::IsAllowed,
            ModerationList::Blocked => RecordField::IsBlocked,
        }
    }

    pub fn opposite(&self) -> ModerationList {
        match self {
            ModerationList::Allowed => ModerationList::Blocked,
            ModerationList::Blocked => ModerationList::Allowed,
        }
    }
}

/// Outcome of one moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    Changed,
    Unchanged,
}

/// Add or remove an entry. Adding a channel to one list removes it from the
/// other.
pub fn moderate(
    unit: &UnitOfWork,
    kind: RecordKind,
    id: &str,
    list: ModerationList,
    add: bool,
) -> Result<ModerationOutcome> {
    if kind == RecordKind::Video || !kind.has_field(list.field()) {
        return Err(YotterError::Validation {
            field: list.field().to_string(),
            message: format!("{} records cannot be {:?}", kind, list),
        });
    }

    let handle = unit.load_or_create(kind, id)?;
    let current = unit.get(&handle, list.field())?.as_bool().unwrap_or(false);
    if current == add {
        return Ok(ModerationOutcome::Unchanged);
    }

    unit.set(&handle, list.field(), &Value::Bool(add))?;
    let opposite = list.opposite().field();
    if add && kind.has_field(opposite) {
        unit.set(&handle, opposite, &Value::Bool(false))?;
    }
    Ok(ModerationOutcome::Changed)
}

/// Portable export of the moderation lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationLists {
    pub description: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub blocked_channel_ids: Vec<String>,
    #[serde(default)]
    pub allowed_channel_ids: Vec<String>,
    #[serde(default)]
    pub allowed_playlist_ids: Vec<String>,
}

/// Counts reported by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub blocked_channels: usize,
    pub allowed_channels: usize,
    pub allowed_playlists: usize,
}

impl ModerationLists {
    pub const DESCRIPTION: &'static str = "Yotter restricted mode lists export";

    pub fn export(store: &dyn BackingStore, server_name: &str) -> Result<Self> {
        Ok(Self {
            description: Self::DESCRIPTION.to_string(),
            server_name: server_name.to_string(),
            blocked_channel_ids: store.list_flagged(RecordKind::Channel, RecordField::IsBlocked)?,
            allowed_channel_ids: store.list_flagged(RecordKind::Channel, RecordField::IsAllowed)?,
            allowed_playlist_ids: store
                .list_flagged(RecordKind::Playlist, RecordField::IsAllowed)?,
        })
    }

    /// Flag every listed id. Existing flags are never cleared.
    pub fn import(&self, unit: &UnitOfWork) -> Result<ImportSummary> {
        let flag = |kind: RecordKind, field: RecordField, ids: &[String]| -> Result<usize> {
            for id in ids {
                let handle = unit.load_or_create(kind, id)?;
                unit.set(&handle, field, &Value::Bool(true))?;
            }
            Ok(ids.len())
        };

        let summary = ImportSummary {
            blocked_channels: flag(
                RecordKind::Channel,
                RecordField::IsBlocked,
                &self.blocked_channel_ids,
            )?,
            allowed_channels: flag(
                RecordKind::Channel,
                RecordField::IsAllowed,
                &self.allowed_channel_ids,
            )?,
            allowed_playlists: flag(
                RecordKind::Playlist,
                RecordField::IsAllowed,
                &self.allowed_playlist_ids,
            )?,
        };
        info!(
            "Imported {} blocked channels, {} allowed channels, {} allowed playlists",
            summary.blocked_channels, summary.allowed_channels, summary.allowed_playlists
        );
        Ok(summary)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| YotterError::io_with_path(e, path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| YotterError::io_with_path(e, path))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn unit() -> (UnitOfWork, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (UnitOfWork::new(store.clone()), store)
    }

    #[test]
    fn test_allowing_unblocks() {
        let (unit, store) = unit();
        moderate(&unit, RecordKind::Channel, "c1", ModerationList::Blocked, true).unwrap();
        let outcome =
            moderate(&unit, RecordKind::Channel, "c1", ModerationList::Allowed, true).unwrap();
        assert_eq!(outcome, ModerationOutcome::Changed);

        let record = store.find(RecordKind::Channel, "c1").unwrap().unwrap();
        assert!(record.is_allowed);
        assert!(!record.is_blocked);
    }

    #[test]
    fn test_repeat_is_unchanged() {
        let (unit, _store) = unit();
        moderate(&unit, RecordKind::Playlist, "p1", ModerationList::Allowed, true).unwrap();
        let outcome =
            moderate(&unit, RecordKind::Playlist, "p1", ModerationList::Allowed, true).unwrap();
        assert_eq!(outcome, ModerationOutcome::Unchanged);

        assert!(moderate(&unit, RecordKind::Playlist, "p1", ModerationList::Blocked, true).is_err());
        assert!(moderate(&unit, RecordKind::Video, "v1", ModerationList::Allowed, true).is_err());
    }

    #[test]
    fn test_export_import_roundtrip_through_file() {
        let (unit, store) = unit();
        moderate(&unit, RecordKind::Channel, "c1", ModerationList::Blocked, true).unwrap();
        moderate(&unit, RecordKind::Channel, "c2", ModerationList::Allowed, true).unwrap();
        moderate(&unit, RecordKind::Playlist, "p1", ModerationList::Allowed, true).unwrap();

        let lists = ModerationLists::export(store.as_ref(), "yotter.example").unwrap();
        assert_eq!(lists.blocked_channel_ids, vec!["c1"]);
        assert_eq!(lists.allowed_channel_ids, vec!["c2"]);
        assert_eq!(lists.allowed_playlist_ids, vec!["p1"]);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lists.json");
        lists.save(&path).unwrap();

        let (other_unit, other_store) = self::unit();
        let summary = ModerationLists::load(&path).unwrap().import(&other_unit).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                blocked_channels: 1,
                allowed_channels: 1,
                allowed_playlists: 1
            }
        );
        assert_eq!(
            ModerationLists::export(other_store.as_ref(), "yotter.example").unwrap(),
            lists
        );
    }
}

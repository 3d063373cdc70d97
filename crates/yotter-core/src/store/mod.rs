//! Persisted backing records for attributes that must survive restarts and
//! be changed by users (moderation flags, video durations).

mod moderation;
mod record;
mod sqlite;
mod unit;

pub use moderation::{moderate, ImportSummary, ModerationList, ModerationLists, ModerationOutcome};
pub use record::{BackingRecord, RecordField, RecordKind, UNKNOWN_DURATION};
pub use sqlite::SqliteStore;
pub use unit::{RecordHandle, UnitOfWork};

use crate::error::Result;

/// Relational storage for backing records.
pub trait BackingStore: Send + Sync {
    /// Look a record up by natural key.
    fn find(&self, kind: RecordKind, id: &str) -> Result<Option<BackingRecord>>;

    /// Insert or update a record and commit.
    fn save(&self, record: &mut BackingRecord) -> Result<()>;

    /// Ids of records whose boolean `field` is set.
    fn list_flagged(&self, kind: RecordKind, field: RecordField) -> Result<Vec<String>>;
}

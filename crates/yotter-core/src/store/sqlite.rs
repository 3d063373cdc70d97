//! SQLite backing store.

use super::record::{BackingRecord, RecordField, RecordKind};
use super::BackingStore;
use crate::error::{Result, YotterError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Backing records in one SQLite file, one table per kind.
pub struct SqliteStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open a store at the given path.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| YotterError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A store that lives as long as the process.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS yt_channel (
                rowid INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                created_on TEXT NOT NULL,
                is_allowed INTEGER NOT NULL DEFAULT 0,
                is_blocked INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_channel_allowed ON yt_channel(is_allowed);
            CREATE INDEX IF NOT EXISTS idx_channel_blocked ON yt_channel(is_blocked);

            CREATE TABLE IF NOT EXISTS yt_playlist (
                rowid INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                created_on TEXT NOT NULL,
                is_allowed INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_playlist_allowed ON yt_playlist(is_allowed);

            CREATE TABLE IF NOT EXISTS yt_video (
                rowid INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                created_on TEXT NOT NULL,
                duration INTEGER NOT NULL DEFAULT 99999
            );
            ",
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| YotterError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

impl BackingStore for SqliteStore {
    fn find(&self, kind: RecordKind, id: &str) -> Result<Option<BackingRecord>> {
        let conn = self.lock()?;

        let record = match kind {
            RecordKind::Channel => conn
                .query_row(
                    "SELECT created_on, is_allowed, is_blocked FROM yt_channel WHERE id = ?1",
                    params![id],
                    |row| {
                        let created_on: String = row.get(0)?;
                        let mut record = BackingRecord::new(kind, id);
                        record.created_on = Self::parse_time(&created_on);
                        record.is_allowed = row.get(1)?;
                        record.is_blocked = row.get(2)?;
                        Ok(record)
                    },
                )
                .optional()?,
            RecordKind::Playlist => conn
                .query_row(
                    "SELECT created_on, is_allowed FROM yt_playlist WHERE id = ?1",
                    params![id],
                    |row| {
                        let created_on: String = row.get(0)?;
                        let mut record = BackingRecord::new(kind, id);
                        record.created_on = Self::parse_time(&created_on);
                        record.is_allowed = row.get(1)?;
                        Ok(record)
                    },
                )
                .optional()?,
            RecordKind::Video => conn
                .query_row(
                    "SELECT created_on, duration FROM yt_video WHERE id = ?1",
                    params![id],
                    |row| {
                        let created_on: String = row.get(0)?;
                        let mut record = BackingRecord::new(kind, id);
                        record.created_on = Self::parse_time(&created_on);
                        record.duration = row.get(1)?;
                        Ok(record)
                    },
                )
                .optional()?,
        };

        Ok(record.map(|mut record| {
            record.persisted = true;
            record
        }))
    }

    fn save(&self, record: &mut BackingRecord) -> Result<()> {
        let conn = self.lock()?;
        let created_on = record.created_on.to_rfc3339();

        match record.kind {
            RecordKind::Channel => conn.execute(
                "INSERT INTO yt_channel (id, created_on, is_allowed, is_blocked)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     is_allowed=excluded.is_allowed,
                     is_blocked=excluded.is_blocked",
                params![record.id, created_on, record.is_allowed, record.is_blocked],
            )?,
            RecordKind::Playlist => conn.execute(
                "INSERT INTO yt_playlist (id, created_on, is_allowed)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET is_allowed=excluded.is_allowed",
                params![record.id, created_on, record.is_allowed],
            )?,
            RecordKind::Video => conn.execute(
                "INSERT INTO yt_video (id, created_on, duration)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET duration=excluded.duration",
                params![record.id, created_on, record.duration],
            )?,
        };

        record.persisted = true;
        debug!("Saved {} record {}", record.kind, record.id);
        Ok(())
    }

    fn list_flagged(&self, kind: RecordKind, field: RecordField) -> Result<Vec<String>> {
        if field == RecordField::Duration || !kind.has_field(field) {
            return Err(YotterError::Validation {
                field: field.to_string(),
                message: format!("not a flag of {} records", kind),
            });
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT id FROM {} WHERE {} = 1 ORDER BY rowid",
            kind.table(),
            field.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

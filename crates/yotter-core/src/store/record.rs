//! Persisted per-entity rows.

use crate::error::{Result, YotterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Channel,
    Playlist,
    Video,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Channel => "yt_channel",
            RecordKind::Playlist => "yt_playlist",
            RecordKind::Video => "yt_video",
        }
    }

    /// Fields stored for this kind.
    pub fn fields(&self) -> &'static [RecordField] {
        match self {
            RecordKind::Channel => &[RecordField::IsAllowed, RecordField::IsBlocked],
            RecordKind::Playlist => &[RecordField::IsAllowed],
            RecordKind::Video => &[RecordField::Duration],
        }
    }

    pub fn has_field(&self, field: RecordField) -> bool {
        self.fields().contains(&field)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Channel => write!(f, "channel"),
            RecordKind::Playlist => write!(f, "playlist"),
            RecordKind::Video => write!(f, "video"),
        }
    }
}

/// A mutable, persisted attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    /// Channel or playlist visible in restricted mode.
    IsAllowed,
    /// Channel hidden from everyone but admins.
    IsBlocked,
    /// Video length in seconds as last reported by a player.
    Duration,
}

impl RecordField {
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::IsAllowed => "is_allowed",
            RecordField::IsBlocked => "is_blocked",
            RecordField::Duration => "duration",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Default video duration until a real one is known.
pub const UNKNOWN_DURATION: i64 = 99_999;

/// Backing record for one channel, playlist or video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackingRecord {
    pub kind: RecordKind,
    pub id: String,
    pub created_on: DateTime<Utc>,
    /// Whether a row exists in the store.
    pub persisted: bool,
    pub is_allowed: bool,
    pub is_blocked: bool,
    pub duration: i64,
}

impl BackingRecord {
    /// A fresh, not yet persisted record.
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            created_on: Utc::now(),
            persisted: false,
            is_allowed: false,
            is_blocked: false,
            duration: UNKNOWN_DURATION,
        }
    }

    fn check_field(&self, field: RecordField) -> Result<()> {
        if self.kind.has_field(field) {
            Ok(())
        } else {
            Err(YotterError::Validation {
                field: field.to_string(),
                message: format!("{} records have no such field", self.kind),
            })
        }
    }

    pub fn get(&self, field: RecordField) -> Result<Value> {
        self.check_field(field)?;
        Ok(match field {
            RecordField::IsAllowed => Value::Bool(self.is_allowed),
            RecordField::IsBlocked => Value::Bool(self.is_blocked),
            RecordField::Duration => Value::from(self.duration),
        })
    }

    pub fn set(&mut self, field: RecordField, value: &Value) -> Result<()> {
        self.check_field(field)?;
        let mismatch = |expected: &str| YotterError::Validation {
            field: field.to_string(),
            message: format!("expected {}, got {}", expected, value),
        };

        match field {
            RecordField::IsAllowed => {
                self.is_allowed = value.as_bool().ok_or_else(|| mismatch("a boolean"))?
            }
            RecordField::IsBlocked => {
                self.is_blocked = value.as_bool().ok_or_else(|| mismatch("a boolean"))?
            }
            RecordField::Duration => {
                let secs = value.as_i64().ok_or_else(|| mismatch("an integer"))?;
                if secs < 0 {
                    return Err(mismatch("a non-negative integer"));
                }
                self.duration = secs;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let record = BackingRecord::new(RecordKind::Video, "v1");
        assert!(!record.persisted);
        assert_eq!(record.get(RecordField::Duration).unwrap(), json!(99_999));
    }

    #[test]
    fn test_field_validation() {
        let mut record = BackingRecord::new(RecordKind::Playlist, "p1");
        record.set(RecordField::IsAllowed, &json!(true)).unwrap();
        assert!(record.is_allowed);

        assert!(record.set(RecordField::IsBlocked, &json!(true)).is_err());
        assert!(record.set(RecordField::IsAllowed, &json!("yes")).is_err());
        assert!(record.get(RecordField::Duration).is_err());
    }

    #[test]
    fn test_duration_must_be_non_negative() {
        let mut record = BackingRecord::new(RecordKind::Video, "v1");
        assert!(record.set(RecordField::Duration, &json!(-5)).is_err());
        record.set(RecordField::Duration, &json!(245)).unwrap();
        assert_eq!(record.duration, 245);
    }
}

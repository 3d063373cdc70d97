//! SQLite-based durable tier.

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheConfig, CacheStats};
use crate::error::{Result, YotterError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Expiry written for TTLs that do not fit a calendar date.
const FAR_FUTURE: &str = "9999-12-31T23:59:59+00:00";

/// SQLite-based durable cache tier.
///
/// One table holds every namespace; the namespace is the entity kind.
/// Thread-safe via internal mutex on the connection. Survives restarts.
pub struct SqliteCache {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// Cache configuration.
    config: CacheConfig,
}

impl SqliteCache {
    /// Create a new cache at the specified database path.
    ///
    /// Creates the database and tables if they don't exist.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(db_path, CacheConfig::default())
    }

    /// Create a new cache with custom configuration.
    pub fn with_config(db_path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| YotterError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| YotterError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // WAL lets request threads read while another one writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| YotterError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };

        cache.init_schema()?;

        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| YotterError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS group_cache (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                last_accessed TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );

            CREATE INDEX IF NOT EXISTS idx_group_cache_expires
                ON group_cache(expires_at);

            CREATE INDEX IF NOT EXISTS idx_group_cache_accessed
                ON group_cache(last_accessed);
            "#,
        )
        .map_err(|e| YotterError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store bytes with an explicit expiration time.
    pub fn set_with_expiry(&self, key: &CacheKey, value: &[u8], expires_at: &str) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT OR REPLACE INTO group_cache
            (namespace, key, value, cached_at, expires_at, size_bytes, last_accessed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?4)
            "#,
            params![
                key.namespace(),
                key.digest(),
                value,
                now,
                expires_at,
                value.len() as i64
            ],
        )
        .map_err(|e| YotterError::Database {
            message: format!("Failed to set cache entry: {}", e),
            source: Some(e),
        })?;

        // Release lock before checking eviction
        drop(conn);
        self.check_eviction()?;

        Ok(())
    }

    /// Remove expired entries. Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let deleted = conn
            .execute(
                "DELETE FROM group_cache WHERE expires_at <= ?1",
                params![now],
            )
            .map_err(|e| YotterError::Database {
                message: format!("Failed to cleanup expired entries: {}", e),
                source: Some(e),
            })?;

        if deleted > 0 {
            debug!("Cleaned up {} expired cache entries", deleted);
        }

        Ok(deleted)
    }

    /// Evict least recently accessed entries until under `max_bytes`.
    pub fn evict_to_size(&self, max_bytes: u64) -> Result<usize> {
        let conn = self.lock()?;

        let current_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM group_cache",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if (current_size as u64) <= max_bytes {
            return Ok(0);
        }

        let excess = current_size as u64 - max_bytes;

        let mut stmt = conn
            .prepare("SELECT namespace, key, size_bytes FROM group_cache ORDER BY last_accessed ASC")
            .map_err(|e| YotterError::Database {
                message: format!("Failed to prepare eviction query: {}", e),
                source: Some(e),
            })?;

        let entries: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| YotterError::Database {
                message: format!("Failed to query for eviction: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();

        drop(stmt);

        let mut evicted_bytes = 0u64;
        let mut evicted_count = 0;

        for (namespace, key, size) in entries {
            if evicted_bytes >= excess {
                break;
            }

            conn.execute(
                "DELETE FROM group_cache WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .ok();

            evicted_bytes += size as u64;
            evicted_count += 1;
        }

        debug!(
            "Evicted {} cache entries ({} bytes)",
            evicted_count, evicted_bytes
        );

        Ok(evicted_count)
    }

    fn check_eviction(&self) -> Result<()> {
        if !self.config.enable_eviction || self.config.max_size == 0 {
            return Ok(());
        }
        self.evict_to_size(self.config.max_size)?;
        Ok(())
    }

    /// Expiry timestamp for a TTL, clamped to a far-future date.
    fn expiry_for(ttl: Duration) -> String {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .map(|at: DateTime<Utc>| at.to_rfc3339())
            .unwrap_or_else(|| FAR_FUTURE.to_string())
    }
}

impl CacheBackend for SqliteCache {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let value: Option<Vec<u8>> = conn
            .query_row(
                r#"
                SELECT value FROM group_cache
                WHERE namespace = ?1 AND key = ?2 AND expires_at > ?3
                "#,
                params![key.namespace(), key.digest(), now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| YotterError::Database {
                message: format!("Failed to query cache entry: {}", e),
                source: Some(e),
            })?;

        if value.is_some() {
            // Only used to order evictions, a failed update is harmless
            let _ = conn.execute(
                "UPDATE group_cache SET last_accessed = ?1 WHERE namespace = ?2 AND key = ?3",
                params![now, key.namespace(), key.digest()],
            );
        }

        Ok(value)
    }

    fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        self.set_with_expiry(key, value, &Self::expiry_for(ttl))
    }

    fn delete(&self, key: &CacheKey) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM group_cache WHERE namespace = ?1 AND key = ?2",
                params![key.namespace(), key.digest()],
            )
            .map_err(|e| YotterError::Database {
                message: format!("Failed to delete cache entry: {}", e),
                source: Some(e),
            })?;

        Ok(deleted > 0)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM group_cache", [])
            .map_err(|e| YotterError::Database {
                message: format!("Failed to clear cache entries: {}", e),
                source: Some(e),
            })?;

        debug!("Cleared durable cache tier");

        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;

        let (total_entries, total_size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM group_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0));

        let mut stmt = conn
            .prepare("SELECT namespace, COUNT(*) FROM group_cache GROUP BY namespace ORDER BY namespace")
            .map_err(|e| YotterError::Database {
                message: format!("Failed to prepare namespace stats query: {}", e),
                source: Some(e),
            })?;

        let namespaces: Vec<(String, usize)> = stmt
            .query_map([], |row| {
                let namespace: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((namespace, count as usize))
            })
            .map_err(|e| YotterError::Database {
                message: format!("Failed to query namespace stats: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(CacheStats {
            total_entries: total_entries as usize,
            total_size_bytes: total_size as u64,
            namespaces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, SqliteCache) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache").join("groups.sqlite");
        let cache = SqliteCache::new(&db_path).unwrap();
        (temp_dir, cache)
    }

    fn key(kind: &str, id: &str) -> CacheKey {
        CacheKey::new(kind, "summary", id, &[])
    }

    #[test]
    fn test_set_and_get() {
        let (_temp, cache) = create_test_cache();

        cache
            .set(&key("video", "v1"), b"hello world", Duration::from_secs(3600))
            .unwrap();

        let value = cache.get(&key("video", "v1")).unwrap();
        assert_eq!(value.unwrap(), b"hello world");
    }

    #[test]
    fn test_expiration() {
        let (_temp, cache) = create_test_cache();

        let expired_at = (Utc::now() - chrono::Duration::seconds(1)).to_rfc3339();
        cache
            .set_with_expiry(&key("video", "old"), b"old data", &expired_at)
            .unwrap();

        assert!(cache.get(&key("video", "old")).unwrap().is_none());
    }

    #[test]
    fn test_override_ttl_is_clamped() {
        let (_temp, cache) = create_test_cache();

        cache
            .set(&key("video", "pinned"), b"forever", Duration::from_secs(u64::MAX))
            .unwrap();

        assert_eq!(cache.get(&key("video", "pinned")).unwrap().unwrap(), b"forever");
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("groups.sqlite");

        {
            let cache = SqliteCache::new(&db_path).unwrap();
            cache
                .set(&key("channel", "c1"), b"kept", Duration::from_secs(3600))
                .unwrap();
        }

        let reopened = SqliteCache::new(&db_path).unwrap();
        assert_eq!(reopened.get(&key("channel", "c1")).unwrap().unwrap(), b"kept");
    }

    #[test]
    fn test_delete() {
        let (_temp, cache) = create_test_cache();

        cache
            .set(&key("video", "v1"), b"data1", Duration::from_secs(3600))
            .unwrap();
        cache
            .set(&key("video", "v2"), b"data2", Duration::from_secs(3600))
            .unwrap();

        assert!(cache.delete(&key("video", "v1")).unwrap());
        assert!(!cache.delete(&key("video", "v1")).unwrap());
        assert!(cache.get(&key("video", "v1")).unwrap().is_none());
        assert!(cache.get(&key("video", "v2")).unwrap().is_some());
    }

    #[test]
    fn test_stats_per_namespace() {
        let (_temp, cache) = create_test_cache();

        cache
            .set(&key("video", "v1"), b"12345", Duration::from_secs(3600))
            .unwrap();
        cache
            .set(&key("video", "v2"), b"67890", Duration::from_secs(3600))
            .unwrap();
        cache
            .set(&key("channel", "c1"), b"abcde", Duration::from_secs(3600))
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size_bytes, 15);
        assert_eq!(
            stats.namespaces,
            vec![("channel".to_string(), 1), ("video".to_string(), 2)]
        );
    }

    #[test]
    fn test_cleanup_expired() {
        let (_temp, cache) = create_test_cache();

        let past = (Utc::now() - chrono::Duration::seconds(100)).to_rfc3339();
        cache
            .set_with_expiry(&key("video", "old1"), b"data", &past)
            .unwrap();
        cache
            .set_with_expiry(&key("video", "old2"), b"data", &past)
            .unwrap();
        cache
            .set(&key("video", "new1"), b"data", Duration::from_secs(3600))
            .unwrap();

        assert_eq!(cache.cleanup_expired().unwrap(), 2);
        assert!(cache.get(&key("video", "new1")).unwrap().is_some());
    }

    #[test]
    fn test_eviction_keeps_size_bound() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::with_config(
            temp_dir.path().join("groups.sqlite"),
            CacheConfig::durable(10),
        )
        .unwrap();

        cache
            .set(&key("video", "a"), b"123456", Duration::from_secs(3600))
            .unwrap();
        cache
            .set(&key("video", "b"), b"123456", Duration::from_secs(3600))
            .unwrap();

        let stats = cache.stats().unwrap();
        assert!(stats.total_size_bytes <= 10);
    }

    #[test]
    fn test_clear() {
        let (_temp, cache) = create_test_cache();
        cache
            .set(&key("video", "v1"), b"data", Duration::from_secs(3600))
            .unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }
}

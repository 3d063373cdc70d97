//! Cache backend trait and types.

use super::key::CacheKey;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Configuration for a cache tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// TTL applied when callers do not choose one.
    pub default_ttl: Duration,
    /// Maximum size (entries for the volatile tier, bytes for the durable one;
    /// 0 = unlimited).
    pub max_size: u64,
    /// Whether to evict least recently used entries when over `max_size`.
    pub enable_eviction: bool,
}

impl CacheConfig {
    /// Default time-to-live for durable entries (1 day).
    pub const DEFAULT_TTL_SECS: u64 = 86_400;
    /// Default durable tier size (1 GB).
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1_073_741_824;
    /// Default volatile tier capacity.
    pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

    pub fn durable(max_size_bytes: u64) -> Self {
        Self {
            default_ttl: Duration::from_secs(Self::DEFAULT_TTL_SECS),
            max_size: max_size_bytes,
            enable_eviction: true,
        }
    }

    pub fn volatile(max_entries: u64) -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_size: max_entries,
            enable_eviction: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::durable(Self::DEFAULT_MAX_SIZE_BYTES)
    }
}

/// Size statistics of a single tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of stored entries (expired entries not yet purged included).
    pub total_entries: usize,
    /// Total size of stored values in bytes, when the tier tracks it.
    pub total_size_bytes: u64,
    /// Entry count per namespace (entity kind).
    pub namespaces: Vec<(String, usize)>,
}

/// Key/value storage with per-entry TTL.
///
/// All operations are synchronous; loaders already block on the network, so
/// the tiers do too.
pub trait CacheBackend: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Get cached bytes. Returns `None` if absent or expired.
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Store bytes, replacing any existing entry.
    fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete one entry. Returns whether something was removed.
    fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Remove every entry of the tier.
    fn clear(&self) -> Result<()>;

    /// Current size statistics.
    fn stats(&self) -> Result<CacheStats>;
}

/// Hit/miss counters kept by the tiered cache.
#[derive(Debug, Default)]
pub struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
}

impl HitCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// A tier error that was degraded to a miss or a skipped write.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Hit ratio between 0.0 and 1.0.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

//! Two-tier group cache.
//!
//! Every group names its tier. Tier failures (backend errors, undecodable
//! payloads) are logged and counted, then treated as misses or skipped
//! writes; they never reach the entity framework.

use super::key::{CacheKey, Tier};
use super::memory::MemoryCache;
use super::traits::{CacheBackend, CacheStats, HitCounters};
use crate::error::{Result, YotterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attribute name → raw value.
pub type AttrMap = BTreeMap<String, Value>;

/// What a tier stores for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedGroup {
    /// Values for every attribute of the group.
    pub values: AttrMap,
    /// Set when the entry is a negative-cache record of a failed load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
}

impl CachedGroup {
    pub fn loaded(values: AttrMap) -> Self {
        Self {
            values,
            invalid: None,
        }
    }

    pub fn failed(values: AttrMap, reason: impl Into<String>) -> Self {
        Self {
            values,
            invalid: Some(reason.into()),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }
}

/// Per-tier statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredStats {
    pub volatile: Option<CacheStats>,
    pub durable: Option<CacheStats>,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub failures: u64,
}

/// Volatile + durable tiers behind one get/set/delete/clear surface.
pub struct TieredCache {
    volatile: Arc<dyn CacheBackend>,
    durable: Arc<dyn CacheBackend>,
    counters: HitCounters,
}

impl TieredCache {
    pub fn new(volatile: Arc<dyn CacheBackend>, durable: Arc<dyn CacheBackend>) -> Self {
        Self {
            volatile,
            durable,
            counters: HitCounters::default(),
        }
    }

    /// Both tiers in memory. Nothing survives the process.
    pub fn in_memory(max_entries: u64) -> Self {
        Self::new(
            Arc::new(MemoryCache::new(max_entries)),
            Arc::new(MemoryCache::new(max_entries)),
        )
    }

    fn backend(&self, tier: Tier) -> &dyn CacheBackend {
        match tier {
            Tier::Volatile => self.volatile.as_ref(),
            Tier::Durable => self.durable.as_ref(),
        }
    }

    /// Look a group up. Any tier or decoding failure is a miss.
    pub fn get(&self, tier: Tier, key: &CacheKey) -> Option<CachedGroup> {
        let backend = self.backend(tier);
        let bytes = match backend.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.counters.record_miss();
                return None;
            }
            Err(e) => {
                warn!("{} tier unavailable for {}: {}", backend.name(), key, e);
                self.counters.record_failure();
                self.counters.record_miss();
                return None;
            }
        };

        match serde_json::from_slice::<CachedGroup>(&bytes) {
            Ok(group) => {
                debug!("{} tier hit for {}", backend.name(), key);
                self.counters.record_hit();
                Some(group)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.counters.record_failure();
                self.counters.record_miss();
                let _ = backend.delete(key);
                None
            }
        }
    }

    /// Store a group. Failures are logged and otherwise ignored.
    pub fn set(&self, tier: Tier, key: &CacheKey, group: &CachedGroup, ttl: Duration) {
        let backend = self.backend(tier);
        let bytes = match serde_json::to_vec(group) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode cache entry {}: {}", key, e);
                self.counters.record_failure();
                return;
            }
        };

        match backend.set(key, &bytes, ttl) {
            Ok(()) => self.counters.record_write(),
            Err(e) => {
                warn!("{} tier rejected write for {}: {}", backend.name(), key, e);
                self.counters.record_failure();
            }
        }
    }

    /// Remove a group. Returns whether an entry was removed.
    pub fn delete(&self, tier: Tier, key: &CacheKey) -> bool {
        let backend = self.backend(tier);
        match backend.delete(key) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("{} tier failed to delete {}: {}", backend.name(), key, e);
                self.counters.record_failure();
                false
            }
        }
    }

    /// Purge both tiers.
    ///
    /// Each tier is cleared even if the other fails; the first failure is
    /// reported afterwards.
    pub fn clear(&self) -> Result<()> {
        let volatile = self.volatile.clear();
        let durable = self.durable.clear();

        let mut failures = Vec::new();
        if let Err(e) = volatile {
            failures.push(format!("{}: {}", self.volatile.name(), e));
        }
        if let Err(e) = durable {
            failures.push(format!("{}: {}", self.durable.name(), e));
        }

        if failures.is_empty() {
            info!("Purged volatile and durable cache tiers");
            Ok(())
        } else {
            Err(YotterError::Other(format!(
                "Cache purge incomplete ({})",
                failures.join("; ")
            )))
        }
    }

    pub fn stats(&self) -> TieredStats {
        TieredStats {
            volatile: self.volatile.stats().ok(),
            durable: self.durable.stats().ok(),
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            writes: self.counters.writes(),
            failures: self.counters.failures(),
        }
    }

    pub fn counters(&self) -> &HitCounters {
        &self.counters
    }
}

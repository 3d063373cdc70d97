//! Volatile in-memory tier.

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheConfig, CacheStats};
use crate::error::Result;
use mini_moka::sync::Cache;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct MemoryEntry {
    value: Vec<u8>,
    /// `None` when the TTL does not fit in an `Instant` (overrides).
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Bounded in-memory tier.
///
/// mini-moka handles the size bound and eviction; it only knows a cache-wide
/// TTL, so the per-entry deadline is stored alongside the value and checked
/// on read.
pub struct MemoryCache {
    entries: Cache<String, Arc<MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self::with_config(CacheConfig::volatile(max_entries))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let mut builder = Cache::builder();
        if config.enable_eviction && config.max_size > 0 {
            builder = builder.max_capacity(config.max_size);
        }
        Self {
            entries: builder.build(),
        }
    }

    fn slot(key: &CacheKey) -> String {
        key.to_string()
    }
}

impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let slot = Self::slot(key);
        match self.entries.get(&slot) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                self.entries.invalidate(&slot);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let entry = MemoryEntry {
            value: value.to_vec(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(Self::slot(key), Arc::new(entry));
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool> {
        let slot = Self::slot(key);
        let existed = self.entries.contains_key(&slot);
        self.entries.invalidate(&slot);
        Ok(existed)
    }

    fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        let now = Instant::now();
        let mut per_namespace: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_entries = 0;
        let mut total_size_bytes = 0u64;

        for item in self.entries.iter() {
            if item.value().is_expired(now) {
                continue;
            }
            let namespace = item
                .key()
                .split_once(':')
                .map(|(ns, _)| ns.to_string())
                .unwrap_or_default();
            *per_namespace.entry(namespace).or_default() += 1;
            total_entries += 1;
            total_size_bytes += item.value().value.len() as u64;
        }

        Ok(CacheStats {
            total_entries,
            total_size_bytes,
            namespaces: per_namespace.into_iter().collect(),
        })
    }
}

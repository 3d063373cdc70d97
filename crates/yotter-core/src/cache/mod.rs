//! Tiered cache for entity attribute groups.
//!
//! - volatile tier: bounded in-memory store (mini-moka) for cheap or
//!   fast-changing groups
//! - durable tier: SQLite store that survives restarts, for expensive groups
//!
//! Both are addressed by a [`CacheKey`] derived from entity kind, group,
//! natural key and loader arguments.

mod key;
mod memory;
mod sqlite;
mod tiered;
mod traits;

pub use key::{CacheKey, Tier};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use tiered::{AttrMap, CachedGroup, TieredCache, TieredStats};
pub use traits::{CacheBackend, CacheConfig, CacheStats, HitCounters};

//! Lazy property-group framework.
//!
//! Entity kinds declare a static [`Schema`] of attribute groups. Each
//! instance carries a [`GroupCore`] that materializes a group on first access:
//! from the instance itself, then the group's cache tier, then the kind's
//! loader. A failing loader turns the whole entity invalid: every attribute
//! reads as its per-kind default and the failure is negative-cached.

mod core;
mod lazy;
mod persisted;
mod schema;

pub use self::core::{GroupCore, GroupState};
pub use lazy::LazyGrouped;
pub use persisted::BackingLink;
pub use schema::{GroupDef, Schema};

use crate::cache::TieredCache;
use crate::config::CacheTtl;
use crate::mapper::PropMappers;
use std::sync::Arc;
use std::time::Duration;

/// Shared services every entity instance reads through.
pub struct EntityContext {
    pub cache: Arc<TieredCache>,
    pub mappers: Arc<PropMappers>,
    /// Lifetime of negative-cache entries.
    pub negative_ttl: Duration,
}

impl EntityContext {
    pub fn new(cache: Arc<TieredCache>, mappers: Arc<PropMappers>) -> Self {
        Self {
            cache,
            mappers,
            negative_ttl: CacheTtl::NEGATIVE,
        }
    }

    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }
}

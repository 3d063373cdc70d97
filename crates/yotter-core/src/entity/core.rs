//! Per-instance group state and the dispatch that drives it.

use super::schema::{GroupDef, Schema};
use super::EntityContext;
use crate::cache::{AttrMap, CacheKey, CachedGroup};
use crate::config::CacheTtl;
use crate::error::{Result, YotterError};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Materialization state of one group on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    /// Nothing fetched yet; attributes may still have been written directly.
    Unloaded,
    /// Filled from the cache or the loader.
    Loaded,
    /// Overridden: cached with the override lifetime, never loaded again.
    Pinned,
    /// Loading failed; attributes hold the invalid defaults.
    Invalid(String),
}

#[derive(Debug)]
struct Slot {
    values: AttrMap,
    state: GroupState,
}

#[derive(Debug)]
struct CoreState {
    slots: Vec<Slot>,
    invalid: Option<String>,
}

/// The lazily materialized attributes of one entity instance.
///
/// Reads go instance → cache tier → loader. The lock is never held across a
/// loader call, since loaders may prepopulate attributes of the same entity.
pub struct GroupCore {
    schema: &'static Schema,
    key: String,
    args: Vec<String>,
    context: Arc<EntityContext>,
    state: RwLock<CoreState>,
}

impl std::fmt::Debug for GroupCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCore")
            .field("kind", &self.schema.kind)
            .field("key", &self.key)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl GroupCore {
    pub fn new(schema: &'static Schema, key: impl Into<String>, context: Arc<EntityContext>) -> Self {
        Self::with_args(schema, key, Vec::new(), context)
    }

    /// Loader arguments become part of every cache key of this instance.
    pub fn with_args(
        schema: &'static Schema,
        key: impl Into<String>,
        args: Vec<String>,
        context: Arc<EntityContext>,
    ) -> Self {
        let slots = schema
            .groups
            .iter()
            .map(|_| Slot {
                values: AttrMap::new(),
                state: GroupState::Unloaded,
            })
            .collect();
        Self {
            schema,
            key: key.into(),
            args,
            context,
            state: RwLock::new(CoreState {
                slots,
                invalid: None,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &'static str {
        self.schema.kind
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn context(&self) -> &Arc<EntityContext> {
        &self.context
    }

    pub fn cache_key(&self, group: &GroupDef) -> CacheKey {
        CacheKey::new(self.schema.kind, group.name, &self.key, &self.args)
    }

    fn unknown_attribute(&self, attribute: &str) -> YotterError {
        YotterError::UnknownAttribute {
            kind: self.schema.kind.to_string(),
            attribute: attribute.to_string(),
        }
    }

    fn unknown_group(&self, group: &str) -> YotterError {
        YotterError::UnknownGroup {
            kind: self.schema.kind.to_string(),
            group: group.to_string(),
        }
    }

    fn present(&self, attribute: &str, value: Value, mapped: bool) -> Value {
        match self.schema.mapper_for(attribute) {
            Some(mapper) if mapped => self.context.mappers.apply(mapper, &value),
            _ => value,
        }
    }

    /// Read one attribute, materializing its group on first access.
    ///
    /// `loader` runs only on a cache miss of a fetchable group. Loader
    /// failures put the entity in the invalid state and never surface here;
    /// the only errors are programming defects.
    pub fn read<F>(&self, attribute: &str, mapped: bool, loader: F) -> Result<Value>
    where
        F: FnOnce(&'static GroupDef) -> Result<AttrMap>,
    {
        let (idx, group) = self
            .schema
            .group_of(attribute)
            .ok_or_else(|| self.unknown_attribute(attribute))?;

        let needs_load = {
            let state = self.state.read();
            let slot = &state.slots[idx];
            if let Some(value) = slot.values.get(attribute) {
                return Ok(self.present(attribute, value.clone(), mapped));
            }
            state.invalid.is_none() && slot.state == GroupState::Unloaded
        };

        let fetched = if needs_load {
            self.materialize(idx, group, loader)?
        } else {
            None
        };

        // A concurrent invalidation may have emptied the slot again; the
        // values just fetched still answer this read.
        let value = self
            .state
            .read()
            .slots[idx]
            .values
            .get(attribute)
            .cloned()
            .or_else(|| fetched.and_then(|mut values| values.remove(attribute)))
            .unwrap_or_else(|| self.schema.default_for(attribute));
        Ok(self.present(attribute, value, mapped))
    }

    /// Returns the group values that were found or loaded, if any.
    fn materialize<F>(
        &self,
        idx: usize,
        group: &'static GroupDef,
        loader: F,
    ) -> Result<Option<AttrMap>>
    where
        F: FnOnce(&'static GroupDef) -> Result<AttrMap>,
    {
        let key = self.cache_key(group);

        if let Some(cached) = self.context.cache.get(group.tier, &key) {
            if let Some(reason) = cached.invalid {
                debug!("{} '{}' is negative-cached: {}", self.schema.kind, self.key, reason);
                self.enter_invalid(&reason);
                return Ok(None);
            }
            if group.is_complete(&cached.values) {
                self.fill(idx, group, cached.values.clone(), GroupState::Loaded);
                return Ok(Some(cached.values));
            }
            debug!("Ignoring incomplete cache entry {} for group '{}'", key, group.name);
        }

        if !group.fetchable {
            return Ok(None);
        }

        debug!("Loading group '{}' of {} '{}'", group.name, self.schema.kind, self.key);
        let loaded = loader(group).and_then(|values| match group.first_missing(&values) {
            Some(missing) => Err(YotterError::upstream(format!(
                "loader for {}.{} returned no '{}'",
                self.schema.kind, group.name, missing
            ))),
            None => Ok(values),
        });

        match loaded {
            Ok(mut values) => {
                if self.is_invalid() {
                    debug!(
                        "{} '{}' turned invalid while loading '{}', not caching it",
                        self.schema.kind, self.key, group.name
                    );
                    return Ok(None);
                }
                values.retain(|attr, _| group.declares(attr));
                self.context
                    .cache
                    .set(group.tier, &key, &CachedGroup::loaded(values.clone()), group.ttl);
                self.fill(idx, group, values.clone(), GroupState::Loaded);
                Ok(Some(values))
            }
            Err(e) if e.is_programming_defect() => Err(e),
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    "Group '{}' of {} '{}' failed to load: {}",
                    group.name, self.schema.kind, self.key, reason
                );
                let sentinel = CachedGroup::failed(self.schema.defaults_for(group), reason.clone());
                self.context
                    .cache
                    .set(group.tier, &key, &sentinel, self.context.negative_ttl);
                self.enter_invalid(&reason);
                Ok(None)
            }
        }
    }

    /// Materialize loaded values. Attributes already set on the instance win.
    fn fill(&self, idx: usize, group: &GroupDef, values: AttrMap, next: GroupState) {
        let mut state = self.state.write();
        if state.invalid.is_some() {
            return;
        }
        let slot = &mut state.slots[idx];
        for (attr, value) in values {
            if group.declares(&attr) {
                slot.values.entry(attr).or_insert(value);
            }
        }
        if slot.state == GroupState::Unloaded {
            slot.state = next;
        }
    }

    fn enter_invalid(&self, reason: &str) {
        let defaults = (self.schema.invalid_defaults)();
        let mut state = self.state.write();
        for (group, slot) in self.schema.groups.iter().zip(state.slots.iter_mut()) {
            slot.values = group
                .attributes
                .iter()
                .map(|attr| {
                    let value = defaults.get(*attr).cloned().unwrap_or(Value::Null);
                    (attr.to_string(), value)
                })
                .collect();
            slot.state = GroupState::Invalid(reason.to_string());
        }
        state.invalid = Some(reason.to_string());
    }

    /// Set an attribute; re-cache its group if every attribute is now known.
    pub fn write(&self, attribute: &str, value: Value) -> Result<()> {
        self.put(attribute, value, false).map(|_| ())
    }

    /// Set an attribute only if it has never been set. First writer wins.
    pub fn store_if_absent(&self, attribute: &str, value: Value) -> Result<bool> {
        self.put(attribute, value, true)
    }

    fn put(&self, attribute: &str, value: Value, only_if_absent: bool) -> Result<bool> {
        let (idx, group) = self
            .schema
            .group_of(attribute)
            .ok_or_else(|| self.unknown_attribute(attribute))?;

        let snapshot = {
            let mut state = self.state.write();
            let invalid = state.invalid.is_some();
            let slot = &mut state.slots[idx];
            if only_if_absent && slot.values.contains_key(attribute) {
                return Ok(false);
            }
            slot.values.insert(attribute.to_string(), value);

            if invalid || !group.is_complete(&slot.values) {
                None
            } else {
                if slot.state == GroupState::Unloaded {
                    slot.state = GroupState::Loaded;
                }
                Some((slot.values.clone(), slot.state == GroupState::Pinned))
            }
        };

        if let Some((values, pinned)) = snapshot {
            let ttl = if pinned { CacheTtl::OVERRIDE } else { group.ttl };
            self.context
                .cache
                .set(group.tier, &self.cache_key(group), &CachedGroup::loaded(values), ttl);
        }
        Ok(true)
    }

    /// Pin a group: cache the known values with the override lifetime and
    /// never run its loader again on this instance.
    ///
    /// An incomplete group is left as it is, so its loader still runs.
    pub fn override_group(&self, name: &str) -> Result<()> {
        let (idx, group) = self
            .schema
            .group(name)
            .ok_or_else(|| self.unknown_group(name))?;

        let values = {
            let mut state = self.state.write();
            if state.invalid.is_some() {
                return Ok(());
            }
            let slot = &mut state.slots[idx];
            if !group.is_complete(&slot.values) {
                debug!(
                    "Not pinning incomplete group '{}' of {} '{}'",
                    name, self.schema.kind, self.key
                );
                return Ok(());
            }
            slot.state = GroupState::Pinned;
            slot.values.clone()
        };

        self.context.cache.set(
            group.tier,
            &self.cache_key(group),
            &CachedGroup::loaded(values),
            CacheTtl::OVERRIDE,
        );
        Ok(())
    }

    /// Drop a group from the cache and from this instance.
    pub fn invalidate_group(&self, name: &str) -> Result<()> {
        let (idx, group) = self
            .schema
            .group(name)
            .ok_or_else(|| self.unknown_group(name))?;

        self.context.cache.delete(group.tier, &self.cache_key(group));
        let mut state = self.state.write();
        let slot = &mut state.slots[idx];
        slot.values.clear();
        slot.state = GroupState::Unloaded;
        Ok(())
    }

    /// Put the entity in the invalid state without caching anything.
    pub fn make_invalid(&self, reason: &str) {
        self.enter_invalid(reason);
    }

    pub fn is_invalid(&self) -> bool {
        self.state.read().invalid.is_some()
    }

    pub fn invalid_reason(&self) -> Option<String> {
        self.state.read().invalid.clone()
    }

    pub fn group_state(&self, name: &str) -> Option<GroupState> {
        let (idx, _) = self.schema.group(name)?;
        Some(self.state.read().slots[idx].state.clone())
    }

    /// Raw values currently known for a group.
    pub fn known(&self, name: &str) -> Option<AttrMap> {
        let (idx, _) = self.schema.group(name)?;
        Some(self.state.read().slots[idx].values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Tier, TieredCache};
    use crate::mapper::PropMappers;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    static GROUPS: &[GroupDef] = &[
        GroupDef {
            name: "g",
            attributes: &["a", "b"],
            tier: Tier::Durable,
            ttl: Duration::from_secs(3_600),
            fetchable: true,
        },
        GroupDef {
            name: "h",
            attributes: &["c"],
            tier: Tier::Volatile,
            ttl: Duration::from_secs(60),
            fetchable: true,
        },
        GroupDef {
            name: "listing",
            attributes: &["badges"],
            tier: Tier::Volatile,
            ttl: Duration::from_secs(60),
            fetchable: false,
        },
    ];

    fn defaults() -> AttrMap {
        let mut map = AttrMap::new();
        map.insert("a".into(), json!(-1));
        map.insert("c".into(), json!("n/a"));
        map.insert("badges".into(), json!([]));
        map
    }

    static SCHEMA: Schema = Schema {
        kind: "thing",
        groups: GROUPS,
        mapped: &[],
        invalid_defaults: defaults,
    };

    fn context() -> Arc<EntityContext> {
        Arc::new(EntityContext::new(
            Arc::new(TieredCache::in_memory(100)),
            Arc::new(PropMappers::new()),
        ))
    }

    fn ab() -> AttrMap {
        let mut map = AttrMap::new();
        map.insert("a".into(), json!(1));
        map.insert("b".into(), json!(2));
        map
    }

    #[test]
    fn test_group_loads_once() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        let calls = AtomicUsize::new(0);
        let loader = |_: &'static GroupDef| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ab())
        };

        assert_eq!(core.read("a", true, loader).unwrap(), json!(1));
        assert_eq!(core.read("b", true, loader).unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(core.group_state("g"), Some(GroupState::Loaded));
    }

    #[test]
    fn test_unknown_attribute_is_a_defect() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        let err = core.read("zzz", true, |_| Ok(AttrMap::new())).unwrap_err();
        assert!(err.is_programming_defect());
        assert!(core.write("zzz", json!(1)).is_err());
        assert!(core.override_group("zzz").is_err());
    }

    #[test]
    fn test_loader_failure_enters_invalid_state() {
        let core = GroupCore::new(&SCHEMA, "bad", context());
        let value = core
            .read("c", true, |_| Err(YotterError::not_found("thing", "bad")))
            .unwrap();

        assert_eq!(value, json!("n/a"));
        assert!(core.is_invalid());
        assert_eq!(core.read("a", true, |_| Ok(ab())).unwrap(), json!(-1));
        assert_eq!(core.read("b", true, |_| Ok(ab())).unwrap(), Value::Null);
        assert_eq!(core.invalid_reason().as_deref(), Some("thing not found: bad"));
    }

    #[test]
    fn test_incomplete_loader_result_is_a_failure() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        let value = core
            .read("a", true, |_| {
                let mut partial = AttrMap::new();
                partial.insert("a".into(), json!(1));
                Ok(partial)
            })
            .unwrap();
        assert_eq!(value, json!(-1));
        assert!(core.is_invalid());
    }

    #[test]
    fn test_failure_is_negative_cached() {
        let context = context();
        let first = GroupCore::new(&SCHEMA, "bad", context.clone());
        first
            .read("c", true, |_| Err(YotterError::upstream("boom")))
            .unwrap();

        let second = GroupCore::new(&SCHEMA, "bad", context);
        let value = second
            .read("c", true, |_| panic!("negative cache should answer"))
            .unwrap();
        assert_eq!(value, json!("n/a"));
        assert!(second.is_invalid());
    }

    #[test]
    fn test_partial_writes_are_not_cached() {
        let context = context();
        let core = GroupCore::new(&SCHEMA, "k1", context.clone());
        core.write("a", json!(10)).unwrap();

        let key = core.cache_key(&GROUPS[0]);
        assert!(context.cache.get(Tier::Durable, &key).is_none());

        core.write("b", json!(20)).unwrap();
        let cached = context.cache.get(Tier::Durable, &key).unwrap();
        assert_eq!(cached.values.get("a"), Some(&json!(10)));
        assert_eq!(cached.values.get("b"), Some(&json!(20)));
    }

    #[test]
    fn test_store_if_absent() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        core.write("a", json!("direct")).unwrap();

        assert!(!core.store_if_absent("a", json!("feed")).unwrap());
        assert!(core.store_if_absent("b", json!("feed")).unwrap());
        assert_eq!(core.read("a", true, |_| Ok(ab())).unwrap(), json!("direct"));
        assert_eq!(core.read("b", true, |_| Ok(ab())).unwrap(), json!("feed"));
    }

    #[test]
    fn test_loaded_values_do_not_clobber_prepopulated_ones() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        core.store_if_absent("a", json!("feed")).unwrap();

        assert_eq!(core.read("b", true, |_| Ok(ab())).unwrap(), json!(2));
        assert_eq!(core.read("a", true, |_| Ok(ab())).unwrap(), json!("feed"));
    }

    #[test]
    fn test_override_survives_cache_loss() {
        let context = context();
        let core = GroupCore::new(&SCHEMA, "k1", context.clone());
        core.write("a", json!(1)).unwrap();
        core.write("b", json!(2)).unwrap();
        core.override_group("g").unwrap();

        context.cache.clear().unwrap();
        let value = core.read("a", true, |_| panic!("pinned group reloaded")).unwrap();
        assert_eq!(value, json!(1));
        assert_eq!(core.group_state("g"), Some(GroupState::Pinned));
    }

    #[test]
    fn test_incomplete_group_is_not_pinned() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        core.override_group("g").unwrap();
        assert_eq!(core.group_state("g"), Some(GroupState::Unloaded));

        core.write("a", json!(10)).unwrap();
        core.override_group("g").unwrap();
        assert_eq!(core.group_state("g"), Some(GroupState::Unloaded));

        // The loader still fills the gap; the direct write wins.
        assert_eq!(core.read("b", true, |_| Ok(ab())).unwrap(), json!(2));
        assert_eq!(core.read("a", true, |_| Ok(ab())).unwrap(), json!(10));
        assert!(!core.is_invalid());
    }

    #[test]
    fn test_entity_invalidated_during_load_caches_nothing() {
        let context = context();
        let core = GroupCore::new(&SCHEMA, "k1", context.clone());
        let value = core
            .read("a", true, |_| {
                core.make_invalid("sibling group failed");
                Ok(ab())
            })
            .unwrap();
        assert_eq!(value, json!(-1));
        assert!(core.is_invalid());

        let key = core.cache_key(&GROUPS[0]);
        assert!(context.cache.get(Tier::Durable, &key).is_none());

        let fresh = GroupCore::new(&SCHEMA, "k1", context);
        assert_eq!(fresh.read("a", true, |_| Ok(ab())).unwrap(), json!(1));
        assert!(!fresh.is_invalid());
    }

    #[test]
    fn test_failures_expire_with_the_negative_lifetime() {
        let context = Arc::new(
            EntityContext::new(
                Arc::new(TieredCache::in_memory(100)),
                Arc::new(PropMappers::new()),
            )
            .with_negative_ttl(Duration::ZERO),
        );
        let calls = AtomicUsize::new(0);
        let failing = |_: &'static GroupDef| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(YotterError::upstream("boom"))
        };

        GroupCore::new(&SCHEMA, "bad", context.clone())
            .read("c", true, failing)
            .unwrap();
        let again = GroupCore::new(&SCHEMA, "bad", context.clone());
        again.read("c", true, failing).unwrap();
        assert!(again.is_invalid());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Successes keep the group's own lifetime.
        GroupCore::new(&SCHEMA, "good", context.clone())
            .read("a", true, |_| Ok(ab()))
            .unwrap();
        let cached = GroupCore::new(&SCHEMA, "good", context);
        let value = cached
            .read("a", true, |_| panic!("successful group reloaded"))
            .unwrap();
        assert_eq!(value, json!(1));
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        let calls = AtomicUsize::new(0);
        let loader = |_: &'static GroupDef| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ab())
        };

        core.read("a", true, loader).unwrap();
        core.invalidate_group("g").unwrap();
        assert_eq!(core.group_state("g"), Some(GroupState::Unloaded));
        assert_eq!(core.known("g"), Some(AttrMap::new()));

        core.read("a", true, loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listing_group_never_loads() {
        let core = GroupCore::new(&SCHEMA, "k1", context());
        let value = core
            .read("badges", true, |_| panic!("listing groups have no loader"))
            .unwrap();
        assert_eq!(value, json!([]));
        assert!(!core.is_invalid());
    }

    #[test]
    fn test_listing_group_found_in_cache() {
        let context = context();
        let writer = GroupCore::new(&SCHEMA, "k1", context.clone());
        writer.write("badges", json!(["4K"])).unwrap();
        writer.override_group("listing").unwrap();

        let reader = GroupCore::new(&SCHEMA, "k1", context);
        let value = reader.read("badges", true, |_| unreachable!()).unwrap();
        assert_eq!(value, json!(["4K"]));
    }
}

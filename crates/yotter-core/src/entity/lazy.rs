//! The capability every grouped entity implements.

use super::core::{GroupCore, GroupState};
use super::schema::GroupDef;
use crate::cache::AttrMap;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// An entity whose attributes live in lazily loaded, cached groups.
///
/// Implementors supply the instance state and one loader dispatch; reads,
/// writes, overrides and invalidation come for free.
pub trait LazyGrouped {
    fn core(&self) -> &GroupCore;

    /// Fetch every attribute of `group` from upstream.
    fn load_group(&self, group: &GroupDef) -> Result<AttrMap>;

    /// Presented value of an attribute (mappers applied).
    fn get(&self, attribute: &str) -> Result<Value> {
        self.core()
            .read(attribute, true, |group| self.load_group(group))
    }

    /// Raw value of an attribute, exactly as cached.
    fn get_raw(&self, attribute: &str) -> Result<Value> {
        self.core()
            .read(attribute, false, |group| self.load_group(group))
    }

    /// Typed read for accessors over declared attributes. Values that do not
    /// deserialize read as `T::default()`.
    fn value<T>(&self, attribute: &str) -> T
    where
        T: DeserializeOwned + Default,
        Self: Sized,
    {
        match self.get(attribute) {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(e) => {
                warn!("{}", e);
                T::default()
            }
        }
    }

    fn set<T>(&self, attribute: &str, value: T) -> Result<()>
    where
        T: Serialize,
        Self: Sized,
    {
        self.core().write(attribute, serde_json::to_value(value)?)
    }

    fn store_if_absent<T>(&self, attribute: &str, value: T) -> Result<bool>
    where
        T: Serialize,
        Self: Sized,
    {
        self.core()
            .store_if_absent(attribute, serde_json::to_value(value)?)
    }

    fn override_group(&self, group: &str) -> Result<()> {
        self.core().override_group(group)
    }

    fn invalidate_group(&self, group: &str) -> Result<()> {
        self.core().invalidate_group(group)
    }

    fn group_state(&self, group: &str) -> Option<GroupState> {
        self.core().group_state(group)
    }

    fn is_invalid(&self) -> bool {
        self.core().is_invalid()
    }

    fn invalid_reason(&self) -> Option<String> {
        self.core().invalid_reason()
    }

    fn make_invalid(&self, reason: &str) {
        self.core().make_invalid(reason)
    }

    fn natural_key(&self) -> &str {
        self.core().key()
    }
}

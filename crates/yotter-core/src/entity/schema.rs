//! Static per-kind group tables.

use crate::cache::{AttrMap, Tier};
use serde_json::Value;
use std::time::Duration;

/// One attribute group: a fixed attribute set filled by a single fetch.
#[derive(Debug)]
pub struct GroupDef {
    pub name: &'static str,
    pub attributes: &'static [&'static str],
    pub tier: Tier,
    /// Lifetime of a successful load.
    pub ttl: Duration,
    /// List-membership groups have no loader; they are only ever written
    /// by whoever discovered the entity inside a listing.
    pub fetchable: bool,
}

impl GroupDef {
    pub fn declares(&self, attribute: &str) -> bool {
        self.attributes.contains(&attribute)
    }

    /// First declared attribute missing from `values`.
    pub fn first_missing(&self, values: &AttrMap) -> Option<&'static str> {
        self.attributes
            .iter()
            .copied()
            .find(|attr| !values.contains_key(*attr))
    }

    pub fn is_complete(&self, values: &AttrMap) -> bool {
        self.first_missing(values).is_none()
    }
}

/// Everything the framework needs to know about one entity kind.
#[derive(Debug)]
pub struct Schema {
    /// Kind name, first component of every cache key.
    pub kind: &'static str,
    pub groups: &'static [GroupDef],
    /// Attribute → presentation mapper name.
    pub mapped: &'static [(&'static str, &'static str)],
    /// Values shown for every attribute once an entity is invalid.
    pub invalid_defaults: fn() -> AttrMap,
}

impl Schema {
    /// Group declaring `attribute`, with its position in `groups`.
    pub fn group_of(&self, attribute: &str) -> Option<(usize, &'static GroupDef)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.declares(attribute))
    }

    pub fn group(&self, name: &str) -> Option<(usize, &'static GroupDef)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.name == name)
    }

    pub fn mapper_for(&self, attribute: &str) -> Option<&'static str> {
        self.mapped
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, mapper)| *mapper)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.groups
            .iter()
            .flat_map(|group| group.attributes.iter().copied())
    }

    /// Default values for one group, `null` where the table has none.
    pub fn defaults_for(&self, group: &GroupDef) -> AttrMap {
        let table = (self.invalid_defaults)();
        group
            .attributes
            .iter()
            .map(|attr| {
                let value = table.get(*attr).cloned().unwrap_or(Value::Null);
                (attr.to_string(), value)
            })
            .collect()
    }

    pub fn default_for(&self, attribute: &str) -> Value {
        (self.invalid_defaults)()
            .remove(attribute)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static GROUPS: &[GroupDef] = &[
        GroupDef {
            name: "g",
            attributes: &["a", "b"],
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
        map.insert("a".into(), json!(0));
        map
    }

    static SCHEMA: Schema = Schema {
        kind: "thing",
        groups: GROUPS,
        mapped: &[("b", "map_image_url")],
        invalid_defaults: defaults,
    };

    #[test]
    fn test_lookup() {
        assert_eq!(SCHEMA.group_of("b").map(|(i, g)| (i, g.name)), Some((0, "g")));
        assert_eq!(SCHEMA.group("listing").map(|(i, _)| i), Some(1));
        assert!(SCHEMA.group_of("nope").is_none());
        assert_eq!(SCHEMA.mapper_for("b"), Some("map_image_url"));
        assert_eq!(SCHEMA.attributes().collect::<Vec<_>>(), vec!["a", "b", "badges"]);
    }

    #[test]
    fn test_defaults_fill_nulls() {
        let defaults = SCHEMA.defaults_for(&GROUPS[0]);
        assert_eq!(defaults.get("a"), Some(&json!(0)));
        assert_eq!(defaults.get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_completeness() {
        let mut values = AttrMap::new();
        values.insert("a".into(), json!(1));
        assert_eq!(GROUPS[0].first_missing(&values), Some("b"));
        values.insert("b".into(), json!(2));
        assert!(GROUPS[0].is_complete(&values));
    }
}

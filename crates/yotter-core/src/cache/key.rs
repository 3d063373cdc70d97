//! Composite cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Which tier a group is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Bounded in-memory tier for cheap or fast-changing groups.
    Volatile,
    /// Disk-backed tier for expensive, slow-changing groups.
    Durable,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Volatile => write!(f, "volatile"),
            Tier::Durable => write!(f, "durable"),
        }
    }
}

/// Deterministic key of one group of one entity.
///
/// The digest covers entity kind, group, natural key and loader arguments;
/// the kind is kept in clear as the namespace so tiers can report per-kind
/// statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    digest: String,
}

impl CacheKey {
    pub fn new(kind: &str, group: &str, natural_key: &str, args: &[String]) -> Self {
        let mut hasher = Sha256::new();
        for part in [kind, group, natural_key] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        for arg in args {
            hasher.update(arg.as_bytes());
            hasher.update([0u8]);
        }
        Self {
            namespace: kind.to_string(),
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Key for a free-standing memoized lookup that belongs to no entity
    /// group (e.g. URL path → channel id).
    pub fn lookup(name: &str, input: &str) -> Self {
        Self::new("lookup", name, input, &[])
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::new("video", "summary", "v1", &[]);
        let b = CacheKey::new("video", "summary", "v1", &[]);
        assert_eq!(a, b);
        assert_eq!(a.namespace(), "video");
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_every_component_matters() {
        let base = CacheKey::new("video", "summary", "v1", &[]);
        assert_ne!(base, CacheKey::new("channel", "summary", "v1", &[]));
        assert_ne!(base, CacheKey::new("video", "detail", "v1", &[]));
        assert_ne!(base, CacheKey::new("video", "summary", "v2", &[]));
        assert_ne!(base, CacheKey::new("video", "summary", "v1", &["2".into()]));
    }

    #[test]
    fn test_separator_prevents_ambiguity() {
        let a = CacheKey::new("video", "ab", "c", &[]);
        let b = CacheKey::new("video", "a", "bc", &[]);
        assert_ne!(a, b);
    }
}

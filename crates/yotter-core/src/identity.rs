//! Identity maps: at most one live instance per natural key within a scope.
//!
//! A [`Scope`] owns one map per entity kind. The global scope lives as long
//! as the application; a unit-of-work scope lives for one request and binds
//! its entities to that request's backing-store unit. Maps are bounded, so
//! an evicted instance is rebuilt on next lookup and reloads from the cache.

use crate::cache::{AttrMap, CacheKey, CachedGroup, Tier};
use crate::config::{CacheTtl, InvalidDefaults};
use crate::entity::LazyGrouped;
use crate::store::UnitOfWork;
use crate::youtube::{Channel, Playlist, Services, Video};
use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bounded map from natural key to shared instance.
///
/// Least recently used entries are evicted first. A new key is always
/// admitted, so the instance just built is the one later lookups return.
pub struct IdentityMap<E> {
    entries: Mutex<LinkedHashMap<String, Arc<E>>>,
    capacity: usize,
}

impl<E> IdentityMap<E> {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Mutex::new(LinkedHashMap::new()),
            capacity: usize::try_from(capacity).unwrap_or(usize::MAX).max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<E>> {
        self.entries.lock().get_refresh(key).cloned()
    }

    /// The registered instance for `key`, building and registering one if
    /// there is none. `build` runs under the map lock and must not look up
    /// other instances.
    pub fn get_or_insert_with<F>(&self, key: &str, build: F) -> Arc<E>
    where
        F: FnOnce() -> E,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get_refresh(key) {
            return existing.clone();
        }
        let built = Arc::new(build());
        while entries.len() >= self.capacity {
            if entries.pop_front().is_none() {
                break;
            }
        }
        entries.insert(key.to_string(), built.clone());
        built
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct ScopeInner {
    services: Arc<Services>,
    unit: Option<Arc<UnitOfWork>>,
    videos: IdentityMap<Video>,
    channels: IdentityMap<Channel>,
    playlists: IdentityMap<Playlist>,
}

/// Where entity instances are looked up and registered.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("unit_of_work", &self.inner.unit.is_some())
            .field("videos", &self.inner.videos.len())
            .field("channels", &self.inner.channels.len())
            .field("playlists", &self.inner.playlists.len())
            .finish()
    }
}

impl Scope {
    /// Application-wide scope. Entities in it have no backing store.
    pub fn global(services: Arc<Services>, capacity: u64) -> Self {
        Self::build(services, None, capacity)
    }

    /// Request scope whose entities resolve backing records through `unit`.
    pub fn unit_of_work(services: Arc<Services>, unit: Arc<UnitOfWork>, capacity: u64) -> Self {
        Self::build(services, Some(unit), capacity)
    }

    fn build(services: Arc<Services>, unit: Option<Arc<UnitOfWork>>, capacity: u64) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                services,
                unit,
                videos: IdentityMap::new(capacity),
                channels: IdentityMap::new(capacity),
                playlists: IdentityMap::new(capacity),
            }),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.inner.services
    }

    pub fn unit(&self) -> Option<&Arc<UnitOfWork>> {
        self.inner.unit.as_ref()
    }

    pub fn video(&self, id: &str) -> Arc<Video> {
        let inner = &self.inner;
        inner.videos.get_or_insert_with(id, || {
            Video::with_unit(inner.services.clone(), id, inner.unit.clone())
        })
    }

    pub fn channel(&self, cid: &str) -> Arc<Channel> {
        let inner = &self.inner;
        inner.channels.get_or_insert_with(cid, || {
            Channel::with_unit(inner.services.clone(), cid, inner.unit.clone())
        })
    }

    pub fn playlist(&self, pid: &str) -> Arc<Playlist> {
        let inner = &self.inner;
        inner.playlists.get_or_insert_with(pid, || {
            Playlist::with_unit(inner.services.clone(), pid, inner.unit.clone())
        })
    }

    /// Channel behind a URL path (`/c/name`, `/user/name`, `/channel/UC..`).
    ///
    /// The path → id resolution is memoized in the durable tier, failures
    /// with the negative lifetime. An unresolvable path yields the invalid
    /// channel.
    pub fn channel_for_urlpath(&self, path: &str) -> Arc<Channel> {
        let context = &self.inner.services.context;
        let key = CacheKey::lookup("channel_id", path);

        if let Some(cached) = context.cache.get(Tier::Durable, &key) {
            if let Some(reason) = cached.invalid {
                debug!("Channel path {} is negative-cached: {}", path, reason);
                return self.invalid_channel(&reason);
            }
            if let Some(cid) = cached.values.get("cid").and_then(Value::as_str) {
                let channel = self.channel(cid);
                channel.remember_urlpath(path);
                return channel;
            }
        }

        match self.inner.services.sources.channels.resolve_id(path) {
            Ok(cid) => {
                let values: AttrMap = [("cid".to_string(), Value::String(cid.clone()))].into();
                context
                    .cache
                    .set(Tier::Durable, &key, &CachedGroup::loaded(values), CacheTtl::CHANNEL_ID);
                let channel = self.channel(&cid);
                channel.remember_urlpath(path);
                channel
            }
            Err(e) if e.is_programming_defect() => {
                warn!("Resolving channel path {}: {}", path, e);
                self.invalid_channel(&e.to_string())
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Could not resolve channel path {}: {}", path, reason);
                context.cache.set(
                    Tier::Durable,
                    &key,
                    &CachedGroup::failed(AttrMap::new(), reason.clone()),
                    context.negative_ttl,
                );
                self.invalid_channel(&reason)
            }
        }
    }

    /// An invalid video, registered nowhere.
    pub fn invalid_video(&self, reason: &str) -> Arc<Video> {
        let video = Video::new(self.inner.services.clone(), InvalidDefaults::NOT_FOUND_KEY);
        video.make_invalid(reason);
        Arc::new(video)
    }

    pub fn invalid_channel(&self, reason: &str) -> Arc<Channel> {
        let channel = Channel::new(self.inner.services.clone(), InvalidDefaults::NOT_FOUND_KEY);
        channel.make_invalid(reason);
        Arc::new(channel)
    }

    pub fn invalid_playlist(&self, reason: &str) -> Arc<Playlist> {
        let playlist = Playlist::new(self.inner.services.clone(), InvalidDefaults::NOT_FOUND_KEY);
        playlist.make_invalid(reason);
        Arc::new(playlist)
    }

    /// Forget every registered instance. Cached groups are untouched.
    pub fn clear(&self) {
        self.inner.videos.clear();
        self.inner.channels.clear();
        self.inner.playlists.clear();
    }
}

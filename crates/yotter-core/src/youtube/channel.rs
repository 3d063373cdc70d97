use super::{page_count, recent_prefix, Services, Video};
use crate::cache::{AttrMap, Tier};
use crate::config::{CacheTtl, InvalidDefaults, NetworkConfig};
use crate::entity::{BackingLink, GroupCore, GroupDef, LazyGrouped, Schema};
use crate::error::{Result, YotterError};
use crate::humanize;
use crate::identity::Scope;
use crate::mapper::MAP_IMAGE_URL;
use crate::store::{RecordField, RecordKind, UnitOfWork};
use crate::upstream::{to_attrs, ChannelLink, FeedEntry, VideoListPage};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::warn;

static CHANNEL_GROUPS: &[GroupDef] = &[
    GroupDef {
        name: "feed",
        attributes: &["recent_videos"],
        tier: Tier::Volatile,
        ttl: CacheTtl::FEED,
        fetchable: true,
    },
    GroupDef {
        name: "about",
        attributes: &[
            "name",
            "avatar",
            "sub_count",
            "joined",
            "description",
            "view_count",
            "links",
        ],
        tier: Tier::Durable,
        ttl: CacheTtl::DETAIL,
        fetchable: true,
    },
    GroupDef {
        name: "video_count",
        attributes: &["num_videos", "num_video_pages"],
        tier: Tier::Durable,
        ttl: CacheTtl::VIDEO_COUNT,
        fetchable: true,
    },
    GroupDef {
        name: "listing",
        attributes: &["sub_count_text", "badges"],
        tier: Tier::Volatile,
        ttl: CacheTtl::LISTING,
        fetchable: false,
    },
];

fn channel_defaults() -> AttrMap {
    let defaults = json!({
        "recent_videos": [],
        "name": InvalidDefaults::CHANNEL_NAME,
        "avatar": "",
        "sub_count": 0,
        "joined": InvalidDefaults::JOINED,
        "description": InvalidDefaults::CHANNEL_DESCRIPTION,
        "view_count": 0,
        "links": [],
        "num_videos": 0,
        "num_video_pages": 0,
        "sub_count_text": "",
        "badges": [],
    });
    match defaults {
        Value::Object(fields) => fields.into_iter().collect(),
        _ => AttrMap::new(),
    }
}

pub static CHANNEL_SCHEMA: Schema = Schema {
    kind: "channel",
    groups: CHANNEL_GROUPS,
    mapped: &[("avatar", MAP_IMAGE_URL)],
    invalid_defaults: channel_defaults,
};

/// A channel, addressed by its channel id.
pub struct Channel {
    core: GroupCore,
    services: Arc<Services>,
    backing: BackingLink,
    /// `/c/..` or `/user/..` path this channel was first resolved from.
    urlpath: OnceLock<String>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Channel {}>", self.cid())
    }
}

impl Channel {
    /// A standalone instance, registered nowhere and bound to no store.
    pub fn new(services: Arc<Services>, cid: impl Into<String>) -> Self {
        Self::with_unit(services, cid, None)
    }

    pub(crate) fn with_unit(
        services: Arc<Services>,
        cid: impl Into<String>,
        unit: Option<Arc<UnitOfWork>>,
    ) -> Self {
        let cid = cid.into();
        Self {
            core: GroupCore::new(&CHANNEL_SCHEMA, cid.clone(), services.context.clone()),
            backing: BackingLink::new(RecordKind::Channel, cid, unit),
            services,
            urlpath: OnceLock::new(),
        }
    }

    pub fn cid(&self) -> &str {
        self.core.key()
    }

    /// Upstream URL, keeping the custom or legacy path when the channel was
    /// looked up by one.
    pub fn url(&self) -> String {
        match self.urlpath.get() {
            Some(path) => format!("{}{}", NetworkConfig::BASE_URL, path),
            None => format!("{}/channel/{}", NetworkConfig::BASE_URL, self.cid()),
        }
    }

    /// Record the path this channel was reached through. The first one sticks.
    pub(crate) fn remember_urlpath(&self, path: &str) {
        let path = path.trim_end_matches('/');
        if path.starts_with("/c/") || path.starts_with("/user/") {
            self.urlpath.get_or_init(|| path.to_string());
        }
    }

    pub fn name(&self) -> String {
        self.value("name")
    }

    pub fn avatar(&self) -> String {
        self.value("avatar")
    }

    pub fn sub_count(&self) -> Option<u64> {
        self.value("sub_count")
    }

    pub fn joined(&self) -> Option<DateTime<Utc>> {
        self.value("joined")
    }

    pub fn description(&self) -> String {
        self.value("description")
    }

    pub fn view_count(&self) -> Option<u64> {
        self.value("view_count")
    }

    pub fn links(&self) -> Vec<ChannelLink> {
        self.value("links")
    }

    pub fn num_videos(&self) -> u64 {
        self.value("num_videos")
    }

    pub fn num_video_pages(&self) -> u64 {
        self.value("num_video_pages")
    }

    pub fn sub_count_text(&self) -> String {
        self.value("sub_count_text")
    }

    pub fn badges(&self) -> Vec<String> {
        self.value("badges")
    }

    pub fn sub_count_human(&self) -> String {
        self.sub_count()
            .map(humanize::compact_count)
            .unwrap_or_default()
    }

    /// Raw feed entries, newest first.
    pub fn feed_entries(&self) -> Vec<FeedEntry> {
        self.value("recent_videos")
    }

    /// The feed's videos, built through `scope` and seeded from the feed.
    pub fn recent_videos(&self, scope: &Scope) -> Vec<Arc<Video>> {
        self.feed_entries()
            .iter()
            .map(|entry| {
                let video = scope.video(&entry.video_id);
                if let Err(e) = video.absorb_feed_entry(entry) {
                    warn!("Could not seed {:?} from feed: {}", video, e);
                }
                video
            })
            .collect()
    }

    /// Newest videos: at most `max_n`, none older than `max_days`.
    pub fn get_recent_videos(&self, scope: &Scope, max_n: usize, max_days: i64) -> Vec<Arc<Video>> {
        recent_prefix(self.recent_videos(scope), Utc::now(), max_n, max_days)
    }

    /// One page of uploads, as listing items.
    pub fn videos_page(&self, scope: &Scope, page: u32, sort: u32) -> Result<Vec<Arc<Video>>> {
        let listing = self
            .services
            .sources
            .channels
            .videos_page(self.cid(), page, sort)?;
        list_videos(scope, &listing, self.cid())
    }

    pub fn is_allowed(&self) -> Result<bool> {
        self.backing.flag(RecordField::IsAllowed)
    }

    pub fn set_allowed(&self, allowed: bool) -> Result<()> {
        self.backing.set(RecordField::IsAllowed, Value::Bool(allowed))
    }

    pub fn is_blocked(&self) -> Result<bool> {
        self.backing.flag(RecordField::IsBlocked)
    }

    pub fn set_blocked(&self, blocked: bool) -> Result<()> {
        self.backing.set(RecordField::IsBlocked, Value::Bool(blocked))
    }

    pub fn backing(&self) -> &BackingLink {
        &self.backing
    }
}

/// Build listing videos: canonical values are prepopulated, the listing
/// group is written and pinned so it is never looked up again.
pub(crate) fn list_videos(
    scope: &Scope,
    listing: &VideoListPage,
    fallback_cid: &str,
) -> Result<Vec<Arc<Video>>> {
    let cid = if listing.cid.is_empty() {
        fallback_cid
    } else {
        listing.cid.as_str()
    };

    let mut videos = Vec::with_capacity(listing.items.len());
    for item in &listing.items {
        let video = scope.video(&item.video_id);
        video.store_if_absent("title", &item.title)?;
        video.store_if_absent("thumbnail", &item.thumbnail)?;
        video.store_if_absent("channel_name", &listing.channel_name)?;
        video.store_if_absent("channel_url", &listing.channel_url)?;
        if !cid.is_empty() {
            video.store_if_absent("cid", cid)?;
        }
        if let Some(views) = item.views {
            video.store_if_absent("views", views)?;
        }
        if let Some(duration) = item.duration {
            video.store_if_absent("duration", duration)?;
        }
        video.set("timestamp_human", &item.time_published)?;
        video.set("badges", &item.badges)?;
        video.override_group("listing")?;
        videos.push(video);
    }
    Ok(videos)
}

impl LazyGrouped for Channel {
    fn core(&self) -> &GroupCore {
        &self.core
    }

    fn load_group(&self, group: &GroupDef) -> Result<AttrMap> {
        let sources = &self.services.sources;
        match group.name {
            "feed" => {
                let feed = sources.channels.feed(self.cid())?;
                self.store_if_absent("joined", feed.published.unwrap_or_else(Utc::now))?;
                if !feed.author_name.is_empty() {
                    self.store_if_absent("name", &feed.author_name)?;
                }
                Ok(AttrMap::from([(
                    "recent_videos".to_string(),
                    serde_json::to_value(&feed.entries)?,
                )]))
            }
            "about" => {
                let about = sources.channels.about(self.cid())?;
                let mut attrs = to_attrs(&about)?;
                let seeded = self
                    .core
                    .known("about")
                    .is_some_and(|known| known.contains_key("joined"));
                if about.joined.is_none() && !seeded {
                    // Fall back on the feed's publish date. The feed is fetched
                    // directly so its failure cannot invalidate this load.
                    match sources.channels.feed(self.cid()) {
                        Ok(feed) => {
                            if let Some(published) = feed.published {
                                attrs.insert("joined".to_string(), serde_json::to_value(published)?);
                            }
                            self.store_if_absent("recent_videos", &feed.entries)?;
                        }
                        Err(e) if e.is_programming_defect() => return Err(e),
                        Err(e) => warn!("No join date for channel {}: {}", self.cid(), e),
                    }
                }
                Ok(attrs)
            }
            "video_count" => {
                let num_videos = sources.channels.video_count(self.cid())?;
                Ok(AttrMap::from([
                    ("num_videos".to_string(), Value::from(num_videos)),
                    ("num_video_pages".to_string(), Value::from(page_count(num_videos))),
                ]))
            }
            other => Err(YotterError::upstream(format!("channel group '{}' has no loader", other))),
        }
    }
}

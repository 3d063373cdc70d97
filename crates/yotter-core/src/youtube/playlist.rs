use super::channel::list_videos;
use super::{page_count, recent_prefix, Services, Video};
use crate::cache::{AttrMap, Tier};
use crate::config::{CacheTtl, InvalidDefaults, NetworkConfig};
use crate::entity::{BackingLink, GroupCore, GroupDef, LazyGrouped, Schema};
use crate::error::{Result, YotterError};
use crate::identity::Scope;
use crate::mapper::MAP_IMAGE_URL;
use crate::store::{RecordField, RecordKind, UnitOfWork};
use crate::upstream::{to_attrs, FeedEntry};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

static PLAYLIST_GROUPS: &[GroupDef] = &[
    GroupDef {
        name: "feed",
        attributes: &["title", "thumbnail", "cid", "channel_name", "recent_videos"],
        tier: Tier::Volatile,
        ttl: CacheTtl::FEED,
        fetchable: true,
    },
    GroupDef {
        name: "detail",
        attributes: &["description", "num_videos", "num_video_pages", "updated", "views"],
        tier: Tier::Durable,
        ttl: CacheTtl::DETAIL,
        fetchable: true,
    },
    GroupDef {
        name: "listing",
        attributes: &["video_count_text", "badges"],
        tier: Tier::Volatile,
        ttl: CacheTtl::LISTING,
        fetchable: false,
    },
];

fn playlist_defaults() -> AttrMap {
    let defaults = json!({
        "title": InvalidDefaults::PLAYLIST_TITLE,
        "thumbnail": "",
        "cid": "",
        "channel_name": "",
        "recent_videos": [],
        "description": "",
        "num_videos": 0,
        "num_video_pages": 0,
        "updated": "",
        "views": 0,
        "video_count_text": "",
        "badges": [],
    });
    match defaults {
        Value::Object(fields) => fields.into_iter().collect(),
        _ => AttrMap::new(),
    }
}

pub static PLAYLIST_SCHEMA: Schema = Schema {
    kind: "playlist",
    groups: PLAYLIST_GROUPS,
    mapped: &[("thumbnail", MAP_IMAGE_URL)],
    invalid_defaults: playlist_defaults,
};

/// A playlist, addressed by its playlist id.
pub struct Playlist {
    core: GroupCore,
    services: Arc<Services>,
    backing: BackingLink,
}

impl std::fmt::Debug for Playlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Playlist {}>", self.pid())
    }
}

impl Playlist {
    pub fn new(services: Arc<Services>, pid: impl Into<String>) -> Self {
        Self::with_unit(services, pid, None)
    }

    pub(crate) fn with_unit(
        services: Arc<Services>,
        pid: impl Into<String>,
        unit: Option<Arc<UnitOfWork>>,
    ) -> Self {
        let pid = pid.into();
        Self {
            core: GroupCore::new(&PLAYLIST_SCHEMA, pid.clone(), services.context.clone()),
            backing: BackingLink::new(RecordKind::Playlist, pid, unit),
            services,
        }
    }

    pub fn pid(&self) -> &str {
        self.core.key()
    }

    pub fn url(&self) -> String {
        format!("{}/playlist?list={}", NetworkConfig::BASE_URL, self.pid())
    }

    pub fn title(&self) -> String {
        self.value("title")
    }

    /// Thumbnail of the first video.
    pub fn thumbnail(&self) -> String {
        self.value("thumbnail")
    }

    /// Id of the owning channel.
    pub fn cid(&self) -> String {
        self.value("cid")
    }

    pub fn channel_name(&self) -> String {
        self.value("channel_name")
    }

    pub fn description(&self) -> String {
        self.value("description")
    }

    pub fn num_videos(&self) -> u64 {
        self.value("num_videos")
    }

    pub fn num_video_pages(&self) -> u64 {
        self.value("num_video_pages")
    }

    pub fn updated(&self) -> String {
        self.value("updated")
    }

    pub fn views(&self) -> u64 {
        self.value("views")
    }

    pub fn video_count_text(&self) -> String {
        self.value("video_count_text")
    }

    pub fn badges(&self) -> Vec<String> {
        self.value("badges")
    }

    pub fn feed_entries(&self) -> Vec<FeedEntry> {
        self.value("recent_videos")
    }

    /// The feed's videos in playlist order, built through `scope`.
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

    pub fn get_recent_videos(&self, scope: &Scope, max_n: usize, max_days: i64) -> Vec<Arc<Video>> {
        recent_prefix(self.recent_videos(scope), Utc::now(), max_n, max_days)
    }

    pub fn videos_page(&self, scope: &Scope, page: u32) -> Result<Vec<Arc<Video>>> {
        let listing = self
            .services
            .sources
            .playlists
            .videos_page(self.pid(), page)?;
        let cid = self.core.known("feed").and_then(|known| {
            known.get("cid").and_then(Value::as_str).map(str::to_string)
        });
        list_videos(scope, &listing, cid.as_deref().unwrap_or_default())
    }

    pub fn is_allowed(&self) -> Result<bool> {
        self.backing.flag(RecordField::IsAllowed)
    }

    pub fn set_allowed(&self, allowed: bool) -> Result<()> {
        self.backing.set(RecordField::IsAllowed, Value::Bool(allowed))
    }

    pub fn backing(&self) -> &BackingLink {
        &self.backing
    }
}

impl LazyGrouped for Playlist {
    fn core(&self) -> &GroupCore {
        &self.core
    }

    fn load_group(&self, group: &GroupDef) -> Result<AttrMap> {
        let sources = &self.services.sources;
        match group.name {
            "feed" => {
                let feed = sources.playlists.feed(self.pid())?;
                let thumbnail = feed
                    .entries
                    .first()
                    .map(|entry| entry.thumbnail.clone())
                    .unwrap_or_default();
                Ok(AttrMap::from([
                    ("title".to_string(), Value::String(feed.title)),
                    ("thumbnail".to_string(), Value::String(thumbnail)),
                    ("cid".to_string(), Value::String(feed.channel_id)),
                    ("channel_name".to_string(), Value::String(feed.author_name)),
                    ("recent_videos".to_string(), serde_json::to_value(&feed.entries)?),
                ]))
            }
            "detail" => {
                let details = sources.playlists.details(self.pid())?;
                let mut attrs = to_attrs(&details)?;
                attrs.insert(
                    "num_video_pages".to_string(),
                    Value::from(page_count(details.num_videos)),
                );
                Ok(attrs)
            }
            other => Err(YotterError::upstream(format!("playlist group '{}' has no loader", other))),
        }
    }
}

use super::Services;
use crate::cache::{AttrMap, Tier};
use crate::config::{CacheTtl, InvalidDefaults};
use crate::entity::{BackingLink, GroupCore, GroupDef, LazyGrouped, Schema};
use crate::error::{Result, YotterError};
use crate::humanize;
use crate::mapper::{MAP_IMAGE_URL, MAP_STREAM_URL};
use crate::store::{RecordField, RecordKind, UnitOfWork};
use crate::upstream::{to_attrs, CaptionTrack, FeedEntry, RelatedVideo, StreamSource};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

static VIDEO_GROUPS: &[GroupDef] = &[
    GroupDef {
        name: "summary",
        attributes: &["title", "thumbnail", "channel_name", "channel_url"],
        tier: Tier::Durable,
        ttl: CacheTtl::SUMMARY,
        fetchable: true,
    },
    GroupDef {
        name: "channel_id",
        attributes: &["cid"],
        tier: Tier::Durable,
        ttl: CacheTtl::CHANNEL_ID,
        fetchable: true,
    },
    GroupDef {
        name: "detail",
        attributes: &[
            "published",
            "updated",
            "duration",
            "description",
            "views",
            "rating",
            "stream_urls",
            "captions",
            "related_videos",
        ],
        tier: Tier::Volatile,
        ttl: CacheTtl::STREAMS,
        fetchable: true,
    },
    GroupDef {
        name: "listing",
        attributes: &["timestamp_human", "badges"],
        tier: Tier::Volatile,
        ttl: CacheTtl::LISTING,
        fetchable: false,
    },
];

fn video_defaults() -> AttrMap {
    let defaults = json!({
        "title": InvalidDefaults::VIDEO_TITLE,
        "thumbnail": "",
        "channel_name": "",
        "channel_url": "",
        "cid": "",
        "published": InvalidDefaults::JOINED,
        "updated": null,
        "duration": 0,
        "description": "",
        "views": 0,
        "rating": null,
        "stream_urls": [],
        "captions": [],
        "related_videos": [],
        "timestamp_human": "",
        "badges": [],
    });
    match defaults {
        Value::Object(fields) => fields.into_iter().collect(),
        _ => AttrMap::new(),
    }
}

pub static VIDEO_SCHEMA: Schema = Schema {
    kind: "video",
    groups: VIDEO_GROUPS,
    mapped: &[("thumbnail", MAP_IMAGE_URL), ("stream_urls", MAP_STREAM_URL)],
    invalid_defaults: video_defaults,
};

/// A video, addressed by its id.
pub struct Video {
    core: GroupCore,
    services: Arc<Services>,
    backing: BackingLink,
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Video {}>", self.id())
    }
}

impl Video {
    /// A standalone instance, registered nowhere and bound to no store.
    pub fn new(services: Arc<Services>, id: impl Into<String>) -> Self {
        Self::with_unit(services, id, None)
    }

    pub(crate) fn with_unit(
        services: Arc<Services>,
        id: impl Into<String>,
        unit: Option<Arc<UnitOfWork>>,
    ) -> Self {
        let id = id.into();
        Self {
            core: GroupCore::new(&VIDEO_SCHEMA, id.clone(), services.context.clone()),
            backing: BackingLink::new(RecordKind::Video, id, unit),
            services,
        }
    }

    pub fn id(&self) -> &str {
        self.core.key()
    }

    pub fn url(&self) -> String {
        format!("{}/watch?v={}", crate::config::NetworkConfig::BASE_URL, self.id())
    }

    pub fn title(&self) -> String {
        self.value("title")
    }

    pub fn thumbnail(&self) -> String {
        self.value("thumbnail")
    }

    pub fn channel_name(&self) -> String {
        self.value("channel_name")
    }

    pub fn channel_url(&self) -> String {
        self.value("channel_url")
    }

    /// Id of the uploading channel.
    pub fn cid(&self) -> String {
        self.value("cid")
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.value("published")
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.value("updated")
    }

    /// Length in seconds.
    pub fn duration(&self) -> u64 {
        self.value("duration")
    }

    pub fn description(&self) -> String {
        self.value("description")
    }

    pub fn views(&self) -> u64 {
        self.value("views")
    }

    /// Likes as a percentage of ratings.
    pub fn rating(&self) -> Option<u8> {
        self.value("rating")
    }

    pub fn stream_urls(&self) -> Vec<StreamSource> {
        self.value("stream_urls")
    }

    pub fn captions(&self) -> Vec<CaptionTrack> {
        self.value("captions")
    }

    pub fn related_videos(&self) -> Vec<RelatedVideo> {
        self.value("related_videos")
    }

    /// Relative publish time as shown in a listing.
    pub fn timestamp_human(&self) -> String {
        self.value("timestamp_human")
    }

    pub fn badges(&self) -> Vec<String> {
        self.value("badges")
    }

    /// "3 days ago", from the listing text when there is one.
    pub fn time_since_published(&self, now: DateTime<Utc>) -> String {
        let listed = self.timestamp_human();
        if !listed.is_empty() {
            return listed;
        }
        match self.published() {
            Some(published) => humanize::time_ago(published, now),
            None => String::new(),
        }
    }

    pub fn views_human(&self) -> String {
        humanize::compact_count(self.views())
    }

    pub fn duration_human(&self) -> String {
        humanize::format_duration(self.duration())
    }

    /// Last duration reported by a player, from the backing record.
    pub fn watched_duration(&self) -> Result<i64> {
        Ok(self.backing.get(RecordField::Duration)?.as_i64().unwrap_or_default())
    }

    pub fn set_watched_duration(&self, seconds: i64) -> Result<()> {
        self.backing.set(RecordField::Duration, Value::from(seconds))
    }

    /// Seed attributes from a feed entry without overriding anything
    /// already known.
    pub fn absorb_feed_entry(&self, entry: &FeedEntry) -> Result<()> {
        self.store_if_absent("title", &entry.title)?;
        self.store_if_absent("thumbnail", &entry.thumbnail)?;
        self.store_if_absent("channel_name", &entry.channel_name)?;
        self.store_if_absent("channel_url", &entry.channel_url)?;
        if !entry.cid.is_empty() {
            self.store_if_absent("cid", &entry.cid)?;
        }
        self.store_if_absent("published", entry.published)?;
        self.store_if_absent("updated", entry.updated)?;
        self.store_if_absent("description", &entry.description)?;
        self.store_if_absent("views", entry.views)?;
        self.store_if_absent("rating", entry.rating)?;
        Ok(())
    }
}

impl LazyGrouped for Video {
    fn core(&self) -> &GroupCore {
        &self.core
    }

    fn load_group(&self, group: &GroupDef) -> Result<AttrMap> {
        let sources = &self.services.sources;
        match group.name {
            "summary" => to_attrs(&sources.videos.summary(self.id())?),
            "channel_id" => {
                let channel_url = self.channel_url();
                if self.is_invalid() || channel_url.is_empty() {
                    return Err(YotterError::not_found("channel of video", self.id()));
                }
                let cid = sources.channels.resolve_id(&channel_url)?;
                Ok(AttrMap::from([("cid".to_string(), Value::String(cid))]))
            }
            "detail" => to_attrs(&sources.videos.details(self.id())?),
            other => Err(YotterError::upstream(format!("video group '{}' has no loader", other))),
        }
    }
}

//! Data returned by upstream sources.
//!
//! Field names match entity attribute names so a response converts straight
//! into a group's attribute map.

use crate::cache::AttrMap;
use crate::error::{Result, YotterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Embed lookup of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub title: String,
    pub thumbnail: String,
    pub channel_name: String,
    pub channel_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSource {
    pub url: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub url: String,
    pub language: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedVideo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub channel_name: String,
}

/// Full watch-page extraction of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub published: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: u64,
    pub description: String,
    pub views: u64,
    /// 0-100.
    pub rating: Option<u8>,
    pub stream_urls: Vec<StreamSource>,
    pub captions: Vec<CaptionTrack>,
    pub related_videos: Vec<RelatedVideo>,
}

/// One entry of a syndication feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_name: String,
    pub channel_url: String,
    pub cid: String,
    pub published: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    pub description: String,
    pub views: u64,
    pub rating: Option<u8>,
}

/// A channel or playlist syndication feed, newest entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub title: String,
    pub author_name: String,
    pub author_url: String,
    /// Owning channel.
    pub channel_id: String,
    pub published: Option<DateTime<Utc>>,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelLink {
    pub title: String,
    pub url: String,
}

/// About-page extraction of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAbout {
    pub name: String,
    pub avatar: String,
    pub sub_count: Option<u64>,
    pub joined: Option<DateTime<Utc>>,
    pub description: String,
    pub view_count: Option<u64>,
    pub links: Vec<ChannelLink>,
}

/// Page extraction of a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDetails {
    pub description: String,
    pub num_videos: u64,
    /// Display string as shown upstream ("Updated 3 days ago").
    pub updated: String,
    pub views: u64,
}

/// One video of a paged listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    /// Display-only relative time ("2 weeks ago").
    pub time_published: String,
    pub views: Option<u64>,
    pub duration: Option<u64>,
    #[serde(default)]
    pub badges: Vec<String>,
}

/// One page of a channel's or playlist's videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoListPage {
    pub channel_name: String,
    pub channel_url: String,
    pub cid: String,
    pub items: Vec<ListItem>,
}

/// Serialize a response into an attribute map.
pub fn to_attrs<T: Serialize>(value: &T) -> Result<AttrMap> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields.into_iter().collect()),
        other => Err(YotterError::upstream(format!(
            "expected an object of attributes, got {}",
            other
        ))),
    }
}

//! Upstream sources: the loaders behind entity groups.
//!
//! Each trait method backs one group (or one listing call) and returns
//! exactly the data of that group. Implementations block; timeouts belong to
//! the transport.

pub mod feed;
pub mod http;
pub mod oembed;
pub mod page;
mod types;
mod web;

pub use types::{
    to_attrs, CaptionTrack, ChannelAbout, ChannelLink, Feed, FeedEntry, ListItem,
    PlaylistDetails, RelatedVideo, StreamSource, VideoDetails, VideoListPage, VideoSummary,
};
pub use web::WebSource;

use crate::error::Result;
use std::sync::Arc;

pub trait VideoSource: Send + Sync {
    /// Title, thumbnail and author from the embed endpoint.
    fn summary(&self, id: &str) -> Result<VideoSummary>;

    /// Full watch-page extraction.
    fn details(&self, id: &str) -> Result<VideoDetails>;
}

pub trait ChannelSource: Send + Sync {
    /// Channel id behind a channel URL (`/channel/..`, `/c/..`, `/user/..`).
    fn resolve_id(&self, url: &str) -> Result<String>;

    /// Syndication feed, newest first.
    fn feed(&self, cid: &str) -> Result<Feed>;

    fn about(&self, cid: &str) -> Result<ChannelAbout>;

    fn video_count(&self, cid: &str) -> Result<u64>;

    /// One page of the channel's uploads; `sort` is the upstream sort code.
    fn videos_page(&self, cid: &str, page: u32, sort: u32) -> Result<VideoListPage>;
}

pub trait PlaylistSource: Send + Sync {
    /// Syndication feed in playlist order.
    fn feed(&self, pid: &str) -> Result<Feed>;

    fn details(&self, pid: &str) -> Result<PlaylistDetails>;

    fn videos_page(&self, pid: &str, page: u32) -> Result<VideoListPage>;
}

/// The sources entities load from.
#[derive(Clone)]
pub struct Sources {
    pub videos: Arc<dyn VideoSource>,
    pub channels: Arc<dyn ChannelSource>,
    pub playlists: Arc<dyn PlaylistSource>,
}

impl Sources {
    /// One implementation serving every kind.
    pub fn from_one<S>(source: Arc<S>) -> Self
    where
        S: VideoSource + ChannelSource + PlaylistSource + 'static,
    {
        Self {
            videos: source.clone(),
            channels: source.clone(),
            playlists: source,
        }
    }

    /// The public web endpoints.
    pub fn web() -> Result<Self> {
        Ok(Self::from_one(Arc::new(WebSource::new()?)))
    }
}

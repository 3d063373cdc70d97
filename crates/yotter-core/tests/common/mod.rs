//! Shared fixtures: an in-process source with call counters.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use yotter_core::upstream::{
    ChannelAbout, ChannelSource, Feed, FeedEntry, PlaylistDetails, PlaylistSource, VideoDetails,
    VideoListPage, VideoSource, VideoSummary,
};
use yotter_core::{Result, Sources, Yotter, YotterError};

/// Canned upstream answers. Anything not registered answers "not found".
#[derive(Default)]
pub struct FakeSource {
    calls: Mutex<HashMap<String, usize>>,
    pub summaries: Mutex<HashMap<String, VideoSummary>>,
    pub details: Mutex<HashMap<String, VideoDetails>>,
    pub channel_ids: Mutex<HashMap<String, String>>,
    pub channel_feeds: Mutex<HashMap<String, Feed>>,
    pub abouts: Mutex<HashMap<String, ChannelAbout>>,
    pub video_counts: Mutex<HashMap<String, u64>>,
    pub playlist_feeds: Mutex<HashMap<String, Feed>>,
    pub playlist_details: Mutex<HashMap<String, PlaylistDetails>>,
    pub listings: Mutex<HashMap<String, VideoListPage>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: &str, key: &str) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(format!("{}:{}", call, key))
            .or_default() += 1;
    }

    /// Times `call` ran for `key`.
    pub fn calls(&self, call: &str, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("{}:{}", call, key))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn add_summary(&self, id: &str, title: &str, thumbnail: &str) {
        self.summaries.lock().unwrap().insert(
            id.to_string(),
            VideoSummary {
                title: title.to_string(),
                thumbnail: thumbnail.to_string(),
                channel_name: "Some Channel".to_string(),
                channel_url: "https://www.youtube.com/channel/UCchan".to_string(),
            },
        );
    }

    pub fn add_channel_feed(&self, cid: &str, feed: Feed) {
        self.channel_feeds.lock().unwrap().insert(cid.to_string(), feed);
    }

    pub fn add_playlist_feed(&self, pid: &str, feed: Feed) {
        self.playlist_feeds.lock().unwrap().insert(pid.to_string(), feed);
    }
}

fn lookup<T: Clone>(map: &Mutex<HashMap<String, T>>, kind: &str, key: &str) -> Result<T> {
    map.lock()
        .unwrap()
        .get(key)
        .cloned()
        .ok_or_else(|| YotterError::not_found(kind, key))
}

impl VideoSource for FakeSource {
    fn summary(&self, id: &str) -> Result<VideoSummary> {
        self.record("summary", id);
        lookup(&self.summaries, "video", id)
    }

    fn details(&self, id: &str) -> Result<VideoDetails> {
        self.record("details", id);
        lookup(&self.details, "video", id)
    }
}

impl ChannelSource for FakeSource {
    fn resolve_id(&self, url: &str) -> Result<String> {
        self.record("resolve_id", url);
        lookup(&self.channel_ids, "channel", url)
    }

    fn feed(&self, cid: &str) -> Result<Feed> {
        self.record("channel_feed", cid);
        lookup(&self.channel_feeds, "channel", cid)
    }

    fn about(&self, cid: &str) -> Result<ChannelAbout> {
        self.record("about", cid);
        lookup(&self.abouts, "channel", cid)
    }

    fn video_count(&self, cid: &str) -> Result<u64> {
        self.record("video_count", cid);
        lookup(&self.video_counts, "channel", cid)
    }

    fn videos_page(&self, cid: &str, page: u32, _sort: u32) -> Result<VideoListPage> {
        self.record("channel_page", cid);
        lookup(&self.listings, "channel", &format!("{}/{}", cid, page))
    }
}

impl PlaylistSource for FakeSource {
    fn feed(&self, pid: &str) -> Result<Feed> {
        self.record("playlist_feed", pid);
        lookup(&self.playlist_feeds, "playlist", pid)
    }

    fn details(&self, pid: &str) -> Result<PlaylistDetails> {
        self.record("playlist_details", pid);
        lookup(&self.playlist_details, "playlist", pid)
    }

    fn videos_page(&self, pid: &str, page: u32) -> Result<VideoListPage> {
        self.record("playlist_page", pid);
        lookup(&self.listings, "playlist", &format!("{}/{}", pid, page))
    }
}

pub fn entry(video_id: &str, cid: &str, published: DateTime<Utc>) -> FeedEntry {
    FeedEntry {
        video_id: video_id.to_string(),
        title: format!("Video {}", video_id),
        thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id),
        channel_name: "Some Channel".to_string(),
        channel_url: format!("https://www.youtube.com/channel/{}", cid),
        cid: cid.to_string(),
        published,
        updated: None,
        description: String::new(),
        views: 10,
        rating: Some(90),
    }
}

/// A feed with one entry per age in days, newest first as given.
pub fn feed_with_ages(cid: &str, now: DateTime<Utc>, ages_in_days: &[i64]) -> Feed {
    Feed {
        title: format!("Feed of {}", cid),
        author_name: "Some Channel".to_string(),
        author_url: format!("https://www.youtube.com/channel/{}", cid),
        channel_id: cid.to_string(),
        published: Some(now - Duration::days(3_650)),
        entries: ages_in_days
            .iter()
            .enumerate()
            .map(|(i, age)| entry(&format!("{}-v{}", cid, i), cid, now - Duration::days(*age)))
            .collect(),
    }
}

/// An in-memory instance over `source`.
pub fn yotter(source: &Arc<FakeSource>) -> Yotter {
    Yotter::builder()
        .in_memory(true)
        .sources(Sources::from_one(source.clone()))
        .build()
        .expect("in-memory instance")
}

//! Video, channel and playlist entities.

mod channel;
mod playlist;
mod video;

pub use channel::{Channel, CHANNEL_SCHEMA};
pub use playlist::{Playlist, PLAYLIST_SCHEMA};
pub use video::{Video, VIDEO_SCHEMA};

use crate::entity::{EntityContext, LazyGrouped};
use crate::upstream::Sources;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What every entity instance reads through.
pub struct Services {
    pub context: Arc<EntityContext>,
    pub sources: Sources,
}

impl Services {
    pub fn new(context: Arc<EntityContext>, sources: Sources) -> Self {
        Self { context, sources }
    }
}

/// Leading run of `videos` published within `max_days` of `now`, at most
/// `max_n` long.
///
/// Scanning stops at the first video that is too old, so the input must be
/// newest first. Upstream feeds are assumed to be; an unsorted feed is
/// silently cut short.
pub fn recent_prefix(
    videos: Vec<Arc<Video>>,
    now: DateTime<Utc>,
    max_n: usize,
    max_days: i64,
) -> Vec<Arc<Video>> {
    let mut recent = Vec::new();
    for video in videos {
        if recent.len() >= max_n {
            break;
        }
        let too_old = match video.published() {
            Some(published) => (now - published).num_days() > max_days,
            None => video.is_invalid(),
        };
        if too_old {
            break;
        }
        recent.push(video);
    }
    recent
}

/// Pages needed to list `num_videos` at the upstream page size.
pub fn page_count(num_videos: u64) -> u64 {
    num_videos.div_ceil(crate::config::NetworkConfig::VIDEOS_PER_PAGE)
}

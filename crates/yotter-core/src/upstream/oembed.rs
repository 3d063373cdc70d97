//! oEmbed lookups: the cheap source of a video's title, thumbnail and author.

use super::types::VideoSummary;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OEmbedResponse {
    pub title: String,
    pub thumbnail_url: String,
    pub author_name: String,
    pub author_url: String,
}

impl From<OEmbedResponse> for VideoSummary {
    fn from(info: OEmbedResponse) -> Self {
        Self {
            title: info.title,
            thumbnail: info.thumbnail_url,
            channel_name: info.author_name,
            channel_url: info.author_url,
        }
    }
}

/// Embed endpoint URL for a video id.
pub fn oembed_url(base_url: &str, video_id: &str) -> String {
    let target = format!("http://youtu.be/{}", video_id);
    format!(
        "{}/oembed?format=json&url={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&target)
    )
}

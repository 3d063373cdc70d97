//! Sources backed by the platform's public web endpoints.

use super::http::HttpClient;
use super::oembed::{oembed_url, OEmbedResponse};
use super::types::{
    ChannelAbout, Feed, PlaylistDetails, VideoDetails, VideoListPage, VideoSummary,
};
use super::{feed, page, ChannelSource, PlaylistSource, VideoSource};
use crate::config::NetworkConfig;
use crate::error::{Result, YotterError};
use tracing::debug;

/// oEmbed, Atom feeds and meta-tag extraction over plain HTTP.
///
/// Paged video listings need the platform's internal browse API and are not
/// available here.
pub struct WebSource {
    http: HttpClient,
    base_url: String,
}

impl WebSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(NetworkConfig::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    fn unsupported(what: &str) -> YotterError {
        YotterError::upstream(format!("{} is not available from the public web endpoints", what))
    }
}

impl VideoSource for WebSource {
    fn summary(&self, id: &str) -> Result<VideoSummary> {
        let info: OEmbedResponse = self
            .http
            .get_json(&oembed_url(&self.base_url, id), "video", id)?;
        Ok(info.into())
    }

    fn details(&self, id: &str) -> Result<VideoDetails> {
        let url = format!("{}/watch?v={}", self.base_url, urlencoding::encode(id));
        let html = self.http.get_text(&url, "video", id)?;
        page::extract_video_details(&html, id)
    }
}

impl ChannelSource for WebSource {
    fn resolve_id(&self, url: &str) -> Result<String> {
        let url = self.absolute(url);
        if let Some(cid) = page::extract_channel_id(&url) {
            return Ok(cid);
        }
        debug!("Resolving channel id of {}", url);
        let html = self.http.get_text(&url, "channel", &url)?;
        page::extract_channel_id(&html).ok_or_else(|| YotterError::not_found("channel", url))
    }

    fn feed(&self, cid: &str) -> Result<Feed> {
        let xml = self
            .http
            .get_text(&feed::channel_feed_url(&self.base_url, cid), "channel", cid)?;
        feed::parse_feed(&xml)
    }

    fn about(&self, cid: &str) -> Result<ChannelAbout> {
        let url = format!("{}/channel/{}/about", self.base_url, cid);
        let html = self.http.get_text(&url, "channel", cid)?;
        page::extract_channel_about(&html, cid)
    }

    fn video_count(&self, cid: &str) -> Result<u64> {
        let url = format!("{}/channel/{}/videos", self.base_url, cid);
        let html = self.http.get_text(&url, "channel", cid)?;
        page::extract_video_count(&html, cid)
    }

    fn videos_page(&self, _cid: &str, _page: u32, _sort: u32) -> Result<VideoListPage> {
        Err(Self::unsupported("paged channel listing"))
    }
}

impl PlaylistSource for WebSource {
    fn feed(&self, pid: &str) -> Result<Feed> {
        let xml = self
            .http
            .get_text(&feed::playlist_feed_url(&self.base_url, pid), "playlist", pid)?;
        feed::parse_feed(&xml)
    }

    fn details(&self, pid: &str) -> Result<PlaylistDetails> {
        let url = format!("{}/playlist?list={}", self.base_url, urlencoding::encode(pid));
        let html = self.http.get_text(&url, "playlist", pid)?;
        page::extract_playlist_details(&html, pid)
    }

    fn videos_page(&self, _pid: &str, _page: u32) -> Result<VideoListPage> {
        Err(Self::unsupported("paged playlist listing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_id_from_url_needs_no_request() {
        let source = WebSource::with_base_url("http://127.0.0.1:9").unwrap();
        assert_eq!(
            source.resolve_id("/channel/UCabcdefghijklmnopqrstuv").unwrap(),
            "UCabcdefghijklmnopqrstuv"
        );
    }

    #[test]
    fn test_paged_listings_are_unsupported() {
        let source = WebSource::with_base_url("http://127.0.0.1:9").unwrap();
        let err = ChannelSource::videos_page(&source, "UC1", 1, 3).unwrap_err();
        assert!(err.is_upstream_failure());
    }
}

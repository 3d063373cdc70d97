//! Best-effort extraction from public HTML pages.
//!
//! Only metadata exposed as `<meta>` tags and a few stable JSON snippets is
//! read. Anything that needs the player's signature logic (stream URLs,
//! captions) is out of reach and comes back empty.

use super::types::{ChannelAbout, PlaylistDetails, VideoDetails};
use crate::error::{Result, YotterError};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

static META_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+(?:property|itemprop|name)="([^"]+)"\s+content="([^"]*)""#)
        .expect("meta tag regex must compile")
});

static CHANNEL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"channelId":"|"externalId":"|/channel/)(UC[\w-]{22})"#)
        .expect("channel id regex must compile")
});

/// Content of the first `<meta>` tag with the given property/itemprop/name.
pub fn meta(html: &str, name: &str) -> Option<String> {
    META_TAG
        .captures_iter(html)
        .find(|caps| &caps[1] == name)
        .map(|caps| unescape(&caps[2]))
}

/// First number following `"<key>":{"runs":[{"text":"` or `"<key>":{"simpleText":"`.
fn json_count(html: &str, key: &str) -> Option<u64> {
    let pattern = format!(
        r#""{}":\{{"(?:runs":\[\{{"text|simpleText)":"([\d.,]+)"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(html).and_then(|caps| parse_count(&caps[1]))
}

/// Parse "1,234" / "1.234" style counts.
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse an ISO 8601 duration such as `PT1H2M3S` into seconds.
pub fn parse_iso_duration(text: &str) -> Option<u64> {
    let rest = text.strip_prefix("PT").or_else(|| text.strip_prefix("P0DT"))?;
    let mut total = 0u64;
    let mut number = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value: u64 = number.parse().ok()?;
        number.clear();
        total += match c {
            'H' => value * 3_600,
            'M' => value * 60,
            'S' => value,
            _ => return None,
        };
    }
    number.is_empty().then_some(total)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Decode the XML/HTML entities upstream pages use.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((c, end + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Channel id embedded in a channel page (or in its URL).
pub fn extract_channel_id(html: &str) -> Option<String> {
    meta(html, "channelId")
        .filter(|id| id.starts_with("UC"))
        .or_else(|| CHANNEL_ID.captures(html).map(|caps| caps[1].to_string()))
}

fn require_page(html: &str, kind: &str, key: &str) -> Result<String> {
    meta(html, "og:title").ok_or_else(|| YotterError::not_found(kind, key))
}

pub fn extract_video_details(html: &str, id: &str) -> Result<VideoDetails> {
    require_page(html, "video", id)?;
    let published = meta(html, "datePublished")
        .or_else(|| meta(html, "uploadDate"))
        .and_then(|d| parse_date(&d))
        .ok_or_else(|| YotterError::upstream(format!("no publish date on watch page of {}", id)))?;

    Ok(VideoDetails {
        published,
        updated: meta(html, "uploadDate").and_then(|d| parse_date(&d)),
        duration: meta(html, "duration")
            .and_then(|d| parse_iso_duration(&d))
            .unwrap_or(0),
        description: meta(html, "og:description")
            .or_else(|| meta(html, "description"))
            .unwrap_or_default(),
        views: meta(html, "interactionCount")
            .and_then(|v| parse_count(&v))
            .unwrap_or(0),
        rating: None,
        stream_urls: Vec::new(),
        captions: Vec::new(),
        related_videos: Vec::new(),
    })
}

pub fn extract_channel_about(html: &str, cid: &str) -> Result<ChannelAbout> {
    let name = require_page(html, "channel", cid)?;
    Ok(ChannelAbout {
        name,
        avatar: meta(html, "og:image").unwrap_or_default(),
        sub_count: json_count(html, "subscriberCountText"),
        joined: None,
        description: meta(html, "og:description").unwrap_or_default(),
        view_count: json_count(html, "viewCountText"),
        links: Vec::new(),
    })
}

pub fn extract_video_count(html: &str, cid: &str) -> Result<u64> {
    require_page(html, "channel", cid)?;
    json_count(html, "videosCountText")
        .ok_or_else(|| YotterError::upstream(format!("no video count on page of channel {}", cid)))
}

pub fn extract_playlist_details(html: &str, pid: &str) -> Result<PlaylistDetails> {
    require_page(html, "playlist", pid)?;
    Ok(PlaylistDetails {
        description: meta(html, "og:description").unwrap_or_default(),
        num_videos: json_count(html, "numVideosText").unwrap_or(0),
        updated: String::new(),
        views: json_count(html, "viewCountText").unwrap_or(0),
    })
}

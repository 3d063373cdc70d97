//! Atom syndication feeds of channels and playlists.

use super::page::{parse_date, unescape};
use super::types::{Feed, FeedEntry};
use crate::error::{Result, YotterError};
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<entry>(.*?)</entry>").expect("feed entry regex must compile")
});

static AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>\s*<uri>(.*?)</uri>")
        .expect("feed author regex must compile")
});

static THUMBNAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<media:thumbnail\b[^>]*?\surl="([^"]*)""#).expect("thumbnail regex must compile")
});

static VIEWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<media:statistics\b[^>]*?\sviews="(\d+)""#).expect("views regex must compile")
});

static STAR_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<media:starRating[^>]*\saverage="([\d.]+)"[^>]*\smax="([\d.]+)""#)
        .expect("star rating regex must compile")
});

/// Text content of the first `<tag>` in `xml`. CDATA sections are taken
/// verbatim.
fn element(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let text = xml[start..end].trim();
    match text
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        Some(raw) => Some(raw.to_string()),
        None => Some(unescape(text)),
    }
}

fn rating(xml: &str) -> Option<u8> {
    let caps = STAR_RATING.captures(xml)?;
    let average: f64 = caps[1].parse().ok()?;
    let max: f64 = caps[2].parse().ok()?;
    (max > 0.0).then(|| (average / max * 100.0) as u8)
}

/// Channel feed URL.
pub fn channel_feed_url(base_url: &str, cid: &str) -> String {
    format!(
        "{}/feeds/videos.xml?channel_id={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(cid)
    )
}

/// Playlist feed URL.
pub fn playlist_feed_url(base_url: &str, pid: &str) -> String {
    format!(
        "{}/feeds/videos.xml?playlist_id={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(pid)
    )
}

/// Parse a feed document. Entries keep upstream order.
///
/// Entries without a parseable publish time are stamped with the current
/// time, like the feed itself.
///
/// This is a pattern scan of the document YouTube serves, not an XML parser.
/// Text elements are found by their bare `<tag>` opening, so one carrying
/// attributes is missed. A CDATA section is only recognized when it is the
/// whole element body. Entities are decoded by `unescape`, which knows the
/// predefined XML entities and numeric references only.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    if !xml.contains("<feed") {
        return Err(YotterError::upstream("response is not an Atom feed"));
    }

    let now = Utc::now();
    let header = match xml.find("<entry>") {
        Some(pos) => &xml[..pos],
        None => xml,
    };
    let (author_name, author_url) = AUTHOR
        .captures(header)
        .map(|caps| (unescape(caps[1].trim()), unescape(caps[2].trim())))
        .unwrap_or_default();

    let mut entries = Vec::new();
    for caps in ENTRY.captures_iter(xml) {
        let body = &caps[1];
        let Some(video_id) = element(body, "yt:videoId") else {
            continue;
        };
        let (channel_name, channel_url) = AUTHOR
            .captures(body)
            .map(|a| (unescape(a[1].trim()), unescape(a[2].trim())))
            .unwrap_or_else(|| (author_name.clone(), author_url.clone()));

        entries.push(FeedEntry {
            video_id,
            title: element(body, "title").unwrap_or_default(),
            thumbnail: THUMBNAIL
                .captures(body)
                .map(|t| unescape(&t[1]))
                .unwrap_or_default(),
            channel_name,
            channel_url,
            cid: element(body, "yt:channelId").unwrap_or_default(),
            published: element(body, "published")
                .and_then(|d| parse_date(&d))
                .unwrap_or(now),
            updated: element(body, "updated").and_then(|d| parse_date(&d)),
            description: element(body, "media:description").unwrap_or_default(),
            views: VIEWS
                .captures(body)
                .and_then(|v| v[1].parse().ok())
                .unwrap_or(0),
            rating: rating(body),
        });
    }

    Ok(Feed {
        title: element(header, "title").unwrap_or_default(),
        author_name,
        author_url,
        channel_id: element(header, "yt:channelId").unwrap_or_default(),
        published: element(header, "published").and_then(|d| parse_date(&d)),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <yt:channelId>UCabcdefghijklmnopqrstuv</yt:channelId>
 <title>Tom &amp; Co</title>
 <author>
  <name>Tom &amp; Co</name>
  <uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri>
 </author>
 <published>2012-05-01T10:00:00+00:00</published>
 <entry>
  <yt:videoId>vid2</yt:videoId>
  <yt:channelId>UCabcdefghijklmnopqrstuv</yt:channelId>
  <title>Second</title>
  <author>
   <name>Tom &amp; Co</name>
   <uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri>
  </author>
  <published>2024-02-02T12:00:00+00:00</published>
  <updated>2024-02-03T12:00:00+00:00</updated>
  <media:group>
   <media:thumbnail url="https://i.ytimg.com/vi/vid2/hqdefault.jpg" width="480" height="360"/>
   <media:description>Part two</media:description>
   <media:community>
    <media:starRating count="10" average="4.50" min="1" max="5"/>
    <media:statistics views="1500"/>
   </media:community>
  </media:group>
 </entry>
 <entry>
  <yt:videoId>vid1</yt:videoId>
  <yt:channelId>UCabcdefghijklmnopqrstuv</yt:channelId>
  <title>First</title>
  <published>2024-01-01T12:00:00+00:00</published>
 </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let feed = parse_feed(FEED).unwrap();
        assert_eq!(feed.title, "Tom & Co");
        assert_eq!(feed.author_name, "Tom & Co");
        assert_eq!(feed.channel_id, "UCabcdefghijklmnopqrstuv");
        assert!(feed.published.is_some());
        assert_eq!(feed.entries.len(), 2);

        let second = &feed.entries[0];
        assert_eq!(second.video_id, "vid2");
        assert_eq!(second.thumbnail, "https://i.ytimg.com/vi/vid2/hqdefault.jpg");
        assert_eq!(second.description, "Part two");
        assert_eq!(second.views, 1500);
        assert_eq!(second.rating, Some(90));
        assert!(second.updated.is_some());

        let first = &feed.entries[1];
        assert_eq!(first.channel_name, "Tom & Co");
        assert_eq!(first.views, 0);
        assert_eq!(first.rating, None);
    }

    #[test]
    fn test_cdata_and_reordered_attributes() {
        let xml = r#"<feed>
 <entry>
  <yt:videoId>vid3</yt:videoId>
  <title><![CDATA[Rock & Roll <live>]]></title>
  <media:thumbnail width="480" url="https://i.ytimg.com/vi/vid3/hqdefault.jpg" height="360"/>
  <media:statistics favorites="0" views="42"/>
 </entry>
</feed>"#;
        let feed = parse_feed(xml).unwrap();
        let entry = &feed.entries[0];
        assert_eq!(entry.title, "Rock & Roll <live>");
        assert_eq!(entry.thumbnail, "https://i.ytimg.com/vi/vid3/hqdefault.jpg");
        assert_eq!(entry.views, 42);
    }

    #[test]
    fn test_not_a_feed() {
        assert!(parse_feed("<html>nope</html>").is_err());
    }

    #[test]
    fn test_feed_urls() {
        assert_eq!(
            channel_feed_url("https://www.youtube.com/", "UC1"),
            "https://www.youtube.com/feeds/videos.xml?channel_id=UC1"
        );
        assert_eq!(
            playlist_feed_url("https://www.youtube.com", "PL1"),
            "https://www.youtube.com/feeds/videos.xml?playlist_id=PL1"
        );
    }
}

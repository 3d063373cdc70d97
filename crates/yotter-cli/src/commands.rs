//! Command implementations. Each returns the JSON document to print.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;
use yotter_core::{
    LazyGrouped, ModerationList, ModerationLists, RecordKind, Video, Yotter,
};

fn video_row(video: &Video) -> Value {
    json!({
        "id": video.id(),
        "title": video.title(),
        "thumbnail": video.thumbnail(),
        "channel_name": video.channel_name(),
        "published": video.published(),
        "time_since_published": video.time_since_published(Utc::now()),
    })
}

pub fn video(yotter: &Yotter, id: &str, details: bool) -> Value {
    let video = yotter.scope().video(id);
    let mut out = json!({
        "id": video.id(),
        "url": video.url(),
        "title": video.title(),
        "thumbnail": video.thumbnail(),
        "channel_name": video.channel_name(),
        "channel_url": video.channel_url(),
        "cid": video.cid(),
    });
    if details {
        out["published"] = json!(video.published());
        out["duration"] = json!(video.duration_human());
        out["views"] = json!(video.views_human());
        out["rating"] = json!(video.rating());
        out["description"] = json!(video.description());
        out["stream_urls"] = json!(video.stream_urls());
        out["captions"] = json!(video.captions());
        out["related_videos"] = json!(video.related_videos());
    }
    out["invalid"] = json!(video.invalid_reason());
    out
}

pub fn channel(yotter: &Yotter, channel: &str, max_n: usize, max_days: i64) -> Value {
    let scope = yotter.scope();
    let channel = if channel.starts_with('/') {
        scope.channel_for_urlpath(channel)
    } else {
        scope.channel(channel)
    };
    let recent: Vec<Value> = channel
        .get_recent_videos(scope, max_n, max_days)
        .iter()
        .map(|video| video_row(video))
        .collect();
    json!({
        "cid": channel.cid(),
        "url": channel.url(),
        "name": channel.name(),
        "avatar": channel.avatar(),
        "subscribers": channel.sub_count_human(),
        "joined": channel.joined(),
        "description": channel.description(),
        "links": channel.links(),
        "num_videos": channel.num_videos(),
        "recent_videos": recent,
        "invalid": channel.invalid_reason(),
    })
}

pub fn playlist(yotter: &Yotter, id: &str, max_n: usize) -> Value {
    let scope = yotter.scope();
    let playlist = scope.playlist(id);
    let videos: Vec<Value> = playlist
        .recent_videos(scope)
        .iter()
        .take(max_n)
        .map(|video| video_row(video))
        .collect();
    json!({
        "pid": playlist.pid(),
        "url": playlist.url(),
        "title": playlist.title(),
        "thumbnail": playlist.thumbnail(),
        "cid": playlist.cid(),
        "channel_name": playlist.channel_name(),
        "videos": videos,
        "invalid": playlist.invalid_reason(),
    })
}

pub fn recent(
    yotter: &Yotter,
    channels: &[String],
    playlists: &[String],
    max_days: i64,
    limit: usize,
) -> Value {
    let videos = yotter.recent_videos(yotter.scope(), channels, playlists, usize::MAX, max_days);
    Value::Array(videos.iter().take(limit).map(|video| video_row(video)).collect())
}

pub fn purge_cache(yotter: &Yotter) -> Result<Value> {
    yotter.purge_cache()?;
    Ok(json!({ "purged": true }))
}

pub fn cache_stats(yotter: &Yotter, maintain: bool) -> Result<Value> {
    let removed = if maintain { yotter.maintain_cache()? } else { 0 };
    let mut out = serde_json::to_value(yotter.cache_stats())?;
    out["removed"] = json!(removed);
    Ok(out)
}

pub fn moderate(
    yotter: &Yotter,
    kind: RecordKind,
    id: &str,
    list: ModerationList,
    add: bool,
) -> Result<Value> {
    let outcome = yotter.moderate(kind, id, list, add)?;
    info!("{} {} on {:?} list: {:?}", kind, id, list, outcome);
    Ok(json!({
        "kind": kind.to_string(),
        "id": id,
        "list": format!("{:?}", list).to_lowercase(),
        "added": add,
        "outcome": format!("{:?}", outcome).to_lowercase(),
    }))
}

pub fn export_lists(yotter: &Yotter, path: &Path) -> Result<Value> {
    let lists = yotter.export_lists()?;
    lists
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(json!({
        "path": path.display().to_string(),
        "blocked_channels": lists.blocked_channel_ids.len(),
        "allowed_channels": lists.allowed_channel_ids.len(),
        "allowed_playlists": lists.allowed_playlist_ids.len(),
    }))
}

pub fn import_lists(yotter: &Yotter, path: &Path) -> Result<Value> {
    let lists =
        ModerationLists::load(path).with_context(|| format!("reading {}", path.display()))?;
    let summary = yotter.import_lists(&lists)?;
    Ok(json!({
        "path": path.display().to_string(),
        "blocked_channels": summary.blocked_channels,
        "allowed_channels": summary.allowed_channels,
        "allowed_playlists": summary.allowed_playlists,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use yotter_core::upstream::WebSource;
    use yotter_core::Sources;

    fn offline() -> Yotter {
        // Nothing listens on the discard port, so every load fails fast.
        let source = std::sync::Arc::new(WebSource::with_base_url("http://127.0.0.1:9").unwrap());
        Yotter::builder()
            .in_memory(true)
            .sources(Sources::from_one(source))
            .build()
            .unwrap()
    }

    #[test]
    fn test_unreachable_video_reports_invalid() {
        let out = video(&offline(), "v1", false);
        assert_eq!(out["id"], "v1");
        assert!(out["invalid"].is_string());
    }

    #[test]
    fn test_moderation_export_import() {
        let yotter = offline();
        let out = moderate(&yotter, RecordKind::Channel, "UC1", ModerationList::Blocked, true).unwrap();
        assert_eq!(out["outcome"], "changed");

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lists.json");
        let exported = export_lists(&yotter, &path).unwrap();
        assert_eq!(exported["blocked_channels"], 1);

        let imported = import_lists(&offline(), &path).unwrap();
        assert_eq!(imported["blocked_channels"], 1);
    }
}

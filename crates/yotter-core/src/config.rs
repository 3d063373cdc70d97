//! Centralized configuration for Yotter.
//!
//! Compile-time constants (cache lifetimes, network timeouts, directory names,
//! invalid-entity defaults) live in unit structs. Deployment settings live in
//! [`YotterConfig`], read from a JSON file and overridable through
//! `YOTTER_*` environment variables.

use crate::error::{Result, YotterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Yotter";
    pub const CONFIG_FILE_ENV: &'static str = "YOTTER_CONFIG_FILE";
    pub const ENV_PREFIX: &'static str = "YOTTER_";
}

/// Lifetimes of cached attribute groups.
pub struct CacheTtl;

impl CacheTtl {
    /// Embed lookups (title, thumbnail, author).
    pub const SUMMARY: Duration = Duration::from_secs(86_400);
    /// Video → channel id resolution, channel URL path → id resolution.
    pub const CHANNEL_ID: Duration = Duration::from_secs(86_400 * 7);
    /// Syndication feeds.
    pub const FEED: Duration = Duration::from_secs(3_600 * 2);
    /// Channel / playlist video counts.
    pub const VIDEO_COUNT: Duration = Duration::from_secs(60 * 30);
    /// Full page extractions of channels and playlists.
    pub const DETAIL: Duration = Duration::from_secs(86_400);
    /// Video page extraction; stream URLs are signed and go stale quickly.
    pub const STREAMS: Duration = Duration::from_secs(3_600);
    /// Display-only list data.
    pub const LISTING: Duration = Duration::from_secs(60);
    /// Negative cache for failed lookups.
    pub const NEGATIVE: Duration = Duration::from_secs(300);
    /// "Effectively infinite" lifetime used by group overrides.
    pub const OVERRIDE: Duration = Duration::from_secs(99_999_999);
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (Yotter)";
    pub const BASE_URL: &'static str = "https://www.youtube.com";
    pub const VIDEOS_PER_PAGE: u64 = 30;
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATA_DIR_NAME: &'static str = "yotter";
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const CACHE_DB_FILENAME: &'static str = "groups.sqlite";
    pub const STORE_DB_FILENAME: &'static str = "yotter.db";
    pub const CONFIG_FILENAME: &'static str = "yotter-config.json";
}

/// Sentinel values shown for entities that could not be fetched.
pub struct InvalidDefaults;

impl InvalidDefaults {
    pub const NOT_FOUND_KEY: &'static str = "NOTFOUND";
    pub const CHANNEL_NAME: &'static str = "--invalid channel id--";
    pub const CHANNEL_DESCRIPTION: &'static str = "--channel does not exist--";
    pub const VIDEO_TITLE: &'static str = "--invalid video id--";
    pub const PLAYLIST_TITLE: &'static str = "--invalid playlist id--";
    pub const JOINED: &'static str = "1970-01-01T00:00:00Z";
}

/// Deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct YotterConfig {
    /// Root of the durable cache and the backing store.
    pub data_dir: PathBuf,
    /// Rewrite image URLs to go through the proxy.
    pub proxy_images: bool,
    /// Rewrite stream URLs to go through the proxy.
    pub proxy_videos: bool,
    /// External proxy URL template; empty means the local proxy routes.
    pub external_proxy: String,
    /// Prefix for the local proxy routes (scheme and host when behind HTTPS).
    pub proxy_base: String,
    /// Entry bound of the volatile cache tier.
    pub volatile_capacity: u64,
    /// Size bound of the durable cache tier in bytes.
    pub durable_max_size_bytes: u64,
    /// Negative-cache lifetime in seconds.
    pub negative_ttl_secs: u64,
    /// Entry bound of the process-wide identity maps.
    pub identity_map_capacity: u64,
    /// Name reported in moderation list exports.
    pub server_name: String,
}

impl Default for YotterConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            proxy_images: true,
            proxy_videos: true,
            external_proxy: String::new(),
            proxy_base: String::new(),
            volatile_capacity: 10_000,
            durable_max_size_bytes: 1_073_741_824,
            negative_ttl_secs: CacheTtl::NEGATIVE.as_secs(),
            identity_map_capacity: 50_000,
            server_name: String::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(PathsConfig::DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("var"))
}

impl YotterConfig {
    /// Load from the file named by `YOTTER_CONFIG_FILE` (or the default file
    /// name in the working directory), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(AppConfig::CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(PathsConfig::CONFIG_FILENAME));
        Self::load_from(&path)
    }

    /// Load from an explicit file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => {
                debug!("Loaded configuration from {}", path.display());
                serde_json::from_str(&contents).map_err(|e| YotterError::Config {
                    message: format!("Invalid config file {}: {}", path.display(), e),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using default values",
                    path.display()
                );
                Self::default()
            }
            Err(e) => return Err(YotterError::io_with_path(e, path)),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `YOTTER_<FIELD>` overrides using the given variable lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |field: &str| lookup(&format!("{}{}", AppConfig::ENV_PREFIX, field));

        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("PROXY_IMAGES") {
            self.proxy_images = parse_env("PROXY_IMAGES", &v)?;
        }
        if let Some(v) = var("PROXY_VIDEOS") {
            self.proxy_videos = parse_env("PROXY_VIDEOS", &v)?;
        }
        if let Some(v) = var("EXTERNAL_PROXY") {
            self.external_proxy = v;
        }
        if let Some(v) = var("PROXY_BASE") {
            self.proxy_base = v;
        }
        if let Some(v) = var("VOLATILE_CAPACITY") {
            self.volatile_capacity = parse_env("VOLATILE_CAPACITY", &v)?;
        }
        if let Some(v) = var("DURABLE_MAX_SIZE_BYTES") {
            self.durable_max_size_bytes = parse_env("DURABLE_MAX_SIZE_BYTES", &v)?;
        }
        if let Some(v) = var("NEGATIVE_TTL_SECS") {
            self.negative_ttl_secs = parse_env("NEGATIVE_TTL_SECS", &v)?;
        }
        if let Some(v) = var("IDENTITY_MAP_CAPACITY") {
            self.identity_map_capacity = parse_env("IDENTITY_MAP_CAPACITY", &v)?;
        }
        if let Some(v) = var("SERVER_NAME") {
            self.server_name = v;
        }
        Ok(())
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir
            .join(PathsConfig::CACHE_DIR_NAME)
            .join(PathsConfig::CACHE_DB_FILENAME)
    }

    pub fn store_db_path(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::STORE_DB_FILENAME)
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| YotterError::Config {
        message: format!(
            "{}{} has an invalid value: {}",
            AppConfig::ENV_PREFIX,
            field,
            value
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_ttls_are_ordered() {
        assert!(CacheTtl::NEGATIVE < CacheTtl::FEED);
        assert!(CacheTtl::FEED < CacheTtl::SUMMARY);
        assert!(CacheTtl::CHANNEL_ID < CacheTtl::OVERRIDE);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = YotterConfig::load_from(&temp.path().join("absent.json")).unwrap();
        assert!(config.proxy_images);
        assert_eq!(config.negative_ttl(), CacheTtl::NEGATIVE);
    }

    #[test]
    fn test_file_values_merge_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"proxy_images": false, "server_name": "example"}"#).unwrap();

        let config = YotterConfig::load_from(&path).unwrap();
        assert!(!config.proxy_images);
        assert!(config.proxy_videos);
        assert_eq!(config.server_name, "example");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("YOTTER_PROXY_VIDEOS", "false"),
            ("YOTTER_NEGATIVE_TTL_SECS", "42"),
            ("YOTTER_DATA_DIR", "/tmp/yotter-test"),
        ]
        .into_iter()
        .collect();

        let mut config = YotterConfig::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert!(!config.proxy_videos);
        assert_eq!(config.negative_ttl(), Duration::from_secs(42));
        assert!(config.store_db_path().starts_with("/tmp/yotter-test"));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = YotterConfig::default();
        let result = config.apply_env(|name| {
            (name == "YOTTER_VOLATILE_CAPACITY").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(YotterError::Config { .. })));
    }
}

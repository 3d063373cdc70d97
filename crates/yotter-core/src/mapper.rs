//! Presentation mappers.
//!
//! A mapper is a pure `url -> url` transform registered under a name. Entity
//! schemas bind attribute names to mapper names; the framework applies the
//! mapper whenever such an attribute is read. Cached and materialized values
//! always stay raw, so swapping a mapper takes effect on the next read.

use crate::config::YotterConfig;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Mapper for thumbnails, avatars and other images.
pub const MAP_IMAGE_URL: &str = "map_image_url";
/// Mapper for playback and caption sources.
pub const MAP_STREAM_URL: &str = "map_stream_url";

/// A registered transform.
pub type MapperFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named mapper registry. Unknown names map to the identity.
#[derive(Default)]
pub struct PropMappers {
    mappers: RwLock<HashMap<String, MapperFn>>,
}

impl PropMappers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a mapper.
    pub fn register<F>(&self, name: &str, mapper: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        debug!("Registering presentation mapper '{}'", name);
        self.mappers.write().insert(name.to_string(), Arc::new(mapper));
    }

    /// Drop a mapper, reverting its attributes to raw values.
    pub fn unregister(&self, name: &str) {
        self.mappers.write().remove(name);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.mappers.read().contains_key(name)
    }

    /// Apply the named mapper to a raw value.
    ///
    /// Strings are mapped directly, arrays element-wise, and objects through
    /// their `url` member (stream and caption source entries).
    pub fn apply(&self, name: &str, value: &Value) -> Value {
        let mapper = match self.mappers.read().get(name) {
            Some(mapper) => mapper.clone(),
            None => return value.clone(),
        };
        map_value(mapper.as_ref(), value)
    }

    /// Mappers for a deployment, following its proxy settings.
    pub fn from_config(config: &YotterConfig) -> Self {
        let mappers = Self::new();

        if !config.external_proxy.is_empty() {
            let template = config.external_proxy.clone();
            if config.proxy_images {
                let template = template.clone();
                mappers.register(MAP_IMAGE_URL, move |url| {
                    external_proxy_url(&template, &fix_thumbnail_hq(url))
                });
            } else {
                mappers.register(MAP_IMAGE_URL, fix_thumbnail_hq);
            }
            if config.proxy_videos {
                mappers.register(MAP_STREAM_URL, move |url| external_proxy_url(&template, url));
            }
        } else {
            let base = config.proxy_base.trim_end_matches('/').to_string();
            if config.proxy_images {
                let base = base.clone();
                mappers.register(MAP_IMAGE_URL, move |url| {
                    format!("{}/ytimg/{}", base, fix_thumbnail_hq(url))
                });
            } else {
                mappers.register(MAP_IMAGE_URL, fix_thumbnail_hq);
            }
            if config.proxy_videos {
                mappers.register(MAP_STREAM_URL, move |url| format!("{}/stream/{}", base, url));
            }
        }

        mappers
    }
}

fn map_value(mapper: &(dyn Fn(&str) -> String + Send + Sync), value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => Value::String(mapper(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_value(mapper, v)).collect()),
        Value::Object(fields) => {
            let mut fields = fields.clone();
            if let Some(url) = fields.get("url").map(|u| map_value(mapper, u)) {
                fields.insert("url".to_string(), url);
            }
            Value::Object(fields)
        }
        other => other.clone(),
    }
}

/// Request the medium-quality thumbnail instead of the high-quality one.
pub fn fix_thumbnail_hq(url: &str) -> String {
    url.replace("hqdefault", "mqdefault")
        .replace("/default", "/mqdefault")
}

/// Fill an external proxy template.
///
/// Supported placeholders: `{url}`, `{scheme}`, `{netloc}`, `{path}`,
/// `{params}`, `{query}`, `{fragment}`, each also as `{<name>_encoded}`
/// (form-encoded).
pub fn external_proxy_url(template: &str, url: &str) -> String {
    let mut parts: Vec<(&str, String)> = vec![("url", url.to_string())];

    match url::Url::parse(url) {
        Ok(parsed) => {
            let netloc = match (parsed.host_str(), parsed.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                _ => String::new(),
            };
            parts.push(("scheme", parsed.scheme().to_string()));
            parts.push(("netloc", netloc));
            parts.push(("path", parsed.path().to_string()));
            parts.push(("params", String::new()));
            parts.push(("query", parsed.query().unwrap_or_default().to_string()));
            parts.push(("fragment", parsed.fragment().unwrap_or_default().to_string()));
        }
        Err(_) => {
            for name in ["scheme", "netloc", "path", "params", "query", "fragment"] {
                parts.push((name, String::new()));
            }
        }
    }

    let mut out = template.to_string();
    for (name, value) in &parts {
        let encoded = urlencoding::encode(value).replace("%20", "+");
        out = out.replace(&format!("{{{}_encoded}}", name), &encoded);
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unregistered_mapper_is_identity() {
        let mappers = PropMappers::new();
        let raw = json!("http://x/thumb.jpg");
        assert_eq!(mappers.apply(MAP_IMAGE_URL, &raw), raw);
    }

    #[test]
    fn test_reregistering_replaces() {
        let mappers = PropMappers::new();
        mappers.register("proxy_image", |u| format!("/proxy?u={}", u));
        assert_eq!(
            mappers.apply("proxy_image", &json!("http://x/a.jpg")),
            json!("/proxy?u=http://x/a.jpg")
        );

        mappers.register("proxy_image", |u| u.to_string());
        assert_eq!(
            mappers.apply("proxy_image", &json!("http://x/a.jpg")),
            json!("http://x/a.jpg")
        );
    }

    #[test]
    fn test_structured_values() {
        let mappers = PropMappers::new();
        mappers.register(MAP_STREAM_URL, |u| format!("/stream/{}", u));

        let sources = json!([
            {"url": "https://cdn/a.mp4", "quality": "720p"},
            "https://cdn/b.mp4",
            ""
        ]);
        assert_eq!(
            mappers.apply(MAP_STREAM_URL, &sources),
            json!([
                {"url": "/stream/https://cdn/a.mp4", "quality": "720p"},
                "/stream/https://cdn/b.mp4",
                ""
            ])
        );
        assert_eq!(mappers.apply(MAP_STREAM_URL, &json!(42)), json!(42));
    }

    #[test]
    fn test_fix_thumbnail_hq() {
        assert_eq!(
            fix_thumbnail_hq("https://i.ytimg.com/vi/x/hqdefault.jpg"),
            "https://i.ytimg.com/vi/x/mqdefault.jpg"
        );
        assert_eq!(
            fix_thumbnail_hq("https://i.ytimg.com/vi/x/default.jpg"),
            "https://i.ytimg.com/vi/x/mqdefault.jpg"
        );
    }

    #[test]
    fn test_external_proxy_template() {
        let out = external_proxy_url(
            "https://proxy.example/{netloc}{path}?{query}&src={url_encoded}",
            "https://i.ytimg.com/vi/x/mqdefault.jpg?a=1",
        );
        assert_eq!(
            out,
            "https://proxy.example/i.ytimg.com/vi/x/mqdefault.jpg?a=1&src=https%3A%2F%2Fi.ytimg.com%2Fvi%2Fx%2Fmqdefault.jpg%3Fa%3D1"
        );
    }

    #[test]
    fn test_from_config_local_routes() {
        let config = YotterConfig {
            proxy_base: "https://yotter.example/".into(),
            ..YotterConfig::default()
        };
        let mappers = PropMappers::from_config(&config);

        assert_eq!(
            mappers.apply(MAP_IMAGE_URL, &json!("https://i.ytimg.com/vi/x/hqdefault.jpg")),
            json!("https://yotter.example/ytimg/https://i.ytimg.com/vi/x/mqdefault.jpg")
        );
        assert_eq!(
            mappers.apply(MAP_STREAM_URL, &json!("https://cdn/v.mp4")),
            json!("https://yotter.example/stream/https://cdn/v.mp4")
        );
    }

    #[test]
    fn test_from_config_without_proxying() {
        let config = YotterConfig {
            proxy_images: false,
            proxy_videos: false,
            ..YotterConfig::default()
        };
        let mappers = PropMappers::from_config(&config);

        assert!(!mappers.is_registered(MAP_STREAM_URL));
        assert_eq!(
            mappers.apply(MAP_IMAGE_URL, &json!("https://i.ytimg.com/vi/x/hqdefault.jpg")),
            json!("https://i.ytimg.com/vi/x/mqdefault.jpg")
        );
    }
}

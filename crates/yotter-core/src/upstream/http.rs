//! Blocking HTTP client for upstream sources.
//!
//! Timeouts are enforced here, not by the entity framework. Non-success
//! statuses become typed errors so loaders can simply propagate them.

use crate::config::NetworkConfig;
use crate::error::{Result, YotterError};
use reqwest::blocking::{Client, Response};
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| YotterError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET a URL; `kind` and `key` name the entity in not-found errors.
    pub fn get(&self, url: &str, kind: &str, key: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                YotterError::Timeout(self.timeout)
            } else {
                YotterError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    source: Some(e),
                }
            }
        })?;
        check_status(response, url, kind, key)
    }

    pub fn get_text(&self, url: &str, kind: &str, key: &str) -> Result<String> {
        self.get(url, kind, key)?
            .text()
            .map_err(|e| YotterError::Network {
                message: format!("Failed to read body of {}: {}", url, e),
                source: Some(e),
            })
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str, kind: &str, key: &str) -> Result<T> {
        let body = self.get_text(url, kind, key)?;
        serde_json::from_str(&body).map_err(|e| YotterError::upstream(format!(
            "Unexpected response from {}: {}",
            extract_domain(url),
            e
        )))
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }
}

fn check_status(response: Response, url: &str, kind: &str, key: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            Err(YotterError::RateLimited {
                service: extract_domain(url),
                retry_after_secs: retry_after,
            })
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(YotterError::not_found(kind, key)),
        // The embed endpoint answers 401/403 for private and removed videos.
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(YotterError::not_found(kind, key)),
        _ => Err(YotterError::upstream(format!(
            "{} answered {} for {}",
            extract_domain(url),
            status,
            key
        ))),
    }
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/oembed?format=json"),
            "www.youtube.com"
        );
        assert_eq!(extract_domain("invalid-url"), "unknown");
    }

    #[test]
    fn test_retryable_status_codes() {
        assert!(HttpClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(HttpClient::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!HttpClient::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!HttpClient::is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::with_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(3));
    }
}

// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Which browser-like header set a request is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    Primary,
    /// Used after a server answered 403 to the primary profile
    Alternate,
}

impl HeaderProfile {
    /// Build the header map for this profile.
    pub fn headers(self, config: &CrawlerConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            Self::Primary => {
                insert(&mut headers, "user-agent", &config.user_agent);
                insert(
                    &mut headers,
                    "accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9",
                );
                insert(&mut headers, "accept-language", "en-US,en;q=0.5");
            }
            Self::Alternate => {
                insert(&mut headers, "user-agent", &config.alternate_user_agent);
                insert(
                    &mut headers,
                    "accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9",
                );
                insert(&mut headers, "accept-language", "en-US,en;q=0.9");
                insert(&mut headers, "cache-control", "no-cache");
                insert(&mut headers, "pragma", "no-cache");
            }
        }
        headers
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => log::warn!("Skipping invalid value for header {name}"),
    }
}

/// Create a configured asynchronous HTTP client.
///
/// Request headers are supplied per request, so the client only carries
/// transport settings.
pub fn create_async_client(config: &CrawlerConfig, verify_tls: bool) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .pool_max_idle_per_host(config.max_connections)
        .danger_accept_invalid_certs(!verify_tls)
        .build()?;
    Ok(client)
}

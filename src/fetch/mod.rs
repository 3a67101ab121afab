//! Rate-limited, retrying HTTP fetch layer.
//!
//! Source adapters only ever see the [`Fetch`] capability, so every request
//! they make goes through the shared [`RateLimiter`] and the retry policy of
//! [`ResilientFetcher`].

mod decode;
mod rate_limit;
mod resilient;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

pub use decode::{FALLBACK_ENCODINGS, decode_body};
pub use rate_limit::RateLimiter;
pub use resilient::{Backoff, ResilientFetcher};

/// A GET request issued on behalf of a source adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub verify_tls: bool,
    /// Overrides the fetcher's default request timeout
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            verify_tls: true,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The fetch capability handed to source adapters.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch a URL and return its decoded body.
    async fn fetch(&self, request: FetchRequest) -> Result<String, FetchError>;
}

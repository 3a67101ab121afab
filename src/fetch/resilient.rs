//! Retrying HTTP fetch primitive.
//!
//! Every attempt waits for a [`RateLimiter`] grant and a connection permit,
//! then issues one GET. Failures are retried with exponential backoff:
//!
//! - 403: switch to the alternate header profile; the first one is free
//! - 429 / 503 and any other non-200: retried up to `max_attempts`
//! - connect errors and timeouts: retried up to `max_attempts`
//! - undecodable body or malformed request: returned immediately

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::Semaphore;

use super::decode::{charset_of, decode_body};
use super::{Fetch, FetchRequest, RateLimiter};
use crate::error::{FetchError, Result};
use crate::models::{CrawlerConfig, RetryConfig};
use crate::utils::http::{HeaderProfile, create_async_client};

/// Exponential backoff: `base * 2^attempt`, plus jitter in `[0, base)`.
///
/// The jitter never exceeds the gap between two consecutive exponential
/// steps, so successive delays strictly increase.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, jitter: bool) -> Self {
        Self { base, jitter }
    }

    pub fn from_config(retry: &RetryConfig) -> Self {
        Self::new(retry.base_delay(), retry.jitter)
    }

    /// Delay before the retry following the `attempt`-th failure (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self.base.saturating_mul(2u32.saturating_pow(attempt));
        let base_nanos = self.base.as_nanos().min(u64::MAX as u128) as u64;
        if self.jitter && base_nanos > 0 {
            let jitter = rand::thread_rng().gen_range(0..base_nanos);
            exponential.saturating_add(Duration::from_nanos(jitter))
        } else {
            exponential
        }
    }
}

/// Why a single attempt failed.
enum AttemptError {
    /// Worth another attempt
    Retryable(FetchError),
    /// Retrying cannot help
    Fatal(FetchError),
}

/// HTTP fetcher shared by all source adapters.
pub struct ResilientFetcher {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    crawler: CrawlerConfig,
    max_attempts: u32,
    backoff: Backoff,
    limiter: Arc<RateLimiter>,
    connections: Semaphore,
}

impl ResilientFetcher {
    /// Create a fetcher with its own rate limiter.
    pub fn new(crawler: &CrawlerConfig, retry: &RetryConfig) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(crawler.calls_per_second));
        Self::with_limiter(crawler, retry, limiter)
    }

    /// Create a fetcher that paces its requests with an existing limiter.
    pub fn with_limiter(
        crawler: &CrawlerConfig,
        retry: &RetryConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        Ok(Self {
            client: create_async_client(crawler, true)?,
            insecure_client: create_async_client(crawler, false)?,
            crawler: crawler.clone(),
            max_attempts: retry.max_attempts.max(1),
            backoff: Backoff::from_config(retry),
            limiter,
            connections: Semaphore::new(crawler.max_connections.max(1)),
        })
    }

    /// Fetch a URL, retrying according to the configured policy.
    pub async fn get(&self, request: &FetchRequest) -> std::result::Result<String, FetchError> {
        let url = request.url.as_str();
        let mut profile = HeaderProfile::Primary;
        let mut failures = 0u32;

        loop {
            let error = match self.attempt(request, profile).await {
                Ok(body) => {
                    if failures > 0 {
                        log::debug!("Fetched {url} after {} retries", failures);
                    }
                    return Ok(body);
                }
                Err(AttemptError::Fatal(error)) => {
                    log::error!("Giving up on {url}: {error}");
                    return Err(error);
                }
                Err(AttemptError::Retryable(error)) => error,
            };

            let forbidden = matches!(error, FetchError::Http { status: 403, .. });
            if forbidden && profile == HeaderProfile::Primary {
                log::warn!("Access forbidden (403) for {url}, retrying with alternate headers");
                profile = HeaderProfile::Alternate;
                continue;
            }

            failures += 1;
            if failures >= self.max_attempts {
                log::error!(
                    "Max attempts ({}) reached for {url}: {error}",
                    self.max_attempts
                );
                return Err(error);
            }

            let delay = self.backoff.delay(failures - 1);
            log::warn!(
                "Retry {}/{} for {url} after {:.1}s: {error}",
                failures,
                self.max_attempts - 1,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One rate-limited request.
    async fn attempt(
        &self,
        request: &FetchRequest,
        profile: HeaderProfile,
    ) -> std::result::Result<String, AttemptError> {
        let url = request.url.as_str();
        let headers = self
            .request_headers(request, profile)
            .map_err(AttemptError::Fatal)?;
        let client = if request.verify_tls {
            &self.client
        } else {
            &self.insecure_client
        };

        self.limiter.acquire().await;
        let _permit = self.connections.acquire().await.map_err(|e| {
            AttemptError::Fatal(FetchError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })
        })?;

        let mut builder = client.get(url).headers(headers).query(&request.query);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            let error = FetchError::from_transport(url, &e);
            match error {
                FetchError::Request { .. } => AttemptError::Fatal(error),
                _ => AttemptError::Retryable(error),
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            if matches!(
                status,
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
            ) {
                log::warn!("Rate limited ({}) by {url}", status.as_u16());
            } else if status != StatusCode::FORBIDDEN {
                log::error!("HTTP {} error for {url}", status.as_u16());
            }
            return Err(AttemptError::Retryable(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of)
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Retryable(FetchError::from_transport(url, &e)))?;

        decode_body(&bytes, charset.as_deref()).ok_or_else(|| {
            AttemptError::Fatal(FetchError::Decode {
                url: url.to_string(),
            })
        })
    }

    /// Profile headers merged with the request's own headers.
    ///
    /// Request headers win over the primary profile; the alternate profile
    /// wins over request headers.
    fn request_headers(
        &self,
        request: &FetchRequest,
        profile: HeaderProfile,
    ) -> std::result::Result<HeaderMap, FetchError> {
        let mut custom = HeaderMap::new();
        for (name, value) in &request.headers {
            let invalid = |message: String| FetchError::Request {
                url: request.url.clone(),
                message,
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("header value for '{name}': {e}")))?;
            custom.insert(name, value);
        }

        let mut headers = profile.headers(&self.crawler);
        match profile {
            HeaderProfile::Primary => headers.extend(custom),
            HeaderProfile::Alternate => {
                custom.extend(headers);
                headers = custom;
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetch for ResilientFetcher {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<String, FetchError> {
        self.get(&request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn fetcher(max_attempts: u32, base_delay_ms: u64) -> ResilientFetcher {
        let crawler = CrawlerConfig {
            calls_per_second: 0.0,
            timeout_secs: 5,
            connect_timeout_secs: 2,
            ..CrawlerConfig::default()
        };
        let retry = RetryConfig {
            max_attempts,
            base_delay_ms,
            jitter: false,
        };
        ResilientFetcher::new(&crawler, &retry).unwrap()
    }

    #[test]
    fn backoff_doubles_without_jitter() {
        let backoff = Backoff::new(Duration::from_millis(100), false);
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn jittered_backoff_strictly_increases() {
        let backoff = Backoff::new(Duration::from_millis(100), true);
        for _ in 0..200 {
            let first = backoff.delay(0);
            let second = backoff.delay(1);
            let third = backoff.delay(2);
            assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(200));
            assert!(second > first);
            assert!(third > second);
        }
    }

    #[tokio::test]
    async fn retries_rate_limited_then_succeeds() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::<Instant>::new()));

        let responder = {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            move |_: &Request| {
                seen.lock().unwrap().push(Instant::now());
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200).set_body_string("ok")
                }
            }
        };
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(responder)
            .expect(3)
            .mount(&server)
            .await;

        let body = fetcher(3, 50)
            .get(&FetchRequest::get(format!("{}/jobs", server.uri())))
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let seen = seen.lock().unwrap();
        let first_gap = seen[1] - seen[0];
        let second_gap = seen[2] - seen[1];
        assert!(first_gap >= Duration::from_millis(50));
        assert!(second_gap >= Duration::from_millis(100));
        assert!(second_gap > first_gap);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetcher(3, 5)
            .get(&FetchRequest::get(format!("{}/broken", server.uri())))
            .await;
        assert!(matches!(result, Err(FetchError::Http { status: 500, .. })));
    }

    #[tokio::test]
    async fn first_forbidden_switches_profile_for_free() {
        let server = MockServer::start().await;
        let crawler = CrawlerConfig::default();

        Mock::given(method("GET"))
            .and(header("user-agent", crawler.user_agent.as_str()))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("user-agent", crawler.alternate_user_agent.as_str()))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher(1, 5)
            .get(&FetchRequest::get(server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "welcome");
    }

    #[tokio::test]
    async fn repeated_forbidden_consumes_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetcher(2, 5).get(&FetchRequest::get(server.uri())).await;
        assert!(matches!(result, Err(FetchError::Http { status: 403, .. })));
    }

    #[tokio::test]
    async fn decodes_latin1_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0x43, 0x61, 0x66, 0xE9], "text/html"),
            )
            .mount(&server)
            .await;

        let body = fetcher(1, 5)
            .get(&FetchRequest::get(server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "Café");
    }

    #[tokio::test]
    async fn forwards_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("page", "2"))
            .and(header("origin", "https://jobs.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let request = FetchRequest::get(format!("{}/api", server.uri()))
            .query("page", 2)
            .header("Origin", "https://jobs.test");
        assert_eq!(fetcher(1, 5).get(&request).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn connection_permits_bound_in_flight_requests() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(200);
        let arrivals = Arc::new(Mutex::new(Vec::<Instant>::new()));
        let peak = Arc::new(AtomicUsize::new(0));

        let responder = {
            let arrivals = Arc::clone(&arrivals);
            let peak = Arc::clone(&peak);
            move |_: &Request| {
                let now = Instant::now();
                let mut arrivals = arrivals.lock().unwrap();
                let pending = arrivals.iter().filter(|t| now - **t < delay).count();
                peak.fetch_max(pending + 1, Ordering::SeqCst);
                arrivals.push(now);
                ResponseTemplate::new(200)
                    .set_body_string("ok")
                    .set_delay(delay)
            }
        };
        Mock::given(method("GET"))
            .respond_with(responder)
            .expect(6)
            .mount(&server)
            .await;

        let crawler = CrawlerConfig {
            calls_per_second: 0.0,
            max_connections: 2,
            ..CrawlerConfig::default()
        };
        let retry = RetryConfig {
            max_attempts: 1,
            base_delay_ms: 5,
            jitter: false,
        };
        let fetcher = Arc::new(ResilientFetcher::new(&crawler, &retry).unwrap());

        let started = Instant::now();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..6 {
            let fetcher = Arc::clone(&fetcher);
            let url = format!("{}/jobs/{i}", server.uri());
            tasks.spawn(async move { fetcher.get(&FetchRequest::get(url)).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), "ok");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(started.elapsed() >= delay * 3);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let request = FetchRequest::get(server.uri()).timeout(Duration::from_millis(50));
        let result = fetcher(2, 5).get(&request).await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let result = fetcher(2, 5)
            .get(&FetchRequest::get("http://127.0.0.1:1/"))
            .await;
        assert!(matches!(result, Err(FetchError::Connection { .. })));
    }

    #[tokio::test]
    async fn invalid_header_is_not_retried() {
        let request = FetchRequest::get("http://127.0.0.1:1/").header("bad header", "x");
        let result = fetcher(3, 5).get(&request).await;
        assert!(matches!(result, Err(FetchError::Request { .. })));
    }
}

//! Rate-limited HTTP client for the REST API
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the auth header and user agent
//! - Classifying responses into success, rate limit, transient and permanent failures
//! - Sleeping until the server-supplied reset time on rate-limit responses
//!
//! Retrying is not done here; see [`crate::crawler::RetryPolicy`].

use crate::config::{ApiConfig, Credentials};
use crate::crawler::retry::{Disposition, Retryable};
use crate::{ConfigError, CrawlError};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Header carrying the Unix time at which the rate-limit window resets
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Header carrying the requests left in the current rate-limit window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying a server-chosen wait in seconds (secondary rate limits)
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Default minimum sleep after a rate-limit response
pub const DEFAULT_RATE_LIMIT_FLOOR: Duration = Duration::from_secs(60);

/// Classified failure of a single GET request
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 403; the client has already slept until the reset time
    #[error("rate limited on {url} (waited {waited:?})")]
    RateLimited { url: String, waited: Duration },

    /// HTTP 500, 502 or 503
    #[error("server error {status} on {url}")]
    TransientServer { url: String, status: u16 },

    /// Connection reset, timeout, truncated or unparsable body
    #[error("network error on {url}: {message}")]
    TransientNetwork { url: String, message: String },

    /// Any other non-200 status
    #[error("unexpected status {status} on {url}")]
    Permanent { url: String, status: u16 },
}

impl Retryable for FetchError {
    fn disposition(&self) -> Disposition {
        match self {
            Self::RateLimited { .. } => Disposition::RateLimited,
            Self::TransientServer { .. } | Self::TransientNetwork { .. } => Disposition::Transient,
            Self::Permanent { .. } => Disposition::Permanent,
        }
    }
}

/// Builds an HTTP client that sends the auth header on every request
///
/// # Arguments
///
/// * `config` - The API configuration (user agent, timeout)
/// * `credentials` - The API token
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - The token is not a valid header value, or the client failed to build
pub fn build_http_client(config: &ApiConfig, credentials: &Credentials) -> Result<Client, CrawlError> {
    let mut auth = HeaderValue::from_str(&credentials.authorization()).map_err(|_| {
        ConfigError::Validation("API token contains characters not allowed in a header".to_string())
    })?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Computes how long to sleep after a rate-limit response
///
/// `reset` is the server's reset time in Unix seconds (`None` when the header
/// is missing or unparsable, treated as "now"). The result is never shorter
/// than `floor`.
///
/// # Example
///
/// ```
/// use pr_crawler::crawler::rate_limit_sleep;
/// use std::time::Duration;
///
/// let floor = Duration::from_secs(60);
/// assert_eq!(rate_limit_sleep(Some(1_000), 1_000, floor), floor);
/// assert_eq!(rate_limit_sleep(Some(1_300), 1_000, floor), Duration::from_secs(300));
/// ```
pub fn rate_limit_sleep(reset: Option<i64>, now: i64, floor: Duration) -> Duration {
    let until_reset = reset
        .map(|reset| reset.saturating_sub(now))
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs.unsigned_abs()))
        .unwrap_or(Duration::ZERO);

    until_reset.max(floor)
}

/// What a 403 response means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forbidden {
    /// Quota exhausted; `reset` is the Unix time to wait for, if given
    RateLimited { reset: Option<i64> },
    /// Quota left and no wait requested, so access itself is refused
    Denied,
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}

fn classify_forbidden(headers: &HeaderMap, now: i64) -> Forbidden {
    let retry_after = header_i64(headers, RETRY_AFTER_HEADER);
    let remaining = header_i64(headers, RATE_LIMIT_REMAINING_HEADER);

    if retry_after.is_none() && remaining.is_some_and(|left| left > 0) {
        return Forbidden::Denied;
    }

    let reset = header_i64(headers, RATE_LIMIT_RESET_HEADER)
        .or_else(|| retry_after.map(|secs| now.saturating_add(secs)));
    Forbidden::RateLimited { reset }
}

/// HTTP GET client that classifies responses and honours rate limits
pub struct ApiClient {
    http: Client,
    base_url: Url,
    rate_limit_floor: Duration,
}

impl ApiClient {
    /// Creates a client for the configured API
    pub fn new(config: &ApiConfig, credentials: &Credentials) -> Result<Self, CrawlError> {
        let base_url = Url::parse(&config.base_url)?;
        let http = build_http_client(config, credentials)?;

        Ok(Self {
            http,
            base_url,
            rate_limit_floor: DEFAULT_RATE_LIMIT_FLOOR,
        })
    }

    /// Overrides the minimum rate-limit sleep
    pub fn with_rate_limit_floor(mut self, floor: Duration) -> Self {
        self.rate_limit_floor = floor;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches a URL and returns its JSON body
    ///
    /// # Response Handling
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 200 | Parsed JSON body |
    /// | HTTP 403, quota exhausted | Sleep until reset (at least the floor), then `RateLimited` |
    /// | HTTP 403, quota left | `Permanent` |
    /// | HTTP 500/502/503 | `TransientServer` |
    /// | Other status | `Permanent` |
    /// | Connect/timeout/body error | `TransientNetwork` |
    pub async fn get(&self, url: &Url) -> Result<Value, FetchError> {
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();

        if status == StatusCode::OK {
            let body = response.bytes().await.map_err(|e| network_error(url, &e))?;
            return serde_json::from_slice(&body).map_err(|e| FetchError::TransientNetwork {
                url: url.to_string(),
                message: format!("malformed JSON body: {}", e),
            });
        }

        if status == StatusCode::FORBIDDEN {
            let now = Utc::now().timestamp();
            let reset = match classify_forbidden(response.headers(), now) {
                Forbidden::Denied => {
                    tracing::warn!("Access denied on {} with rate-limit quota left", url);
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Forbidden::RateLimited { reset } => reset,
            };

            if reset.is_none() {
                tracing::warn!(
                    "403 on {} without a {} header, waiting the minimum",
                    url,
                    RATE_LIMIT_RESET_HEADER
                );
            }

            let waited = rate_limit_sleep(reset, now, self.rate_limit_floor);
            tracing::warn!(
                "Rate limit hit on {}. Sleeping for {:.2} minutes...",
                url,
                waited.as_secs_f64() / 60.0
            );
            tokio::time::sleep(waited).await;

            return Err(FetchError::RateLimited {
                url: url.to_string(),
                waited,
            });
        }

        if matches!(status.as_u16(), 500 | 502 | 503) {
            return Err(FetchError::TransientServer {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Err(FetchError::Permanent {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

fn network_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    FetchError::TransientNetwork {
        url: url.to_string(),
        message,
    }
}

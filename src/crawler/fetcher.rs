//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests returning the raw body and response metadata
//! - Retry with a fixed delay for transport failures
//! - Error classification
//!
//! HTTP status codes are not interpreted: any response that arrives is a
//! successful fetch. Only transport failures (connect errors, timeouts,
//! broken bodies) are retried.

use crate::config::CrawlerConfig;
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

/// A fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// URL that was requested
    pub url: String,

    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Returns true if the server declared an HTML body
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level fetch failure
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Source of fetched resources
///
/// The crawl engine only talks to this trait, so tests can substitute an
/// in-memory site for the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a single URL once, without retrying
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// Retry budget for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,

    /// Pause before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            retries: config.retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Total number of attempts
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(5),
        }
    }
}

/// Fetches a URL, retrying transport failures after a fixed delay
///
/// # Returns
///
/// * `Ok(FetchedResource)` - One of the attempts succeeded
/// * `Err(CrawlError::Transport)` - Every attempt failed; carries the last error
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<FetchedResource, CrawlError> {
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match fetcher.fetch(url).await {
            Ok(resource) => return Ok(resource),
            Err(e) if attempt < attempts => {
                tracing::debug!(
                    "Fetch attempt {}/{} for {} failed: {}, retrying in {:?}",
                    attempt,
                    attempts,
                    url,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(CrawlError::Transport {
                    url: url.to_string(),
                    attempts,
                    source: e,
                });
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use admin_crawler::config::CrawlerConfig;
/// use admin_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Network fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a client built from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    /// Wraps an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client, shared with other HTTP collaborators
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?.to_vec();

        tracing::trace!("Fetched {} ({} bytes, status {})", url, body.len(), status);

        Ok(FetchedResource {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }
}

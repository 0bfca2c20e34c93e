//! Search client for the auction site
//!
//! One `reqwest::Client` is built up front with the browser-like headers the
//! search endpoint expects. Requests go through a direct `governor` limiter
//! so several owners polling at once do not hammer the site.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::domain::services::ListingFetcher;
use crate::domain::{FilterPayload, MonitorError};
use crate::infrastructure::config::SearchConfig;

const SEARCH_PATH: &str = "Search";

/// HTTP settings for the search client
#[derive(Debug, Clone)]
pub struct SearchClientConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_requests_per_minute: u32,
}

impl SearchClientConfig {
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&config.base_url)
                .with_context(|| format!("Invalid search base URL: {}", config.base_url))?,
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            max_requests_per_minute: config.max_requests_per_minute,
        })
    }
}

pub struct SearchClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    search_url: Url,
}

impl SearchClient {
    pub fn new(config: SearchClientConfig) -> Result<Self> {
        let origin = config.base_url.origin().ascii_serialization();
        let search_url = config
            .base_url
            .join(SEARCH_PATH)
            .context("Failed to build search URL")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html, application/xhtml+xml, */*; q=0.01"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(search_url.as_str()).context("Invalid referer")?,
        );
        headers.insert(ORIGIN, HeaderValue::from_str(&origin).context("Invalid origin")?);
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_minute(
            NonZeroU32::new(config.max_requests_per_minute).context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            search_url,
        })
    }

    /// Search URL with a cache-busting timestamp
    pub fn request_url(&self) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("c", &Utc::now().timestamp_millis().to_string());
        url
    }
}

#[async_trait]
impl ListingFetcher for SearchClient {
    async fn fetch(&self, payload: &FilterPayload) -> Result<String, MonitorError> {
        self.rate_limiter.until_ready().await;

        let url = self.request_url();
        tracing::info!("Posting search request to {}", self.search_url);

        let response = self
            .client
            .post(url)
            .json(payload.as_json())
            .send()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Transport(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MonitorError::Transport(format!("Failed to read response body: {e}")))?;
        tracing::debug!("Search response: {} ({} bytes)", status, body.len());
        Ok(body)
    }
}

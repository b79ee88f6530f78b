//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests decoding JSON API responses
//! - Jittered retries for transient failures
//! - Error classification (definitive HTTP status vs. exhausted retries)

use crate::config::{CrawlerConfig, UserAgentConfig};
use rand::Rng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Failure of a fetch after the retry policy has been applied
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status; never retried
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Every attempt failed with a transient error
    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl FetchError {
    /// Returns true if the server gave a definitive answer
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Outcome of a single request attempt
enum Attempt<T> {
    Done(T),
    Status(u16),
    Transient(String),
}

/// Retry and throttling settings applied to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per URL, including the first one
    pub max_attempts: u32,

    /// Random pause before each attempt is drawn from `jitter_min..=jitter_max`
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms.max(config.jitter_min_ms)),
        }
    }

    /// Draws the pause taken before the next attempt
    pub fn jitter(&self) -> Duration {
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        if max <= min {
            return self.jitter_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Total timeout of one request attempt
///
/// # Example
///
/// ```no_run
/// use habr_harvest::config::UserAgentConfig;
/// use habr_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "HabrHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// JSON API client with the crawl retry policy
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler.request_timeout())?;
        Ok(Self::new(client, RetryPolicy::from_config(crawler)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url` and decodes its JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx with valid JSON | Return the decoded body |
    /// | HTTP non-2xx | Immediate → `FetchError::Status` |
    /// | Timeout, connection error | Retry up to `max_attempts` |
    /// | Body read or JSON decode error | Retry up to `max_attempts` |
    ///
    /// A random jitter pause precedes every attempt, the first one included.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.jitter()).await;

            match self.attempt::<T>(url).await {
                Attempt::Done(body) => return Ok(body),
                Attempt::Status(status) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    })
                }
                Attempt::Transient(error) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        url,
                        error
                    );
                    last_error = error;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str) -> Attempt<T> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(classify_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Status(status.as_u16());
        }

        match response.json::<T>().await {
            Ok(body) => Attempt::Done(body),
            Err(e) => Attempt::Transient(classify_error(&e)),
        }
    }
}

/// Describes a transport error for log output
fn classify_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection error: {}", error)
    } else if error.is_decode() {
        format!("Invalid response body: {}", error)
    } else {
        error.to_string()
    }
}

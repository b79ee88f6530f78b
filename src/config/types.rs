use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Habr-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "hub")]
    pub hubs: Vec<HubEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Base URL of the article API (listing and detail endpoints)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the public site, used for derived article and author links
    #[serde(default = "default_site_base")]
    pub site_base: String,

    /// Total timeout of a single request attempt (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per URL before a transient failure is given up on
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the random pause before each attempt (milliseconds)
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random pause before each attempt (milliseconds)
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// How often the result buffer is checked for a full batch (milliseconds)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// How often the scheduler looks for due hubs (seconds)
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            site_base: default_site_base(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://habr.com/kek".to_string()
}

fn default_site_base() -> String {
    "https://habr.com/ru".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_jitter_min_ms() -> u64 {
    1000
}

fn default_jitter_max_ms() -> u64 {
    3000
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_schedule_interval_secs() -> u64 {
    5
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Hub definition used to seed the database
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HubEntry {
    /// Human-readable label
    #[serde(default)]
    pub name: Option<String>,

    /// Public hub page, e.g. `https://habr.com/ru/hubs/career/articles/`
    pub hub_link: String,

    /// Minimum time between two crawls of this hub (seconds)
    pub check_interval_secs: u64,

    #[serde(default = "default_max_workers")]
    pub max_workers: u32,

    #[serde(default = "default_links_per_page")]
    pub links_per_page: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_max_workers() -> u32 {
    5
}

fn default_links_per_page() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    10
}

fn default_batch_size() -> u32 {
    100
}

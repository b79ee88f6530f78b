//! Article API payloads and endpoint construction
//!
//! This module handles:
//! - Extracting the API hub name from a public hub link
//! - Building listing, article and derived page URLs
//! - Decoding listing and article detail responses into records

use crate::crawler::HubRef;
use crate::state::{ArticleRecord, CrawlStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

fn hub_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"hubs/([^/]+)/articles").expect("hub link pattern is valid"))
}

/// Extracts the API hub name from a public hub link
///
/// `https://habr.com/ru/hubs/career/articles/` yields `career`.
pub fn extract_hub_name(hub_link: &str) -> Option<String> {
    hub_link_pattern()
        .captures(hub_link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Builds the listing endpoint for one page of a hub
pub fn listing_url(api_base: &str, hub_name: &str, page: u32, per_page: u32) -> String {
    let hub: String = url::form_urlencoded::byte_serialize(hub_name.as_bytes()).collect();
    format!(
        "{}/v2/articles/?hub={}&sort=all&fl=ru&hl=ru&page={}&perPage={}",
        api_base.trim_end_matches('/'),
        hub,
        page,
        per_page
    )
}

/// Builds the article detail endpoint
pub fn article_api_url(api_base: &str, article_id: i64) -> String {
    format!(
        "{}/v2/articles/{}/?fl=ru&hl=ru",
        api_base.trim_end_matches('/'),
        article_id
    )
}

/// Builds the public article page stored with every record
pub fn article_page_url(site_base: &str, article_id: i64) -> String {
    format!("{}/articles/{}/", site_base.trim_end_matches('/'), article_id)
}

/// Builds the public author page
pub fn author_page_url(site_base: &str, alias: &str) -> String {
    format!("{}/users/{}/", site_base.trim_end_matches('/'), alias)
}

/// One page of the article listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    /// Total pages the API reports for this hub
    #[serde(default)]
    pub pages_count: Option<u32>,

    /// Object keyed by article ID; the API sends `[]` when there are none
    #[serde(default)]
    pub publication_refs: serde_json::Value,
}

impl ListingPayload {
    pub fn pages_count(&self) -> u32 {
        self.pages_count.unwrap_or(0)
    }

    /// Returns the article IDs listed on this page
    ///
    /// Keys that are not numeric IDs are skipped.
    pub fn article_ids(&self) -> Vec<i64> {
        let Some(refs) = self.publication_refs.as_object() else {
            return Vec::new();
        };

        refs.keys()
            .filter_map(|key| match key.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Skipping non-numeric article id '{}'", key);
                    None
                }
            })
            .collect()
    }
}

/// Article detail response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    #[serde(default)]
    pub time_published: Option<String>,

    #[serde(default)]
    pub title_html: Option<String>,

    #[serde(default)]
    pub text_html: Option<String>,

    #[serde(default)]
    pub author: Option<AuthorPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorPayload {
    #[serde(default)]
    pub fullname: Option<String>,

    #[serde(default)]
    pub alias: Option<String>,
}

/// Parses an ISO-8601 timestamp; values without an offset are taken as UTC
pub fn parse_published_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl ArticlePayload {
    /// Materializes a processed record for this article
    pub fn into_record(self, article_id: i64, hub: &HubRef, site_base: &str) -> ArticleRecord {
        let published_at = self.time_published.as_deref().and_then(|value| {
            let parsed = parse_published_at(value);
            if parsed.is_none() {
                tracing::warn!(
                    "Article {}: unparseable timePublished '{}'",
                    article_id,
                    value
                );
            }
            parsed
        });

        let author = self.author.unwrap_or_default();

        ArticleRecord {
            article_id,
            hub_id: Some(hub.id),
            hub_link: hub.link.to_string(),
            url: article_page_url(site_base, article_id),
            title: Some(self.title_html.unwrap_or_default()),
            published_at,
            author_name: Some(author.fullname.unwrap_or_default()),
            author_url: author
                .alias
                .as_deref()
                .map(|alias| author_page_url(site_base, alias)),
            main_text: self.text_html,
            status: CrawlStatus::Processed,
            created_at: Utc::now(),
        }
    }
}

use crate::state::CrawlStatus;
use chrono::{DateTime, Utc};

/// One discovered article, as persisted
///
/// Records are keyed by `article_id`; storing the same id twice keeps the
/// first record.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub article_id: i64,

    /// Owning hub; `None` once the hub has been deleted
    pub hub_id: Option<i64>,

    /// Snapshot of the hub link at crawl time
    pub hub_link: String,

    /// Public article page
    pub url: String,

    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub main_text: Option<String>,
    pub status: CrawlStatus,
    pub created_at: DateTime<Utc>,
}

impl ArticleRecord {
    /// Builds a record for an article whose detail request was refused
    ///
    /// Only identifying fields are populated.
    pub fn errored(article_id: i64, hub_id: i64, hub_link: &str, url: String) -> Self {
        Self {
            article_id,
            hub_id: Some(hub_id),
            hub_link: hub_link.to_string(),
            url,
            title: None,
            published_at: None,
            author_name: None,
            author_url: None,
            main_text: None,
            status: CrawlStatus::Error,
            created_at: Utc::now(),
        }
    }
}

use std::sync::Arc;

/// Identifying fields of the hub a record belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubRef {
    pub id: i64,
    pub link: Arc<str>,
}

/// A unit of crawl work placed on a session's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Fetch one page of the hub listing
    ListingPage { page: u32 },

    /// Fetch one article and turn it into a record
    ArticleFetch { article_id: i64, hub: HubRef },
}

impl WorkItem {
    /// Short description used in log lines
    pub fn describe(&self) -> String {
        match self {
            Self::ListingPage { page } => format!("listing page {}", page),
            Self::ArticleFetch { article_id, .. } => format!("article {}", article_id),
        }
    }
}

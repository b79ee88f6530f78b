//! Crawler module for hub discovery and article harvesting
//!
//! This module contains the core crawling logic, including:
//! - JSON API fetching with jittered retries
//! - Listing and article payload decoding
//! - The per-session work queue and result buffer
//! - Crawl sessions and the periodic scheduler

mod buffer;
mod fetcher;
mod parser;
mod queue;
mod scheduler;
mod session;
mod work;

pub use buffer::{FlushReport, Flusher, ResultBuffer};
pub use fetcher::{build_http_client, FetchError, Fetcher, RetryPolicy};
pub use parser::{
    article_api_url, article_page_url, author_page_url, extract_hub_name, listing_url,
    parse_published_at, ArticlePayload, AuthorPayload, ListingPayload,
};
pub use queue::{WorkGuard, WorkQueue};
pub use scheduler::{run_once, run_scheduler, start_due_sessions, trigger_due_hubs};
pub use session::{crawl_hub, CrawlContext, CrawlSession};
pub use work::{HubRef, WorkItem};

//! State module for hubs and crawl results
//!
//! # Components
//!
//! - `CrawlStatus`: lifecycle status shared by hubs and article records
//! - `Hub`: a crawl target with its scheduling policy
//! - `ArticleRecord`: one persisted crawl result

mod article;
mod hub;
mod status;

// Re-export main types
pub use article::ArticleRecord;
pub use hub::{Hub, NewHub};
pub use status::CrawlStatus;

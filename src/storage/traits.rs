//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{ArticleRecord, CrawlStatus, Hub, NewHub};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Hub not found: {0}")]
    HubNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl engine only needs `list_due_hubs`, `save_hub` and
/// `insert_articles`; the remaining operations serve seeding and statistics.
pub trait Storage: Send {
    // ===== Hub Management =====

    /// Stores a hub unless one with the same link already exists
    ///
    /// # Returns
    ///
    /// The ID of the new or existing hub
    fn seed_hub(&mut self, hub: &NewHub) -> StorageResult<i64>;

    /// Gets a hub by ID
    fn get_hub(&self, hub_id: i64) -> StorageResult<Hub>;

    /// Gets all hubs ordered by ID
    fn list_hubs(&self) -> StorageResult<Vec<Hub>>;

    /// Gets hubs that should be crawled at `now`
    ///
    /// A hub is due when its next check time is unset or in the past and
    /// no session currently owns it.
    fn list_due_hubs(&self, now: DateTime<Utc>) -> StorageResult<Vec<Hub>>;

    /// Persists the mutable fields of a hub (status and check times)
    fn save_hub(&mut self, hub: &Hub) -> StorageResult<()>;

    // ===== Article Management =====

    /// Inserts a batch of article records, ignoring already-stored article IDs
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_articles(&mut self, records: &[ArticleRecord]) -> StorageResult<usize>;

    /// Gets an article by its article ID
    fn get_article(&self, article_id: i64) -> StorageResult<Option<ArticleRecord>>;

    // ===== Statistics =====

    /// Gets total article count
    fn count_articles(&self) -> StorageResult<u64>;

    /// Counts articles by status
    fn count_articles_by_status(&self, status: CrawlStatus) -> StorageResult<u64>;

    /// Counts articles belonging to a hub
    fn count_articles_for_hub(&self, hub_id: i64) -> StorageResult<u64>;
}

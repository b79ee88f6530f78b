//! Storage module for persisting hubs and crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Hub scheduling state (status, last/next check times)
//! - Batched, insert-or-ignore persistence of article records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ArticleRecord;
use crate::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Storage backend shared by the scheduler and every running crawl session
///
/// All access goes through one mutex; concurrent sessions rely on the
/// insert-or-ignore semantics of `insert_articles` rather than any
/// cross-session locking.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<Box<dyn Storage>>>,
}

impl SharedStorage {
    pub fn new<S: Storage + 'static>(storage: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(storage))),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Box<dyn Storage>>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Runs a short storage operation on the calling thread
    pub fn with<R>(
        &self,
        op: impl FnOnce(&mut dyn Storage) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut guard = self.lock()?;
        op(guard.as_mut())
    }

    /// Runs a storage operation on the blocking pool
    ///
    /// The operation still completes if the awaiting future is dropped.
    pub async fn run_blocking<R, F>(&self, op: F) -> StorageResult<R>
    where
        F: FnOnce(&mut dyn Storage) -> StorageResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let storage = self.clone();

        tokio::task::spawn_blocking(move || storage.with(op))
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?
    }

    /// Persists a batch of records on the blocking pool
    ///
    /// On failure the batch is handed back so the caller can keep it.
    pub async fn insert_articles(
        &self,
        batch: Vec<ArticleRecord>,
    ) -> Result<usize, (StorageError, Vec<ArticleRecord>)> {
        let storage = self.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let result = storage.with(|s| s.insert_articles(&batch));
            (result, batch)
        })
        .await;

        match outcome {
            Ok((Ok(inserted), _)) => Ok(inserted),
            Ok((Err(e), batch)) => Err((e, batch)),
            Err(e) => Err((StorageError::Database(e.to_string()), Vec::new())),
        }
    }
}

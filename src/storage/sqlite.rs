//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{ArticleRecord, CrawlStatus, Hub, NewHub};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::HarvestError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const HUB_COLUMNS: &str = "id, name, hub_link, check_interval_secs, last_check_at, next_check_at,
     status, max_threads, count_links_per_page, max_pages, batch_size";

const ARTICLE_COLUMNS: &str = "article, from_hub, from_hub_link, link, title, published_at,
     author_name, author_link, main_text, status, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Formats a timestamp so that lexical order matches chronological order
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_status(idx: usize, value: &str) -> rusqlite::Result<CrawlStatus> {
    CrawlStatus::from_db_string(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown status '{}'", value).into(),
        )
    })
}

fn hub_from_row(row: &Row<'_>) -> rusqlite::Result<Hub> {
    let next_check_at = row
        .get::<_, Option<String>>(5)?
        .map(|value| parse_db_time(5, &value))
        .transpose()?;

    Ok(Hub {
        id: row.get(0)?,
        name: row.get(1)?,
        hub_link: row.get(2)?,
        check_interval_secs: row.get::<_, i64>(3)?.max(0) as u64,
        last_checked_at: parse_db_time(4, &row.get::<_, String>(4)?)?,
        next_check_at,
        status: parse_status(6, &row.get::<_, String>(6)?)?,
        max_workers: row.get(7)?,
        links_per_page: row.get(8)?,
        max_pages: row.get(9)?,
        batch_size: row.get(10)?,
    })
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleRecord> {
    let published_at = row
        .get::<_, Option<String>>(5)?
        .map(|value| parse_db_time(5, &value))
        .transpose()?;

    Ok(ArticleRecord {
        article_id: row.get(0)?,
        hub_id: row.get(1)?,
        hub_link: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        published_at,
        author_name: row.get(6)?,
        author_url: row.get(7)?,
        main_text: row.get(8)?,
        status: parse_status(9, &row.get::<_, String>(9)?)?,
        created_at: parse_db_time(10, &row.get::<_, String>(10)?)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Hub Management =====

    fn seed_hub(&mut self, hub: &NewHub) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM hubs WHERE hub_link = ?1",
                params![hub.hub_link],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let now = to_db_time(&Utc::now());
        self.conn.execute(
            "INSERT INTO hubs (name, hub_link, check_interval_secs, last_check_at, status,
             max_threads, count_links_per_page, max_pages, batch_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                hub.name,
                hub.hub_link,
                i64::try_from(hub.check_interval_secs).unwrap_or(i64::MAX),
                now,
                CrawlStatus::Processed.to_db_string(),
                hub.max_workers,
                hub.links_per_page,
                hub.max_pages,
                hub.batch_size
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_hub(&self, hub_id: i64) -> StorageResult<Hub> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM hubs WHERE id = ?1", HUB_COLUMNS))?;

        stmt.query_row(params![hub_id], hub_from_row)
            .optional()?
            .ok_or(StorageError::HubNotFound(hub_id))
    }

    fn list_hubs(&self) -> StorageResult<Vec<Hub>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM hubs ORDER BY id", HUB_COLUMNS))?;

        let hubs = stmt
            .query_map([], hub_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hubs)
    }

    fn list_due_hubs(&self, now: DateTime<Utc>) -> StorageResult<Vec<Hub>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM hubs
             WHERE (next_check_at IS NULL OR next_check_at < ?1) AND status != ?2
             ORDER BY id",
            HUB_COLUMNS
        ))?;

        let hubs = stmt
            .query_map(
                params![to_db_time(&now), CrawlStatus::AtWork.to_db_string()],
                hub_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hubs)
    }

    fn save_hub(&mut self, hub: &Hub) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE hubs SET status = ?1, last_check_at = ?2, next_check_at = ?3 WHERE id = ?4",
            params![
                hub.status.to_db_string(),
                to_db_time(&hub.last_checked_at),
                hub.next_check_at.as_ref().map(to_db_time),
                hub.id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::HubNotFound(hub.id));
        }

        Ok(())
    }

    // ===== Article Management =====

    fn insert_articles(&mut self, records: &[ArticleRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR IGNORE INTO articles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                ARTICLE_COLUMNS
            ))?;

            for record in records {
                inserted += stmt.execute(params![
                    record.article_id,
                    record.hub_id,
                    record.hub_link,
                    record.url,
                    record.title,
                    record.published_at.as_ref().map(to_db_time),
                    record.author_name,
                    record.author_url,
                    record.main_text,
                    record.status.to_db_string(),
                    to_db_time(&record.created_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn get_article(&self, article_id: i64) -> StorageResult<Option<ArticleRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM articles WHERE article = ?1",
            ARTICLE_COLUMNS
        ))?;

        let article = stmt
            .query_row(params![article_id], article_from_row)
            .optional()?;

        Ok(article)
    }

    // ===== Statistics =====

    fn count_articles(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_articles_by_status(&self, status: CrawlStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_articles_for_hub(&self, hub_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE from_hub = ?1",
            params![hub_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Initializes or opens a database at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

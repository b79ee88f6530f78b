//! Database schema definitions
//!
//! Column names follow the tables the admin tooling and seed scripts
//! already work with.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl targets and their scheduling policy
CREATE TABLE IF NOT EXISTS hubs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    hub_link TEXT NOT NULL,
    check_interval_secs INTEGER NOT NULL,
    last_check_at TEXT NOT NULL,
    next_check_at TEXT,
    status TEXT NOT NULL DEFAULT 'processed',
    max_threads INTEGER NOT NULL DEFAULT 5,
    count_links_per_page INTEGER NOT NULL DEFAULT 50,
    max_pages INTEGER NOT NULL DEFAULT 10,
    batch_size INTEGER NOT NULL DEFAULT 100
);

CREATE INDEX IF NOT EXISTS idx_hubs_due ON hubs(status, next_check_at);

-- One row per discovered article
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_hub INTEGER REFERENCES hubs(id) ON DELETE SET NULL,
    from_hub_link TEXT NOT NULL,
    article INTEGER NOT NULL UNIQUE,
    link TEXT NOT NULL,
    title TEXT,
    published_at TEXT,
    author_name TEXT,
    author_link TEXT,
    main_text TEXT,
    status TEXT NOT NULL DEFAULT 'processed',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_article ON articles(article);
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

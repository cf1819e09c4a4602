//! Embedded single-file store of extracted page content.
//!
//! One table, keyed by URL. Concurrent writers coordinate through SQLite's
//! WAL journal and a 30-second busy timeout; the queue store remains the
//! source of truth for crawl state, this store only holds what was extracted.

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tracing::debug;

use crate::core::config::PAGE_CONTENT_MAX_CHARS;
use crate::core::types::PageExtract;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT UNIQUE,
    title TEXT,
    content TEXT,
    language TEXT,
    timestamp TEXT,
    analyzed BOOLEAN DEFAULT 0
);
"#;

#[derive(Clone)]
pub struct PageStore {
    pool: SqlitePool,
}

impl PageStore {
    /// Open the store at `path`, creating the file and schema when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create content store directory")?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("failed to open content store")?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("failed to initialize content store schema")?;

        Ok(Self { pool })
    }

    /// Upsert a page record. On update the text is re-truncated and the
    /// `analyzed` flag resets so downstream consumers re-process the page.
    pub async fn save(&self, url: &str, extract: &PageExtract) -> Result<()> {
        let content: String = extract.text.chars().take(PAGE_CONTENT_MAX_CHARS).collect();

        sqlx::query(
            r#"
            INSERT INTO pages (url, title, content, language, timestamp, analyzed)
            VALUES (?, ?, ?, ?, ?, 0)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                language = excluded.language,
                timestamp = excluded.timestamp,
                analyzed = 0
            "#,
        )
        .bind(url)
        .bind(&extract.title)
        .bind(&content)
        .bind(&extract.language)
        .bind(&extract.timestamp)
        .execute(&self.pool)
        .await
        .context("failed to save page")?;

        debug!(url, "page saved");
        Ok(())
    }

    /// Membership test used to short-circuit links that were already indexed.
    pub async fn exists(&self, url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM pages WHERE url = ? LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .context("failed to query page existence")?;
        Ok(row.is_some())
    }

    pub async fn page_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Fetch `(title, content, language, analyzed)` for a URL. Test helper and
    /// diagnostic hook; the crawl loop itself never reads pages back.
    pub async fn fetch(&self, url: &str) -> Result<Option<(String, String, String, bool)>> {
        let row = sqlx::query_as(
            "SELECT title, content, language, analyzed FROM pages WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

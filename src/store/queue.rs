//! Transactional work queue over MySQL.
//!
//! Each URL lives in exactly one row of `urls` and moves through
//! unvisited → in_progress → visited/errored. Claiming relies on
//! `FOR UPDATE SKIP LOCKED` so concurrent schedulers never hand the same row
//! to two workers; rows locked by another claimer are skipped, not waited on.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tracing::{debug, info, warn};

use crate::core::config::{
    CrawlerConfig, DOMAIN_LIMIT, MAX_CONCURRENT_REQUESTS, MAX_ERROR_COUNT, PRIORITY_INTERVAL_SECS,
};
use crate::core::types::{ClaimedUrl, DomainQuota};
use crate::core::urls::{domain_of, is_valid, normalize};
use crate::store::PageStore;

/// Rows per statement for membership probes and bulk inserts.
const BATCH_SIZE: usize = 100;

const CREATE_URLS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    url VARCHAR(2048) NOT NULL UNIQUE,
    in_progress BOOLEAN NOT NULL DEFAULT 0,
    visited BOOLEAN NOT NULL DEFAULT 0,
    error_count BIGINT NOT NULL DEFAULT 0,
    last_crawled DATETIME,
    last_error DATETIME,
    domain VARCHAR(255)
)
"#;

const CREATE_DOMAIN_COUNTERS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS domain_counters (
    domain VARCHAR(255) NOT NULL PRIMARY KEY,
    count BIGINT NOT NULL DEFAULT 0,
    last_updated DATE NOT NULL,
    is_whitelisted BOOLEAN DEFAULT 0
)
"#;

const CREATE_ERROR_LOGS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS error_logs (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    url VARCHAR(2048),
    error_type VARCHAR(255),
    error_message TEXT,
    timestamp DATETIME
)
"#;

#[derive(Clone)]
pub struct QueueStore {
    pool: MySqlPool,
    config: Arc<CrawlerConfig>,
}

impl QueueStore {
    /// Connect with a pool sized for the worker ceiling plus headroom for the
    /// scheduler's own bookkeeping queries.
    pub async fn connect(config: Arc<CrawlerConfig>) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections((MAX_CONCURRENT_REQUESTS + 5) as u32)
            .connect(&config.mysql.connect_url())
            .await
            .context("failed to connect to queue store")?;
        Ok(Self { pool, config })
    }

    pub fn from_pool(pool: MySqlPool, config: Arc<CrawlerConfig>) -> Self {
        Self { pool, config }
    }

    /// Create tables, backfill missing domain columns and sync whitelist
    /// flags. A failure here is fatal for the process.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in [CREATE_URLS_SQL, CREATE_DOMAIN_COUNTERS_SQL, CREATE_ERROR_LOGS_SQL] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context("failed to create queue store schema")?;
        }

        // Older rows may predate the domain column.
        sqlx::query(
            r#"
            UPDATE urls
            SET domain = SUBSTRING_INDEX(SUBSTRING_INDEX(url, '://', -1), '/', 1)
            WHERE domain IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        for suffix in &self.config.whitelisted_domains {
            sqlx::query("UPDATE domain_counters SET is_whitelisted = 1 WHERE domain LIKE ?")
                .bind(format!("%{suffix}"))
                .execute(&self.pool)
                .await?;
        }

        info!("queue store schema ready");
        Ok(())
    }

    /// Insert the configured seed URLs when the queue is empty.
    pub async fn seed_if_empty(&self) -> Result<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for url in &self.config.seed_urls {
            sqlx::query("INSERT IGNORE INTO urls (url, domain) VALUES (?, ?)")
                .bind(url)
                .bind(domain_of(url))
                .execute(&self.pool)
                .await?;
        }
        info!(seeds = self.config.seed_urls.len(), "seed URLs inserted");
        Ok(())
    }

    /// Atomically select up to `limit` eligible rows and mark them
    /// in-progress. Eligible rows are unvisited unclaimed URLs, plus visited
    /// URLs on priority domains whose last crawl is older than the re-crawl
    /// interval; rows at the error ceiling are never returned. Priority rows
    /// sort first, then oldest-crawled (never-crawled before anything else).
    pub async fn claim(&self, limit: usize) -> Result<Vec<ClaimedUrl>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let priority = &self.config.priority_domains;
        let in_list = if priority.is_empty() {
            "(NULL)".to_string()
        } else {
            format!("({})", vec!["?"; priority.len()].join(", "))
        };

        let select_sql = format!(
            r#"
            SELECT id, url, domain FROM urls
            WHERE (
                    (visited = 1 AND in_progress = 0 AND domain IN {in_list}
                     AND last_crawled < UTC_TIMESTAMP() - INTERVAL ? SECOND)
                    OR (visited = 0 AND in_progress = 0)
                  )
              AND error_count < ?
            ORDER BY domain IN {in_list} DESC, last_crawled ASC, id ASC
            LIMIT ?
            FOR UPDATE SKIP LOCKED
            "#
        );

        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query_as::<_, (i64, String, Option<String>)>(&select_sql);
        for domain in priority {
            query = query.bind(domain);
        }
        query = query.bind(PRIORITY_INTERVAL_SECS).bind(MAX_ERROR_COUNT);
        for domain in priority {
            query = query.bind(domain);
        }
        query = query.bind(limit as i64);

        let rows = query.fetch_all(&mut *tx).await?;

        if !rows.is_empty() {
            let placeholders = vec!["?"; rows.len()].join(", ");
            let update_sql =
                format!("UPDATE urls SET in_progress = 1 WHERE id IN ({placeholders})");
            let mut update = sqlx::query(&update_sql);
            for (id, _, _) in &rows {
                update = update.bind(id);
            }
            update.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(id, url, domain)| {
                let domain = domain
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| domain_of(&url));
                ClaimedUrl { id, url, domain }
            })
            .collect())
    }

    /// Feed a candidate link set into the queue. Invalid links are dropped,
    /// survivors are canonicalized and deduplicated, anything already indexed
    /// in the content store or already queued is discarded, and the rest are
    /// inserted unvisited. Safe to call with the same set twice.
    pub async fn insert_bulk(&self, links: &[String], pages: &PageStore) -> Result<usize> {
        if links.is_empty() {
            return Ok(0);
        }

        let normalized: Vec<String> = links
            .iter()
            .filter(|link| is_valid(link))
            .map(|link| normalize(link))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if normalized.is_empty() {
            return Ok(0);
        }

        let mut unindexed = Vec::with_capacity(normalized.len());
        for link in normalized {
            if !pages.exists(&link).await? {
                unindexed.push(link);
            }
        }
        if unindexed.is_empty() {
            debug!("all candidate links already indexed");
            return Ok(0);
        }

        let mut existing = HashSet::new();
        for chunk in unindexed.chunks(BATCH_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT url FROM urls WHERE url IN ({placeholders})");
            let mut query = sqlx::query_as::<_, (String,)>(&sql);
            for link in chunk {
                query = query.bind(link);
            }
            for (url,) in query.fetch_all(&self.pool).await? {
                existing.insert(url);
            }
        }

        let fresh: Vec<&String> = unindexed.iter().filter(|l| !existing.contains(*l)).collect();
        if fresh.is_empty() {
            debug!("all candidate links already queued");
            return Ok(0);
        }

        let mut inserted = 0usize;
        for chunk in fresh.chunks(BATCH_SIZE) {
            let values = vec!["(?, 0, 0, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT IGNORE INTO urls (url, in_progress, visited, domain) VALUES {values}"
            );
            let mut query = sqlx::query(&sql);
            for link in chunk {
                query = query.bind(link.as_str()).bind(domain_of(link));
            }

            match query.execute(&self.pool).await {
                Ok(result) => inserted += result.rows_affected() as usize,
                Err(err) => {
                    // Lost a duplicate race against a concurrent claimer;
                    // retry the chunk row by row and swallow duplicates.
                    debug!(%err, "bulk insert fell back to per-row inserts");
                    for link in chunk {
                        let result = sqlx::query(
                            "INSERT IGNORE INTO urls (url, in_progress, visited, domain) \
                             VALUES (?, 0, 0, ?)",
                        )
                        .bind(link.as_str())
                        .bind(domain_of(link))
                        .execute(&self.pool)
                        .await;
                        if let Ok(r) = result {
                            inserted += r.rows_affected() as usize;
                        }
                    }
                }
            }
        }

        info!(inserted, "new links queued");
        Ok(inserted)
    }

    /// Successful processing: release the claim and stamp the crawl time.
    pub async fn mark_visited(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE urls SET visited = 1, in_progress = 0, last_crawled = UTC_TIMESTAMP() \
             WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Failed attempt: release the claim and bump the error counter. Warns
    /// once the row crosses the blacklist ceiling.
    pub async fn mark_error(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE urls SET in_progress = 0, error_count = error_count + 1, \
             last_error = UTC_TIMESTAMP() WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let (error_count,): (i64,) = sqlx::query_as("SELECT error_count FROM urls WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if error_count >= MAX_ERROR_COUNT {
            warn!(id, error_count, "URL blacklisted");
        }
        Ok(())
    }

    /// Release a claim without recording an outcome. Used when the scheduler
    /// backs off a claimed row (e.g. domain quota exhausted) and by operator
    /// tooling that sweeps stale claims after a crash.
    pub async fn release(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE urls SET in_progress = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the daily attempt counter for a domain under a row lock.
    ///
    /// The counter resets when the stored date is older than today (unless
    /// whitelisted, where it counts lifetime attempts). When a non-whitelisted
    /// domain is already at the daily cap the counter is returned unchanged.
    pub async fn update_domain_counter(&self, domain: &str) -> Result<DomainQuota> {
        let whitelisted = self.config.is_whitelisted(domain);
        let today: NaiveDate = Utc::now().date_naive();

        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, NaiveDate)> = sqlx::query_as(
            "SELECT count, last_updated FROM domain_counters WHERE domain = ? FOR UPDATE",
        )
        .bind(domain)
        .fetch_optional(&mut *tx)
        .await?;

        let mut count = match row {
            Some((_, last_updated)) if last_updated < today && !whitelisted => 0,
            Some((count, _)) => count,
            None => 0,
        };

        if !whitelisted && count >= DOMAIN_LIMIT {
            tx.commit().await?;
            return Ok(DomainQuota {
                count,
                whitelisted,
            });
        }

        count += 1;
        sqlx::query(
            r#"
            INSERT INTO domain_counters (domain, count, last_updated, is_whitelisted)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                count = VALUES(count),
                last_updated = VALUES(last_updated),
                is_whitelisted = VALUES(is_whitelisted)
            "#,
        )
        .bind(domain)
        .bind(count)
        .bind(today)
        .bind(whitelisted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DomainQuota {
            count,
            whitelisted,
        })
    }

    /// Append a diagnostic record; never consulted by the crawl loop.
    pub async fn log_error(&self, url: &str, error_type: &str, message: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO error_logs (url, error_type, error_message, timestamp) \
             VALUES (?, ?, ?, UTC_TIMESTAMP())",
        )
        .bind(url)
        .bind(error_type)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

//! SQLite-backed job store.
//!
//! Uses WAL mode with a small pool: the crawler is single-browser and
//! effectively single-writer, but WAL keeps ad-hoc inspection of a live
//! database cheap.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::types::{AdRecord, CrawlJob, NewPage, PageRecord, PageType};
use super::JobStore;

/// SQL schema for the crawl database
const SCHEMA_SQL: &str = r#"
-- One row per crawl run; current_index is the resume checkpoint
CREATE TABLE IF NOT EXISTS crawl_job (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    crawl_list TEXT NOT NULL,
    total_urls INTEGER NOT NULL,
    current_index INTEGER NOT NULL DEFAULT 0,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    completed INTEGER NOT NULL DEFAULT 0,
    host_identity TEXT
);

-- One row per navigated page the system decided to record
CREATE TABLE IF NOT EXISTS page (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES crawl_job(id),
    seed_index INTEGER NOT NULL,
    url TEXT NOT NULL,
    crawl_list_url TEXT NOT NULL,
    page_type TEXT NOT NULL,
    referrer_page_id TEXT,
    referrer_page_url TEXT,
    referrer_ad_id TEXT,
    timestamp INTEGER NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_page_job ON page(job_id);
CREATE INDEX IF NOT EXISTS idx_page_referrer_ad ON page(referrer_ad_id);

-- Ads discovered on pages; url is back-filled by the clickthrough handler
CREATE TABLE IF NOT EXISTS ad (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL REFERENCES page(id),
    selector TEXT,
    created_at INTEGER NOT NULL,
    url TEXT
);

CREATE INDEX IF NOT EXISTS idx_ad_page ON ad(page_id);
"#;

/// Persistent store for jobs, pages, and ads.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
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
            .context("Failed to open SQLite database")?;

        Self::init(pool).await
    }

    /// In-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        // Idempotent schema - CREATE IF NOT EXISTS throughout
        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize database schema")?;
        Ok(Self { pool })
    }

    fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> CrawlJob {
        CrawlJob {
            id: row.get("id"),
            name: row.get("name"),
            crawl_list: row.get("crawl_list"),
            total_urls: row.get("total_urls"),
            current_index: row.get("current_index"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            completed: row.get::<i64, _>("completed") != 0,
            host_identity: row.get("host_identity"),
        }
    }

    async fn insert_page_inner(&self, page: NewPage, archived: bool) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO page (id, job_id, seed_index, url, crawl_list_url, page_type, \
             referrer_page_id, referrer_page_url, referrer_ad_id, timestamp, archived) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&page.job_id)
        .bind(page.seed_index)
        .bind(&page.url)
        .bind(&page.crawl_list_url)
        .bind(page.page_type.as_str())
        .bind(&page.referrer_page_id)
        .bind(&page.referrer_page_url)
        .bind(&page.referrer_ad_id)
        .bind(Utc::now().timestamp())
        .bind(i64::from(archived))
        .execute(&self.pool)
        .await
        .context("Failed to insert page record")?;
        Ok(id)
    }
}

impl JobStore for SqliteStore {
    async fn create_job(
        &self,
        name: &str,
        crawl_list: &str,
        total_urls: i64,
        host_identity: Option<&str>,
    ) -> Result<CrawlJob> {
        let job = CrawlJob {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            crawl_list: crawl_list.to_string(),
            total_urls,
            current_index: 0,
            started_at: Utc::now().timestamp(),
            completed_at: None,
            completed: false,
            host_identity: host_identity.map(str::to_string),
        };

        sqlx::query(
            "INSERT INTO crawl_job (id, name, crawl_list, total_urls, current_index, \
             started_at, completed_at, completed, host_identity) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.name)
        .bind(&job.crawl_list)
        .bind(job.total_urls)
        .bind(job.current_index)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(i64::from(job.completed))
        .bind(&job.host_identity)
        .execute(&self.pool)
        .await
        .context("Failed to insert job record")?;

        Ok(job)
    }

    async fn get_job(&self, id: &str) -> Result<Option<CrawlJob>> {
        let row = sqlx::query("SELECT * FROM crawl_job WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query job")?;
        Ok(row.as_ref().map(Self::job_from_row))
    }

    async fn update_job_index(&self, id: &str, index: i64) -> Result<()> {
        sqlx::query("UPDATE crawl_job SET current_index = ? WHERE id = ?")
            .bind(index)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update job checkpoint")?;
        Ok(())
    }

    async fn complete_job(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE crawl_job SET completed = 1, completed_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to mark job completed")?;
        Ok(())
    }

    async fn insert_page(&self, page: NewPage) -> Result<String> {
        self.insert_page_inner(page, false).await
    }

    async fn archive_page(&self, page: NewPage) -> Result<String> {
        self.insert_page_inner(page, true).await
    }

    async fn insert_ad(&self, page_id: &str, selector: Option<&str>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO ad (id, page_id, selector, created_at, url) VALUES (?, ?, ?, ?, NULL)")
            .bind(&id)
            .bind(page_id)
            .bind(selector)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .context("Failed to insert ad record")?;
        Ok(id)
    }

    async fn set_ad_url(&self, ad_id: &str, url: &str) -> Result<bool> {
        // The url IS NULL guard makes the deferred write first-observer-wins:
        // a losing race path calling this later is a no-op.
        let result = sqlx::query("UPDATE ad SET url = ? WHERE id = ? AND url IS NULL")
            .bind(url)
            .bind(ad_id)
            .execute(&self.pool)
            .await
            .context("Failed to set ad destination URL")?;
        Ok(result.rows_affected() > 0)
    }

    async fn ad_url(&self, ad_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT url FROM ad WHERE id = ?")
            .bind(ad_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query ad")?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>("url")))
    }

    async fn get_page(&self, id: &str) -> Result<Option<PageRecord>> {
        let row = sqlx::query("SELECT * FROM page WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query page")?;

        Ok(row.map(|r| PageRecord {
            id: r.get("id"),
            job_id: r.get("job_id"),
            seed_index: r.get("seed_index"),
            url: r.get("url"),
            crawl_list_url: r.get("crawl_list_url"),
            page_type: PageType::parse(r.get::<String, _>("page_type").as_str())
                .unwrap_or(PageType::Main),
            referrer_page_id: r.get("referrer_page_id"),
            referrer_page_url: r.get("referrer_page_url"),
            referrer_ad_id: r.get("referrer_ad_id"),
            timestamp: r.get("timestamp"),
            archived: r.get::<i64, _>("archived") != 0,
        }))
    }
}

/// Extra queries used by tests and the resume path
impl SqliteStore {
    /// Pages created for a given job, oldest first
    pub async fn pages_for_job(&self, job_id: &str) -> Result<Vec<PageRecord>> {
        let rows = sqlx::query("SELECT id FROM page WHERE job_id = ? ORDER BY timestamp")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query pages for job")?;

        let mut pages = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(page) = self.get_page(&row.get::<String, _>("id")).await? {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    pub async fn get_ad(&self, ad_id: &str) -> Result<Option<AdRecord>> {
        let row = sqlx::query("SELECT * FROM ad WHERE id = ?")
            .bind(ad_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query ad")?;

        Ok(row.map(|r| AdRecord {
            id: r.get("id"),
            page_id: r.get("page_id"),
            selector: r.get("selector"),
            created_at: r.get("created_at"),
            url: r.get("url"),
        }))
    }
}

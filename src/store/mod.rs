//! Persistent job store for crawl jobs, pages, and ads.
//!
//! The store is the crawl's resumability backbone: the job row's
//! `current_index` is advanced after every fully processed seed URL, and a
//! crashed run picks up from exactly that index. Ad rows carry a deferred
//! `url` column that is only resolved as a side effect of clicking the ad.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{AdRecord, CrawlJob, NewPage, PageRecord, PageType};

use anyhow::Result;

/// Interface consumed by the crawler; the crawler never retains ownership
/// of rows past the call that writes them.
pub trait JobStore: Clone + Send + Sync {
    /// Create a new job row with `current_index = 0`
    fn create_job(
        &self,
        name: &str,
        crawl_list: &str,
        total_urls: i64,
        host_identity: Option<&str>,
    ) -> impl Future<Output = Result<CrawlJob>> + Send;

    fn get_job(&self, id: &str) -> impl Future<Output = Result<Option<CrawlJob>>> + Send;

    /// Persist the resumability checkpoint after a seed URL is fully
    /// processed (success or isolated failure alike)
    fn update_job_index(&self, id: &str, index: i64) -> impl Future<Output = Result<()>> + Send;

    /// Mark the job terminal with a completion timestamp
    fn complete_job(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Insert a full page record, returning its id
    fn insert_page(&self, page: NewPage) -> impl Future<Output = Result<String>> + Send;

    /// Insert a minimal archival record for a page that was navigated but
    /// not content-scraped
    fn archive_page(&self, page: NewPage) -> impl Future<Output = Result<String>> + Send;

    /// Record an ad discovered on a page; its destination URL is unknown at
    /// this point
    fn insert_ad(
        &self,
        page_id: &str,
        selector: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Resolve an ad's destination URL. Writes at most once: the first
    /// observed destination wins and later calls are no-ops. Returns whether
    /// this call performed the write.
    fn set_ad_url(&self, ad_id: &str, url: &str) -> impl Future<Output = Result<bool>> + Send;

    fn ad_url(&self, ad_id: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn get_page(&self, id: &str) -> impl Future<Output = Result<Option<PageRecord>>> + Send;
}

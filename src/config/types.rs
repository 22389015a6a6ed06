//! Core configuration types for ad-clickthrough crawling
//!
//! This module contains the main `CrawlConfig` struct and its associated
//! types that define the parameters for a crawl run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::constants::{
    CLICK_TIMEOUT_SECS, CLICKTHROUGH_TIMEOUT_SECS, ITEM_TIMEOUT_SECS, LANDING_SETTLE_MS,
    PAGE_LOAD_TIMEOUT_SECS, SCROLL_INTERVAL_MS, SCROLL_ITERATION_CAP,
};

/// What to do with ads discovered on a page.
///
/// This enumeration is complete and fixed; there are no undocumented modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClickAdsMode {
    /// Scrape ads but never click them
    NoClick,
    /// Click each ad, record its destination URL, and abort the load
    ClickAndBlockLoad,
    /// Click each ad, follow its destination, and scrape the landing page
    ClickAndScrapeLandingPage,
}

impl ClickAdsMode {
    /// Whether a clickthrough should chain into a landing-page crawl
    #[must_use]
    pub const fn follows_destination(&self) -> bool {
        matches!(self, Self::ClickAndScrapeLandingPage)
    }
}

/// Main configuration struct for a crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Output directory for crawl artifacts and the default database file.
    ///
    /// **INVARIANT:** validated to exist (or be creatable) before the run
    /// starts; fatal configuration error otherwise.
    pub(crate) output_dir: PathBuf,
    /// Newline-delimited file of absolute seed URLs
    pub(crate) url_list: PathBuf,
    /// Human-readable crawl name, recorded on the job row
    pub(crate) crawl_name: String,
    /// SQLite database path; defaults to `{output_dir}/adtrail.sqlite`
    pub(crate) db_path: Option<PathBuf>,
    /// Resume an existing job instead of creating a new one
    pub(crate) resume_job_id: Option<String>,
    /// Chrome user data directory for profile isolation
    #[serde(skip)]
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) headless: bool,
    pub(crate) scrape_site: bool,
    pub(crate) scrape_ads: bool,
    pub(crate) click_ads: ClickAdsMode,
    pub(crate) screenshot_ads_with_context: bool,
    /// Follow a bounded number of in-site article/subpage links per seed
    pub(crate) follow_subpages: bool,
    pub(crate) max_subpages: usize,

    /// Timeout in seconds for `page.goto()` + load event
    pub(crate) page_load_timeout_secs: u64,
    /// Short bound: did *anything* happen after an ad click?
    pub(crate) click_timeout_secs: u64,
    /// Long bound: did the entire clickthrough, landing page included, finish?
    pub(crate) clickthrough_timeout_secs: u64,
    /// Whole-item budget for one seed URL
    pub(crate) item_timeout_secs: u64,
    /// Pause between scroll iterations in milliseconds
    pub(crate) scroll_interval_ms: u64,
    /// Hard cap on scroll iterations per page
    pub(crate) scroll_iteration_cap: u32,
    /// Settle delay after a landing page's load event in milliseconds
    pub(crate) landing_settle_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            url_list: PathBuf::from("./crawl-list.txt"),
            crawl_name: String::from("crawl"),
            db_path: None,
            resume_job_id: None,
            chrome_data_dir: None,
            headless: true,
            scrape_site: true,
            scrape_ads: true,
            click_ads: ClickAdsMode::NoClick,
            screenshot_ads_with_context: false,
            follow_subpages: false,
            max_subpages: 2,
            page_load_timeout_secs: PAGE_LOAD_TIMEOUT_SECS,
            click_timeout_secs: CLICK_TIMEOUT_SECS,
            clickthrough_timeout_secs: CLICKTHROUGH_TIMEOUT_SECS,
            item_timeout_secs: ITEM_TIMEOUT_SECS,
            scroll_interval_ms: SCROLL_INTERVAL_MS,
            scroll_iteration_cap: SCROLL_ITERATION_CAP,
            landing_settle_ms: LANDING_SETTLE_MS,
        }
    }
}

impl CrawlConfig {
    /// Start building a config; `output_dir` and `url_list` are required
    #[must_use]
    pub fn builder() -> CrawlConfigBuilderEntry {
        CrawlConfigBuilderEntry
    }
}

/// Entry point returned by [`CrawlConfig::builder`]
pub struct CrawlConfigBuilderEntry;

impl CrawlConfigBuilderEntry {
    #[must_use]
    pub fn output_dir(
        self,
        dir: impl Into<PathBuf>,
    ) -> super::builder::CrawlConfigBuilder<super::builder::WithOutputDir> {
        super::builder::CrawlConfigBuilder::new_with_output_dir(dir.into())
    }
}

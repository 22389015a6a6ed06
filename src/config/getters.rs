//! Read accessors for `CrawlConfig`

use std::path::{Path, PathBuf};

use super::types::{ClickAdsMode, CrawlConfig};

impl CrawlConfig {
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn url_list(&self) -> &Path {
        &self.url_list
    }

    /// File name of the URL list, used as the job's list identity on resume
    #[must_use]
    pub fn url_list_name(&self) -> String {
        self.url_list
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn crawl_name(&self) -> &str {
        &self.crawl_name
    }

    /// Database path, defaulting to `{output_dir}/adtrail.sqlite`
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("adtrail.sqlite"))
    }

    #[must_use]
    pub fn resume_job_id(&self) -> Option<&str> {
        self.resume_job_id.as_deref()
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&PathBuf> {
        self.chrome_data_dir.as_ref()
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn scrape_site(&self) -> bool {
        self.scrape_site
    }

    #[must_use]
    pub fn scrape_ads(&self) -> bool {
        self.scrape_ads
    }

    #[must_use]
    pub fn click_ads(&self) -> ClickAdsMode {
        self.click_ads
    }

    #[must_use]
    pub fn screenshot_ads_with_context(&self) -> bool {
        self.screenshot_ads_with_context
    }

    #[must_use]
    pub fn follow_subpages(&self) -> bool {
        self.follow_subpages
    }

    #[must_use]
    pub fn max_subpages(&self) -> usize {
        self.max_subpages
    }

    #[must_use]
    pub fn page_load_timeout_secs(&self) -> u64 {
        self.page_load_timeout_secs
    }

    #[must_use]
    pub fn click_timeout_secs(&self) -> u64 {
        self.click_timeout_secs
    }

    #[must_use]
    pub fn clickthrough_timeout_secs(&self) -> u64 {
        self.clickthrough_timeout_secs
    }

    #[must_use]
    pub fn item_timeout_secs(&self) -> u64 {
        self.item_timeout_secs
    }

    #[must_use]
    pub fn scroll_interval_ms(&self) -> u64 {
        self.scroll_interval_ms
    }

    #[must_use]
    pub fn scroll_iteration_cap(&self) -> u32 {
        self.scroll_iteration_cap
    }

    #[must_use]
    pub fn landing_settle_ms(&self) -> u64 {
        self.landing_settle_ms
    }
}

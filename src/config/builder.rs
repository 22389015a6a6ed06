//! Type-safe builder for `CrawlConfig` using the typestate pattern
//!
//! The two fields a crawl cannot run without - the output directory and the
//! seed URL list - are enforced at compile time; everything else has a
//! sensible default.

use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{ClickAdsMode, CrawlConfig};

// Type states for the builder
pub struct WithOutputDir;
pub struct Complete;

pub struct CrawlConfigBuilder<State = ()> {
    pub(crate) inner: CrawlConfig,
    pub(crate) _phantom: PhantomData<State>,
}

impl CrawlConfigBuilder<WithOutputDir> {
    pub(crate) fn new_with_output_dir(dir: PathBuf) -> Self {
        let mut inner = CrawlConfig::default();
        inner.output_dir = dir;
        Self {
            inner,
            _phantom: PhantomData,
        }
    }

    /// Set the seed URL list file, completing the required fields
    #[must_use]
    pub fn url_list(mut self, path: impl Into<PathBuf>) -> CrawlConfigBuilder<Complete> {
        self.inner.url_list = path.into();
        CrawlConfigBuilder {
            inner: self.inner,
            _phantom: PhantomData,
        }
    }
}

impl CrawlConfigBuilder<Complete> {
    #[must_use]
    pub fn crawl_name(mut self, name: impl Into<String>) -> Self {
        self.inner.crawl_name = name.into();
        self
    }

    #[must_use]
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner.db_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn resume_job_id(mut self, id: impl Into<String>) -> Self {
        self.inner.resume_job_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn chrome_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner.chrome_data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.inner.headless = headless;
        self
    }

    #[must_use]
    pub fn scrape_site(mut self, enabled: bool) -> Self {
        self.inner.scrape_site = enabled;
        self
    }

    #[must_use]
    pub fn scrape_ads(mut self, enabled: bool) -> Self {
        self.inner.scrape_ads = enabled;
        self
    }

    #[must_use]
    pub fn click_ads(mut self, mode: ClickAdsMode) -> Self {
        self.inner.click_ads = mode;
        self
    }

    #[must_use]
    pub fn screenshot_ads_with_context(mut self, enabled: bool) -> Self {
        self.inner.screenshot_ads_with_context = enabled;
        self
    }

    #[must_use]
    pub fn follow_subpages(mut self, enabled: bool) -> Self {
        self.inner.follow_subpages = enabled;
        self
    }

    #[must_use]
    pub fn max_subpages(mut self, count: usize) -> Self {
        self.inner.max_subpages = count;
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.inner.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn click_timeout_secs(mut self, secs: u64) -> Self {
        self.inner.click_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn clickthrough_timeout_secs(mut self, secs: u64) -> Self {
        self.inner.clickthrough_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn item_timeout_secs(mut self, secs: u64) -> Self {
        self.inner.item_timeout_secs = secs;
        self
    }

    /// Validate and build the final configuration.
    ///
    /// Scraping the ads requires scraping the pages they sit on; clicking
    /// ads requires scraping ads. Contradictory flag combinations are
    /// configuration errors, not silently reinterpreted.
    pub fn build(mut self) -> Result<CrawlConfig> {
        if self.inner.click_ads != ClickAdsMode::NoClick && !self.inner.scrape_ads {
            return Err(anyhow!(
                "click_ads requires scrape_ads: ads must be discovered before they can be clicked"
            ));
        }
        if self.inner.crawl_name.is_empty() || self.inner.crawl_name == "crawl" {
            // Derive a name from the list file when none was given
            if let Some(stem) = self.inner.url_list.file_stem() {
                self.inner.crawl_name = stem.to_string_lossy().into_owned();
            }
        }
        if self.inner.click_timeout_secs == 0 || self.inner.clickthrough_timeout_secs == 0 {
            return Err(anyhow!("click and clickthrough timeouts must be non-zero"));
        }
        if self.inner.clickthrough_timeout_secs < self.inner.click_timeout_secs {
            return Err(anyhow!(
                "clickthrough timeout ({}s) must not be shorter than the click timeout ({}s)",
                self.inner.clickthrough_timeout_secs,
                self.inner.click_timeout_secs
            ));
        }
        Ok(self.inner)
    }
}

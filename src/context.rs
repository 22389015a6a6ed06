//! Shared state for one crawl run.

use crate::config::CrawlConfig;
use crate::scrape::{AdScraper, PageScraper};
use crate::store::JobStore;

/// Everything the page and clickthrough handlers need, threaded by
/// reference through the run. The store handle is cheap to clone; the
/// scrapers are the pluggable collaborator seams.
pub struct CrawlContext<S, P, A> {
    pub(crate) config: CrawlConfig,
    pub(crate) store: S,
    pub(crate) job_id: String,
    pub(crate) page_scraper: P,
    pub(crate) ad_scraper: A,
}

impl<S, P, A> CrawlContext<S, P, A>
where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    pub fn new(config: CrawlConfig, store: S, job_id: String, page_scraper: P, ad_scraper: A) -> Self {
        Self {
            config,
            store,
            job_id,
            page_scraper,
            ad_scraper,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

pub mod browser;
pub mod clickthrough;
pub mod config;
pub mod context;
pub mod crawl;
pub mod error;
pub mod page_loader;
pub mod scrape;
pub mod store;
pub mod utils;

pub use browser::{BrowserSession, download_managed_browser, find_browser_executable};
pub use clickthrough::{
    CdpInterceptor, ClickOutcome, Detection, LandingHandler, TargetInterceptor, click_ad,
};
pub use config::{ClickAdsMode, CrawlConfig};
pub use context::CrawlContext;
pub use crawl::run_crawl;
pub use error::{ClickthroughError, CrawlError, CrawlResult};
pub use page_loader::PageTarget;
pub use scrape::{AdScraper, DiscoveredAd, NoScrape, PageScraper, SelectorAdScraper};
pub use store::{AdRecord, CrawlJob, JobStore, NewPage, PageRecord, PageType, SqliteStore};

/// Run a crawl with the default collaborators: the SQLite store at the
/// configured path, no content scraper, and the selector-based ad scraper.
pub async fn crawl(config: CrawlConfig) -> Result<(), CrawlError> {
    let store = SqliteStore::open(&config.db_path())
        .await
        .map_err(|e| CrawlError::Store(format!("{e:#}")))?;
    crawl::run_crawl(config, store, NoScrape, SelectorAdScraper::default()).await
}

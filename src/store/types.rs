//! Row types for the job store

use serde::{Deserialize, Serialize};

/// One crawl run over a URL list. Terminal when `completed` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: String,
    pub name: String,
    /// File name of the URL list this job was started with; checked on
    /// resume together with `total_urls`
    pub crawl_list: String,
    pub total_urls: i64,
    /// Index of the next seed URL to process - the resumability checkpoint
    pub current_index: i64,
    /// Unix seconds
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub completed: bool,
    /// Public identity of the crawling host, recorded for later analysis
    pub host_identity: Option<String>,
}

/// Classification of a navigated page within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    /// A seed URL from the crawl list
    Main,
    /// An in-site follow-up page
    Subpage,
    /// The destination an ad click led to
    Landing,
}

impl PageType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Subpage => "subpage",
            Self::Landing => "landing",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(Self::Main),
            "subpage" => Some(Self::Subpage),
            "landing" => Some(Self::Landing),
            _ => None,
        }
    }
}

/// A navigated page the system decided to record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub job_id: String,
    /// Index of the seed URL this page was reached from
    pub seed_index: i64,
    pub url: String,
    /// The seed URL itself
    pub crawl_list_url: String,
    pub page_type: PageType,
    /// For landing pages: the page the clicked ad was on
    pub referrer_page_id: Option<String>,
    pub referrer_page_url: Option<String>,
    /// For landing pages: the ad that produced this page
    pub referrer_ad_id: Option<String>,
    /// Unix seconds
    pub timestamp: i64,
    /// True when only a bare archival record was written (no content scrape)
    pub archived: bool,
}

/// Insert payload for a page record
#[derive(Debug, Clone)]
pub struct NewPage {
    pub job_id: String,
    pub seed_index: i64,
    pub url: String,
    pub crawl_list_url: String,
    pub page_type: PageType,
    pub referrer_page_id: Option<String>,
    pub referrer_page_url: Option<String>,
    pub referrer_ad_id: Option<String>,
}

/// An ad discovered on a page. `url` is unknown at discovery time and
/// resolved exactly once when a clickthrough observes the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdRecord {
    pub id: String,
    pub page_id: String,
    /// Selector the ad element was located with
    pub selector: Option<String>,
    /// Unix seconds
    pub created_at: i64,
    pub url: Option<String>,
}

//! Collaborator seams for content and ad scraping.
//!
//! Real content extraction and ad-creative capture live outside this crate;
//! the crawl core only needs three capabilities: scrape a page's content,
//! locate the ad elements on a page, and install a pre-navigation DOM
//! observer. The default implementations here are deliberately thin - they
//! keep the crawl loop functional without any external scraper attached.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::element::Element;
use chromiumoxide_cdp::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use tracing::{debug, warn};

use crate::store::PageRecord;

/// An ad element located on a page, paired with the selector that found it.
/// The element handle stays valid only while its page is open.
pub struct DiscoveredAd {
    pub element: Element,
    pub selector: String,
}

/// Content-scraping capability, delegated to an external collaborator.
pub trait PageScraper: Send + Sync {
    /// Scrape a page's content. The record has already been persisted; the
    /// scraper receives it for linkage and storage naming.
    fn scrape_page(
        &self,
        page: &Page,
        record: &PageRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Ad-discovery capability, delegated to an external collaborator.
pub trait AdScraper: Send + Sync {
    /// Locate ad elements on a fully loaded, scrolled page.
    fn scrape_ads_on_page(
        &self,
        page: &Page,
    ) -> impl Future<Output = Result<Vec<DiscoveredAd>>> + Send;
}

/// No-op content scraper; the crawl still archives a bare page record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScrape;

impl PageScraper for NoScrape {
    async fn scrape_page(&self, _page: &Page, record: &PageRecord) -> Result<()> {
        debug!("No content scraper attached, page {} recorded only", record.id);
        Ok(())
    }
}

/// Default selector list covering the common ad-network containers.
const AD_SELECTORS: &[&str] = &[
    "ins.adsbygoogle",
    "iframe[id^='google_ads_iframe']",
    "iframe[src*='doubleclick.net']",
    "iframe[src*='adsystem']",
    "div[id^='div-gpt-ad']",
    "[data-ad-slot]",
    "a[href*='utm_source=taboola']",
    "[id^='taboola-']",
];

/// Selector-driven ad scraper: queries a fixed list of CSS selectors and
/// returns every match. Duplicate detection is left to the selectors being
/// mutually exclusive in practice; a double-discovered element just yields
/// two ad rows pointing at the same creative.
#[derive(Debug, Clone)]
pub struct SelectorAdScraper {
    selectors: Vec<String>,
}

impl Default for SelectorAdScraper {
    fn default() -> Self {
        Self {
            selectors: AD_SELECTORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl SelectorAdScraper {
    #[must_use]
    pub fn new(selectors: Vec<String>) -> Self {
        Self { selectors }
    }
}

impl AdScraper for SelectorAdScraper {
    async fn scrape_ads_on_page(&self, page: &Page) -> Result<Vec<DiscoveredAd>> {
        let mut ads = Vec::new();
        for selector in &self.selectors {
            match page.find_elements(selector.as_str()).await {
                Ok(elements) => {
                    for element in elements {
                        ads.push(DiscoveredAd {
                            element,
                            selector: selector.clone(),
                        });
                    }
                }
                Err(e) => {
                    // A selector with no matches errors in CDP; only log at
                    // debug since most selectors won't match most pages
                    debug!("Selector {selector} matched nothing: {e}");
                }
            }
        }
        debug!("Discovered {} ad elements", ads.len());
        Ok(ads)
    }
}

/// JS installed before navigation so ads inserted during load are observed.
/// Matches collected under `window.__adtrail_ads` for the ad scraper.
const DOM_LISTENER_JS: &str = r#"
(() => {
  window.__adtrail_ads = [];
  const seen = new WeakSet();
  const record = (node) => {
    if (!(node instanceof Element) || seen.has(node)) return;
    const tag = node.tagName.toLowerCase();
    if (tag === 'ins' || tag === 'iframe' || node.hasAttribute('data-ad-slot')) {
      seen.add(node);
      window.__adtrail_ads.push({ tag, id: node.id || null, ts: Date.now() });
    }
  };
  const observer = new MutationObserver((mutations) => {
    for (const m of mutations) {
      for (const node of m.addedNodes) record(node);
    }
  });
  observer.observe(document.documentElement, { childList: true, subtree: true });
})();
"#;

/// Install the DOM-level ad observer on a tab.
///
/// Must run before navigation: the observer has to exist when the document
/// starts executing, or ads inserted during load are missed.
pub async fn inject_dom_listener(page: &Page) -> Result<()> {
    let params = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(DOM_LISTENER_JS)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build DOM listener script: {e}"))?;
    page.execute(params)
        .await
        .context("Failed to install DOM ad observer")?;
    Ok(())
}

/// Read back what the DOM observer saw, for diagnostics.
pub async fn dom_listener_hits(page: &Page) -> usize {
    match page
        .evaluate("window.__adtrail_ads ? window.__adtrail_ads.length : 0")
        .await
    {
        Ok(result) => result.into_value::<usize>().unwrap_or(0),
        Err(e) => {
            warn!("Failed to read DOM observer results: {e}");
            0
        }
    }
}

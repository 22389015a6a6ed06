//! Per-page handling: navigate, scroll, record, scrape, click.
//!
//! One call handles one tab end to end. Seed and subpage tabs are navigated
//! here; landing tabs arrive already loaded from the clickthrough handler
//! and skip straight to the post-load pipeline. Failures below the page
//! level (one ad, one subpage, one screenshot) are logged and contained so
//! the rest of the page still completes.

use anyhow::{Context, Result};
use base64::Engine as _;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide_cdp::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use futures::future::BoxFuture;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clickthrough::{self, CdpInterceptor, LandingHandler};
use crate::config::ClickAdsMode;
use crate::context::CrawlContext;
use crate::scrape::{self, AdScraper, DiscoveredAd, PageScraper};
use crate::store::{JobStore, NewPage, PageType};
use crate::utils::constants::{SCROLL_DELTA_MAX, SCROLL_DELTA_MIN};
use crate::utils::with_timeout;

/// Where a tab should go and how its record links back to its origin.
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub url: String,
    pub seed_index: i64,
    pub crawl_list_url: String,
    pub page_type: PageType,
    pub referrer_page_id: Option<String>,
    pub referrer_page_url: Option<String>,
    pub referrer_ad_id: Option<String>,
}

impl PageTarget {
    /// A seed URL straight from the crawl list.
    #[must_use]
    pub fn seed(url: String, seed_index: i64) -> Self {
        Self {
            crawl_list_url: url.clone(),
            url,
            seed_index,
            page_type: PageType::Main,
            referrer_page_id: None,
            referrer_page_url: None,
            referrer_ad_id: None,
        }
    }

    fn subpage(url: String, parent: &PageTarget, parent_id: &str, parent_url: &str) -> Self {
        Self {
            url,
            seed_index: parent.seed_index,
            crawl_list_url: parent.crawl_list_url.clone(),
            page_type: PageType::Subpage,
            referrer_page_id: Some(parent_id.to_string()),
            referrer_page_url: Some(parent_url.to_string()),
            referrer_ad_id: None,
        }
    }

    fn landing(
        url: String,
        parent: &PageTarget,
        parent_id: &str,
        parent_url: &str,
        ad_id: &str,
    ) -> Self {
        Self {
            url,
            seed_index: parent.seed_index,
            crawl_list_url: parent.crawl_list_url.clone(),
            page_type: PageType::Landing,
            referrer_page_id: Some(parent_id.to_string()),
            referrer_page_url: Some(parent_url.to_string()),
            referrer_ad_id: Some(ad_id.to_string()),
        }
    }
}

/// Navigate a fresh tab to its target and run the full post-load pipeline.
pub async fn load_and_handle_page<S, P, A>(
    ctx: &CrawlContext<S, P, A>,
    browser: &Browser,
    page: &Page,
    target: PageTarget,
) -> Result<()>
where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    // The DOM observer must exist before the document starts executing
    scrape::inject_dom_listener(page).await?;

    info!("Loading {} ({})", target.url, target.page_type.as_str());
    with_timeout(
        async {
            page.goto(target.url.as_str())
                .await
                .context("Navigation failed")?;
            page.wait_for_navigation()
                .await
                .context("Load event did not fire")?;
            Ok(())
        },
        ctx.config.page_load_timeout_secs(),
        "Page load",
    )
    .await?;

    handle_loaded_page(ctx, browser, page, target).await
}

/// Post-load pipeline for a tab that is already on its destination:
/// scroll, record, scrape content, discover and click ads, follow subpages.
///
/// Returns a boxed future: landing pages and subpages recurse back into
/// this function, and boxing at the definition keeps the recursive future a
/// concrete, `Send` type.
pub fn handle_loaded_page<'a, S, P, A>(
    ctx: &'a CrawlContext<S, P, A>,
    browser: &'a Browser,
    page: &'a Page,
    target: PageTarget,
) -> BoxFuture<'a, Result<()>>
where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    Box::pin(async move {
        scroll_page(page, ctx.config.scroll_interval_ms(), ctx.config.scroll_iteration_cap())
            .await;

        // Redirects are common; record where the tab actually ended up
        let final_url = match page.url().await {
            Ok(Some(url)) if !url.is_empty() => url,
            _ => target.url.clone(),
        };

        let new_page = NewPage {
            job_id: ctx.job_id.clone(),
            seed_index: target.seed_index,
            url: final_url.clone(),
            crawl_list_url: target.crawl_list_url.clone(),
            page_type: target.page_type,
            referrer_page_id: target.referrer_page_id.clone(),
            referrer_page_url: target.referrer_page_url.clone(),
            referrer_ad_id: target.referrer_ad_id.clone(),
        };
        // Without a content scrape the row is a bare archival record
        let page_id = if ctx.config.scrape_site() {
            ctx.store.insert_page(new_page).await?
        } else {
            ctx.store.archive_page(new_page).await?
        };

        if ctx.config.scrape_site()
            && let Some(record) = ctx.store.get_page(&page_id).await?
            && let Err(e) = ctx.page_scraper.scrape_page(page, &record).await
        {
            warn!("Content scrape of {final_url} failed: {e:#}");
        }

        if ctx.config.scrape_ads() {
            let observed = scrape::dom_listener_hits(page).await;
            debug!("DOM observer saw {observed} ad insertions on {final_url}");
            handle_ads(ctx, browser, page, &target, &page_id, &final_url).await;
        }

        if target.page_type == PageType::Main && ctx.config.follow_subpages() {
            follow_subpages(ctx, browser, page, &target, &page_id, &final_url).await;
        }

        Ok(())
    })
}

/// Discover ads, record them, and click each one in isolation: a failed or
/// timed-out clickthrough never takes down the page, only that ad.
async fn handle_ads<S, P, A>(
    ctx: &CrawlContext<S, P, A>,
    browser: &Browser,
    page: &Page,
    target: &PageTarget,
    page_id: &str,
    page_url: &str,
) where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    let ads = match ctx.ad_scraper.scrape_ads_on_page(page).await {
        Ok(ads) => ads,
        Err(e) => {
            warn!("Ad discovery on {page_url} failed: {e:#}");
            return;
        }
    };
    info!("Found {} ad elements on {page_url}", ads.len());

    if ctx.config.screenshot_ads_with_context() && !ads.is_empty() {
        capture_context_screenshot(ctx, page, page_id).await;
    }

    // Landing pages carry ads too, but clicking them would chain
    // clickthroughs without bound; record only
    let clicks_enabled =
        ctx.config.click_ads() != ClickAdsMode::NoClick && target.page_type != PageType::Landing;

    for ad in &ads {
        let ad_id = match ctx.store.insert_ad(page_id, Some(&ad.selector)).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to record ad ({}): {e:#}", ad.selector);
                continue;
            }
        };
        if !clicks_enabled {
            continue;
        }
        click_one_ad(ctx, browser, page, target, page_id, page_url, ad, &ad_id).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn click_one_ad<S, P, A>(
    ctx: &CrawlContext<S, P, A>,
    browser: &Browser,
    page: &Page,
    target: &PageTarget,
    page_id: &str,
    page_url: &str,
    ad: &DiscoveredAd,
    ad_id: &str,
) where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    let interceptor = CdpInterceptor::new(browser);

    // In follow mode the landing page is handled inside the clickthrough
    // deadline; a landing scrape that stalls resolves as a clickthrough
    // timeout instead of eating into the whole item budget
    let on_landing: Option<LandingHandler<'_>> =
        if ctx.config.click_ads().follows_destination() {
            Some(Box::new(move |landing: Page, destination: String| {
                let landing_target =
                    PageTarget::landing(destination, target, page_id, page_url, ad_id);
                Box::pin(
                    async move { handle_loaded_page(ctx, browser, &landing, landing_target).await },
                )
            }))
        } else {
            None
        };

    match clickthrough::click_ad(
        browser,
        page,
        &interceptor,
        &ctx.store,
        ad,
        ad_id,
        &ctx.config,
        on_landing,
    )
    .await
    {
        Ok(outcome) => info!(
            "Ad {ad_id} resolved as {} -> {}",
            outcome.kind(),
            outcome.destination()
        ),
        Err(e) => warn!("Clickthrough for ad {ad_id} failed: {e}"),
    }
}

/// Follow a bounded number of same-site links, each in its own tab.
async fn follow_subpages<S, P, A>(
    ctx: &CrawlContext<S, P, A>,
    browser: &Browser,
    page: &Page,
    target: &PageTarget,
    page_id: &str,
    page_url: &str,
) where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    let links = match collect_subpage_links(page, ctx.config.max_subpages()).await {
        Ok(links) => links,
        Err(e) => {
            warn!("Subpage link collection on {page_url} failed: {e:#}");
            return;
        }
    };

    for link in links {
        let tab = match browser.new_page("about:blank").await {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Failed to open subpage tab: {e}");
                continue;
            }
        };
        let sub_target = PageTarget::subpage(link.clone(), target, page_id, page_url);
        if let Err(e) = load_and_handle_page(ctx, browser, &tab, sub_target).await {
            warn!("Subpage {link} failed: {e:#}");
        }
        if let Err(e) = tab.close().await {
            debug!("Subpage tab close failed: {e}");
        }
    }
}

/// Distinct same-origin links, document order, excluding self and fragments.
async fn collect_subpage_links(page: &Page, max: usize) -> Result<Vec<String>> {
    let js = r"
(() => {
  const seen = new Set();
  const links = [];
  for (const a of document.querySelectorAll('a[href]')) {
    const href = a.href.split('#')[0];
    if (!href.startsWith(location.origin)) continue;
    if (href === location.href.split('#')[0]) continue;
    if (seen.has(href)) continue;
    seen.add(href);
    links.push(href);
  }
  return links;
})()
";
    let links: Vec<String> = page
        .evaluate(js)
        .await
        .context("Failed to collect subpage links")?
        .into_value()
        .context("Unexpected subpage link payload")?;
    Ok(links.into_iter().take(max).collect())
}

/// Full-page screenshot of the publisher page with its ads in place.
async fn capture_context_screenshot<S, P, A>(ctx: &CrawlContext<S, P, A>, page: &Page, page_id: &str)
where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    let params = CaptureScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .capture_beyond_viewport(true)
        .build();
    let resp = match page.execute(params).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Context screenshot capture failed: {e}");
            return;
        }
    };
    let data_b64: &str = resp.data.as_ref();
    let bytes = match base64::engine::general_purpose::STANDARD.decode(data_b64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Context screenshot decode failed: {e}");
            return;
        }
    };

    let dir = ctx.config.output_dir().join("screenshots");
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        warn!("Failed to create screenshot directory: {e}");
        return;
    }
    let path = dir.join(format!("{page_id}.png"));
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => info!("Saved context screenshot to {}", path.display()),
        Err(e) => warn!("Failed to write context screenshot: {e}"),
    }
}

#[derive(Debug, Deserialize)]
struct ScrollMetrics {
    scroll_y: f64,
    viewport_height: f64,
    content_height: f64,
}

const SCROLL_METRICS_JS: &str = r"
(() => ({
  scroll_y: window.scrollY,
  viewport_height: window.innerHeight,
  content_height: document.documentElement.scrollHeight
}))()
";

/// Whether another scroll step is warranted.
fn scroll_again(metrics: &ScrollMetrics, iteration: u32, cap: u32) -> bool {
    if iteration >= cap {
        return false;
    }
    // Sub-pixel slack so a page exactly at the bottom terminates
    metrics.scroll_y + metrics.viewport_height < metrics.content_height - 1.0
}

/// Scroll through the page the way a reader would: wheel events with
/// jittered deltas, paced by the scroll interval, until the bottom or the
/// iteration cap. Lazy-loaded ad slots fill in as the viewport passes them.
/// Never fails the page; a tab that cannot report metrics just stops
/// scrolling.
async fn scroll_page(page: &Page, interval_ms: u64, cap: u32) {
    let mut iteration = 0u32;
    loop {
        let metrics: ScrollMetrics = match page.evaluate(SCROLL_METRICS_JS).await {
            Ok(result) => match result.into_value() {
                Ok(metrics) => metrics,
                Err(e) => {
                    debug!("Scroll metrics payload unreadable: {e}");
                    break;
                }
            },
            Err(e) => {
                debug!("Scroll metrics evaluation failed: {e}");
                break;
            }
        };
        if !scroll_again(&metrics, iteration, cap) {
            break;
        }

        // rand handles are not held across awaits
        let (x, y, delta) = {
            let mut rng = rand::rng();
            (
                rng.random_range(200.0..1100.0_f64),
                rng.random_range(200.0..600.0_f64),
                rng.random_range(SCROLL_DELTA_MIN..=SCROLL_DELTA_MAX),
            )
        };

        if let Err(e) = dispatch_scroll(page, x, y, delta).await {
            debug!("Scroll dispatch failed: {e:#}");
            break;
        }

        iteration += 1;
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }
    debug!("Scrolled {iteration} iterations");
}

/// Move the cursor, then wheel. Real input events, not script scrolling, so
/// viewability trackers count the impressions.
async fn dispatch_scroll(page: &Page, x: f64, y: f64, delta: f64) -> Result<()> {
    let mouse_move = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseMoved)
        .x(x)
        .y(y)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build mouse move: {e}"))?;
    page.execute(mouse_move)
        .await
        .context("Mouse move dispatch failed")?;

    let wheel = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseWheel)
        .x(x)
        .y(y)
        .button(MouseButton::None)
        .delta_x(0.0)
        .delta_y(delta)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build wheel event: {e}"))?;
    page.execute(wheel)
        .await
        .context("Wheel dispatch failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_y: f64, viewport_height: f64, content_height: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_y,
            viewport_height,
            content_height,
        }
    }

    #[test]
    fn short_page_never_scrolls() {
        // Content fits the viewport: zero iterations, not one
        assert!(!scroll_again(&metrics(0.0, 768.0, 500.0), 0, 20));
    }

    #[test]
    fn mid_page_keeps_scrolling() {
        assert!(scroll_again(&metrics(800.0, 768.0, 5000.0), 3, 20));
    }

    #[test]
    fn bottom_of_page_stops() {
        assert!(!scroll_again(&metrics(4232.0, 768.0, 5000.0), 7, 20));
    }

    #[test]
    fn iteration_cap_is_a_hard_stop() {
        // An infinitely-growing feed still terminates
        assert!(!scroll_again(&metrics(10_000.0, 768.0, 1_000_000.0), 20, 20));
    }

    #[test]
    fn seed_target_links_to_itself() {
        let target = PageTarget::seed("https://news.example/".into(), 4);
        assert_eq!(target.crawl_list_url, target.url);
        assert_eq!(target.page_type, PageType::Main);
        assert!(target.referrer_ad_id.is_none());
    }

    #[test]
    fn landing_target_carries_full_provenance() {
        let seed = PageTarget::seed("https://news.example/".into(), 4);
        let landing = PageTarget::landing(
            "https://advertiser.example/offer".into(),
            &seed,
            "page-1",
            "https://news.example/",
            "ad-9",
        );
        assert_eq!(landing.page_type, PageType::Landing);
        assert_eq!(landing.seed_index, 4);
        assert_eq!(landing.referrer_page_id.as_deref(), Some("page-1"));
        assert_eq!(landing.referrer_ad_id.as_deref(), Some("ad-9"));
        assert_eq!(landing.crawl_list_url, "https://news.example/");
    }
}

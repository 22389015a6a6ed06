//! Shared timing and browser constants for adtrail
//!
//! This module contains default values used throughout the codebase to
//! ensure consistency and avoid magic numbers. Every component reads these
//! through `CrawlConfig`; nothing looks them up ambiently at runtime.

/// Page navigation budget: 120 seconds
///
/// Upper bound for `page.goto()` plus the load event. Ad-heavy pages are
/// slow, so this is deliberately generous; a page that cannot load within
/// two minutes fails the whole crawl item.
pub const PAGE_LOAD_TIMEOUT_SECS: u64 = 120;

/// Click detection budget: 10 seconds
///
/// After clicking an ad, how long to wait for *anything* to happen -
/// a blocked navigation, a popup target, or a low-level attach. If none of
/// the three detection paths fires within this bound the click is abandoned.
pub const CLICK_TIMEOUT_SECS: u64 = 10;

/// Clickthrough budget: 30 seconds
///
/// Bound on the entire follow-through of a single ad click, including the
/// landing page load and scrape. Longer than the click budget because it
/// covers a full page handling cycle.
pub const CLICKTHROUGH_TIMEOUT_SECS: u64 = 30;

/// Per-URL overall budget: 15 minutes
///
/// Everything done for one seed URL - navigation, scroll, scrape, every ad
/// clickthrough - must finish within this bound. The crawl loop tears the
/// tab down and advances the checkpoint when it expires.
pub const ITEM_TIMEOUT_SECS: u64 = 900;

/// Pause between scroll iterations: 1 second
pub const SCROLL_INTERVAL_MS: u64 = 1000;

/// Maximum scroll iterations per page
///
/// Hard bound against infinite-scroll pages; after this many wheel events
/// the page is considered scrolled regardless of remaining height.
pub const SCROLL_ITERATION_CAP: u32 = 20;

/// Randomized wheel delta range in CSS pixels
pub const SCROLL_DELTA_MIN: f64 = 200.0;
pub const SCROLL_DELTA_MAX: f64 = 400.0;

/// Settle delay after a landing page load event: 2 seconds
///
/// Ad destinations frequently chain client-side redirects right after load;
/// the settle delay lets the final URL stabilize before it is recorded.
pub const LANDING_SETTLE_MS: u64 = 2000;

/// Fixed viewport for every tab
pub const VIEWPORT_WIDTH: u32 = 1366;
pub const VIEWPORT_HEIGHT: u32 = 768;

/// Chrome user agent string for stealth mode
///
/// Release schedule: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

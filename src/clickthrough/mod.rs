//! Ad clickthrough: resolve where an ad leads without letting it take over.
//!
//! A click on an ad element can surface as a same-tab navigation, a popup,
//! or - before either of those is visible - a low-level target attach. All
//! three channels are armed before the click, raced to a single committed
//! detection, and then handled according to the configured mode: record the
//! destination and stop, or follow it into a landing tab.
//!
//! The original tab must stay on the publisher page throughout. Same-tab
//! navigations are therefore intercepted at the request stage and failed;
//! in follow mode the destination is re-opened in a tab of our own.

pub mod interceptor;
pub mod race;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide_cdp::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CloseTargetParams, EventTargetCreated, TargetId,
};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::error::ClickthroughError;
use crate::scrape::DiscoveredAd;
use crate::store::JobStore;

pub use interceptor::{CdpInterceptor, PopupSighting, TargetInterceptor};
pub use race::{Detection, first_detection};

/// How a single ad click resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Same-tab navigation intercepted and stopped; destination recorded.
    BlockedAndStopped { destination: String },
    /// Same-tab navigation intercepted, destination re-opened and handled
    /// in a tab of our own.
    BlockedAndFollowed { destination: String },
    /// Popup caught and torn down before it rendered.
    PopupBlocked { destination: String },
    /// Popup allowed to load and handled as the landing tab.
    PopupFollowed { destination: String },
}

impl ClickOutcome {
    #[must_use]
    pub fn destination(&self) -> &str {
        match self {
            Self::BlockedAndStopped { destination }
            | Self::BlockedAndFollowed { destination }
            | Self::PopupBlocked { destination }
            | Self::PopupFollowed { destination } => destination,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BlockedAndStopped { .. } => "blocked-and-stopped",
            Self::BlockedAndFollowed { .. } => "blocked-and-followed",
            Self::PopupBlocked { .. } => "popup-blocked",
            Self::PopupFollowed { .. } => "popup-followed",
        }
    }
}

/// Caller-supplied handling for a followed landing tab, given the tab and
/// its destination URL. Runs inside the clickthrough deadline; the tab
/// itself stays owned by the click handler, which closes it afterwards.
pub type LandingHandler<'a> =
    Box<dyn FnOnce(Page, String) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'a>;

type PendingNav = Arc<Mutex<Option<fetch::RequestId>>>;

/// The three armed detection channels plus the state cleanup needs.
struct ArmedChannels {
    streams: Vec<BoxStream<'static, Detection>>,
    pumps: Vec<JoinHandle<()>>,
    /// A main-document request left paused by the navigation channel. It is
    /// failed on commit or during cleanup so the original tab never follows
    /// the ad on its own.
    pending_nav: PendingNav,
}

/// Click one ad and resolve its destination.
///
/// All detection channels are armed before the click so nothing can slip
/// through between click and arm. The whole operation - click, detection,
/// follow-through including the landing handler - runs under the
/// clickthrough timeout; detection alone runs under the shorter click
/// timeout. The destination URL is persisted as soon as it is known, so a
/// later follow-through failure cannot lose it.
pub async fn click_ad<S, I>(
    browser: &Browser,
    page: &Page,
    interceptor: &I,
    store: &S,
    ad: &DiscoveredAd,
    ad_id: &str,
    config: &CrawlConfig,
    on_landing: Option<LandingHandler<'_>>,
) -> Result<ClickOutcome, ClickthroughError>
where
    S: JobStore,
    I: TargetInterceptor,
{
    let page_url = page
        .url()
        .await
        .context("Failed to read page URL before click")?
        .unwrap_or_default();
    let main_frame = page
        .mainframe()
        .await
        .context("Failed to resolve main frame")?
        .ok_or_else(|| ClickthroughError::SessionLost("page has no main frame".into()))?;

    let channels = arm_channels(browser, page, interceptor, &page_url, main_frame).await?;
    let ArmedChannels {
        streams,
        pumps,
        pending_nav,
    } = channels;

    // Landing target opened during follow-through, so the timeout path can
    // reap it even though the inner future was dropped
    let opened: Arc<Mutex<Option<TargetId>>> = Arc::new(Mutex::new(None));

    let click_timeout = Duration::from_secs(config.click_timeout_secs());
    let clickthrough_timeout = Duration::from_secs(config.clickthrough_timeout_secs());
    let follow = config.click_ads().follows_destination();

    let inner = async {
        if let Err(e) = ad.element.scroll_into_view().await {
            debug!("Scroll-into-view before ad click failed: {e}");
        }
        ad.element
            .click()
            .await
            .map_err(|e| ClickthroughError::ClickFailed(e.to_string()))?;

        let detection = race::first_detection(streams, click_timeout).await?;
        info!(
            url = detection.url(),
            "Ad click detected via {}",
            match &detection {
                Detection::Navigation { .. } => "same-tab navigation",
                Detection::Popup { .. } => "popup creation",
                Detection::LowLevel { .. } => "low-level attach",
            }
        );
        // Only the navigation channel sees the real destination up front;
        // popup targets are usually still on about:blank at creation, and
        // persisting that would burn the write-once slot
        if let Detection::Navigation { url, .. } = &detection {
            persist_destination(store, ad_id, url).await;
        }

        match detection {
            Detection::Navigation { request_id, url } => {
                // Fail the paused request first: whatever happens next, the
                // original tab stays on the publisher page
                let fail = FailRequestParams::new(
                    fetch::RequestId::from(request_id),
                    ErrorReason::BlockedByClient,
                );
                page.execute(fail)
                    .await
                    .context("Failed to block same-tab ad navigation")?;
                pending_nav.lock().await.take();

                if follow {
                    // Auto-attach would pause our own landing tab too
                    interceptor.disarm().await?;
                    let landing = browser
                        .new_page(url.as_str())
                        .await
                        .context("Failed to open landing tab")?;
                    *opened.lock().await = Some(landing.target_id().clone());
                    settle_landing(&landing, config.landing_settle_ms()).await;
                    handle_landing(on_landing, &landing, &url, ad_id).await;
                    close_landing(&opened, &landing).await;
                    Ok(ClickOutcome::BlockedAndFollowed { destination: url })
                } else {
                    Ok(ClickOutcome::BlockedAndStopped { destination: url })
                }
            }
            Detection::Popup { target_id, url } | Detection::LowLevel { target_id, url } => {
                if follow {
                    *opened.lock().await = Some(TargetId::from(target_id.clone()));
                    interceptor.resume(&target_id).await?;
                    let wanted = TargetId::from(target_id.clone());
                    let landing = browser
                        .pages()
                        .await
                        .context("Failed to list pages for popup")?
                        .into_iter()
                        .find(|p| p.target_id() == &wanted)
                        .ok_or_else(|| {
                            ClickthroughError::SessionLost(format!(
                                "popup {target_id} vanished before follow"
                            ))
                        })?;
                    settle_landing(&landing, config.landing_settle_ms()).await;
                    // The real destination is wherever the popup ended up
                    let destination = match landing.url().await {
                        Ok(Some(u)) if !u.is_empty() => u,
                        _ => url,
                    };
                    persist_destination(store, ad_id, &destination).await;
                    handle_landing(on_landing, &landing, &destination, ad_id).await;
                    close_landing(&opened, &landing).await;
                    Ok(ClickOutcome::PopupFollowed { destination })
                } else {
                    let observed = interceptor.block_popup(&target_id, &url).await?;
                    persist_destination(store, ad_id, &observed).await;
                    Ok(ClickOutcome::PopupBlocked {
                        destination: observed,
                    })
                }
            }
        }
    };

    let reap = async {
        if let Some(target_id) = opened.lock().await.take() {
            debug!("Reaping landing target left open by clickthrough timeout");
            if let Err(e) = browser.execute(CloseTargetParams::new(target_id)).await {
                debug!("Landing target close after timeout failed: {e}");
            }
        }
    };
    let outcome = under_deadline(clickthrough_timeout, inner, reap).await;

    cleanup(page, interceptor, pumps, &pending_nav).await;
    outcome
}

/// Bound the whole follow-through, landing handling included. On expiry the
/// inner future is dropped, the reaper closes whatever tab it left open,
/// and the attempt resolves as a clickthrough timeout.
async fn under_deadline<F, R>(
    deadline: Duration,
    inner: F,
    reap: R,
) -> Result<ClickOutcome, ClickthroughError>
where
    F: Future<Output = Result<ClickOutcome, ClickthroughError>>,
    R: Future<Output = ()>,
{
    match tokio::time::timeout(deadline, inner).await {
        Ok(result) => result,
        Err(_) => {
            reap.await;
            Err(ClickthroughError::ClickthroughTimeout(deadline.as_secs()))
        }
    }
}

/// Run the caller's landing handling. A handler failure abandons only the
/// landing scrape; the clickthrough still resolves with its outcome.
async fn handle_landing(
    handler: Option<LandingHandler<'_>>,
    landing: &Page,
    destination: &str,
    ad_id: &str,
) {
    if let Some(handler) = handler
        && let Err(e) = handler(landing.clone(), destination.to_string()).await
    {
        warn!("Landing page handling for ad {ad_id} failed: {e:#}");
    }
}

/// Close a landing tab we are done with and clear it from the reap slot.
async fn close_landing(opened: &Mutex<Option<TargetId>>, landing: &Page) {
    opened.lock().await.take();
    if let Err(e) = landing.clone().close().await {
        debug!("Landing tab close failed: {e}");
    }
}

/// Arm all three detection channels. Must complete before the click.
async fn arm_channels<I>(
    browser: &Browser,
    page: &Page,
    interceptor: &I,
    page_url: &str,
    main_frame: chromiumoxide_cdp::cdp::browser_protocol::page::FrameId,
) -> Result<ArmedChannels, ClickthroughError>
where
    I: TargetInterceptor,
{
    let pending_nav: PendingNav = Arc::new(Mutex::new(None));
    let mut streams = Vec::with_capacity(3);
    let mut pumps = Vec::with_capacity(3);

    // Channel 1: same-tab navigation, caught paused at the request stage
    {
        let listener = page
            .event_listener::<EventRequestPaused>()
            .await
            .context("Failed to listen for paused requests")?;
        let pattern = RequestPattern::builder()
            .url_pattern("*")
            .resource_type(ResourceType::Document)
            .request_stage(RequestStage::Request)
            .build();
        page.execute(fetch::EnableParams::builder().patterns(vec![pattern]).build())
            .await
            .context("Failed to enable request interception")?;

        let (tx, rx) = mpsc::channel(4);
        let pump_page = page.clone();
        let page_url = page_url.to_string();
        let pending = Arc::clone(&pending_nav);
        pumps.push(tokio::spawn(async move {
            let mut listener = listener;
            while let Some(event) = listener.next().await {
                let is_main_document_nav = event.resource_type == ResourceType::Document
                    && event.frame_id == main_frame
                    && event.request.url != page_url;
                if is_main_document_nav {
                    *pending.lock().await = Some(event.request_id.clone());
                    let _ = tx
                        .send(Detection::Navigation {
                            request_id: event.request_id.inner().clone(),
                            url: event.request.url.clone(),
                        })
                        .await;
                } else {
                    // Subframe and non-document requests are none of our
                    // business; let them through
                    let cont = ContinueRequestParams::new(event.request_id.clone());
                    if let Err(e) = pump_page.execute(cont).await {
                        debug!("Continuing unrelated paused request failed: {e}");
                    }
                }
            }
        }));
        streams.push(ReceiverStream::new(rx).boxed());
    }

    // Channel 2: popup creation, keyed on the clicked page as opener
    {
        let listener = browser
            .event_listener::<EventTargetCreated>()
            .await
            .context("Failed to listen for created targets")?;
        let opener = page.target_id().clone();
        let (tx, rx) = mpsc::channel(4);
        pumps.push(tokio::spawn(async move {
            let mut listener = listener;
            while let Some(event) = listener.next().await {
                let info = &event.target_info;
                if info.r#type == "page" && info.opener_id.as_ref() == Some(&opener) {
                    let _ = tx
                        .send(Detection::Popup {
                            target_id: info.target_id.inner().clone(),
                            url: info.url.clone(),
                        })
                        .await;
                }
            }
        }));
        streams.push(ReceiverStream::new(rx).boxed());
    }

    // Channel 3: low-level auto-attach, sees popups before they execute
    {
        let sightings = interceptor.arm(page.target_id()).await?;
        let (tx, rx) = mpsc::channel(4);
        pumps.push(tokio::spawn(async move {
            let mut sightings = sightings;
            while let Some(sighting) = sightings.next().await {
                let _ = tx
                    .send(Detection::LowLevel {
                        target_id: sighting.target_id,
                        url: sighting.url,
                    })
                    .await;
            }
        }));
        streams.push(ReceiverStream::new(rx).boxed());
    }

    Ok(ArmedChannels {
        streams,
        pumps,
        pending_nav,
    })
}

/// Wait for the landing tab's navigation to commit, then give client-side
/// redirects a moment to land.
async fn settle_landing(landing: &Page, settle_ms: u64) {
    if let Err(e) = landing.wait_for_navigation().await {
        debug!("Landing navigation wait ended early: {e}");
    }
    tokio::time::sleep(Duration::from_millis(settle_ms)).await;
}

/// Record the ad's destination. First observation wins; a failure here is
/// logged but never aborts the follow-through. Placeholder URLs never claim
/// the write-once slot.
async fn persist_destination<S: JobStore>(store: &S, ad_id: &str, url: &str) {
    if url.is_empty() || url == "about:blank" {
        return;
    }
    match store.set_ad_url(ad_id, url).await {
        Ok(true) => debug!("Recorded destination for ad {ad_id}: {url}"),
        Ok(false) => debug!("Destination for ad {ad_id} already recorded"),
        Err(e) => warn!("Failed to persist destination for ad {ad_id}: {e}"),
    }
}

/// Tear down everything the click armed. Idempotent and best-effort: every
/// step runs regardless of how the click resolved.
async fn cleanup<I: TargetInterceptor>(
    page: &Page,
    interceptor: &I,
    pumps: Vec<JoinHandle<()>>,
    pending_nav: &PendingNav,
) {
    for pump in pumps {
        pump.abort();
    }

    // A request still paused here belongs to a losing or abandoned path;
    // fail it before disabling interception or the tab would navigate away
    if let Some(request_id) = pending_nav.lock().await.take() {
        let fail = FailRequestParams::new(request_id, ErrorReason::Aborted);
        if let Err(e) = page.execute(fail).await {
            debug!("Failing leftover paused navigation failed: {e}");
        }
    }

    if let Err(e) = page.execute(fetch::DisableParams::default()).await {
        debug!("Disabling request interception failed: {e}");
    }
    disarm_quietly(interceptor).await;
}

/// Revert auto-attach without letting a dead session turn teardown into an
/// error.
async fn disarm_quietly<I: TargetInterceptor>(interceptor: &I) {
    if let Err(e) = interceptor.disarm().await {
        debug!("Disarming low-level interception failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewPage, PageType, SqliteStore};
    use anyhow::Result;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingInterceptor {
        disarmed: AtomicBool,
    }

    impl TargetInterceptor for RecordingInterceptor {
        type Sightings = BoxStream<'static, PopupSighting>;

        async fn arm(&self, _opener: &TargetId) -> Result<Self::Sightings> {
            Ok(futures::stream::pending::<PopupSighting>().boxed())
        }

        async fn disarm(&self) -> Result<()> {
            self.disarmed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn resume(&self, _target_id: &str) -> Result<()> {
            Ok(())
        }

        async fn block_popup(&self, _target_id: &str, fallback_url: &str) -> Result<String> {
            Ok(fallback_url.to_string())
        }
    }

    #[tokio::test]
    async fn slow_follow_through_times_out_reaps_and_disarms() {
        let reaped = Arc::new(AtomicBool::new(false));
        let reap_flag = Arc::clone(&reaped);

        // A follow-through that never finishes, standing in for a landing
        // page whose handling stalls
        let inner = std::future::pending::<Result<ClickOutcome, ClickthroughError>>();
        let result = under_deadline(Duration::from_millis(50), inner, async move {
            reap_flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(matches!(
            result,
            Err(ClickthroughError::ClickthroughTimeout(_))
        ));
        assert!(reaped.load(Ordering::SeqCst), "timeout path must reap");

        // The same exit still reverts auto-attach during teardown
        let interceptor = RecordingInterceptor::default();
        disarm_quietly(&interceptor).await;
        assert!(interceptor.disarmed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn prompt_follow_through_resolves_inside_the_deadline() {
        let inner = async {
            Ok(ClickOutcome::BlockedAndStopped {
                destination: "https://advertiser.test/offer".into(),
            })
        };
        let outcome = under_deadline(Duration::from_secs(5), inner, async {
            panic!("reaper must not run when the follow-through finishes");
        })
        .await
        .unwrap();
        assert_eq!(outcome.destination(), "https://advertiser.test/offer");
    }

    #[tokio::test]
    async fn placeholder_url_never_claims_the_destination_slot() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let job = store.create_job("t", "list.txt", 1, None).await.unwrap();
        let page_id = store
            .insert_page(NewPage {
                job_id: job.id.clone(),
                seed_index: 0,
                url: "https://news.example/".into(),
                crawl_list_url: "https://news.example/".into(),
                page_type: PageType::Main,
                referrer_page_id: None,
                referrer_page_url: None,
                referrer_ad_id: None,
            })
            .await
            .unwrap();
        let ad_id = store.insert_ad(&page_id, Some("iframe.ad")).await.unwrap();

        // Creation-time popup URLs must not consume the write-once slot
        persist_destination(&store, &ad_id, "about:blank").await;
        persist_destination(&store, &ad_id, "").await;
        assert_eq!(store.ad_url(&ad_id).await.unwrap(), None);

        // The resolved destination still lands, and the first one wins
        persist_destination(&store, &ad_id, "https://advertiser.test/offer").await;
        persist_destination(&store, &ad_id, "https://late.test/").await;
        assert_eq!(
            store.ad_url(&ad_id).await.unwrap().as_deref(),
            Some("https://advertiser.test/offer")
        );
    }
}

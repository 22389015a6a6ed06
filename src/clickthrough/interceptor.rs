//! Low-level target interception.
//!
//! Tab-level popup notifications can arrive too late to stop a popup from
//! loading. The fallback is a browser-control-session capability: auto-attach
//! to every new target before it executes, which makes the popup visible at
//! its very first outbound request. This is the one part of the design tied
//! to the CDP protocol, so it lives behind a trait and is injected into the
//! clickthrough handler.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::fetch::{
    self, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide_cdp::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CloseTargetParams, EventAttachedToTarget, SetAutoAttachParams, TargetId,
};
use chromiumoxide_cdp::cdp::js_protocol::runtime::RunIfWaitingForDebuggerParams;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};

/// A popup target observed by the low-level channel before it rendered.
#[derive(Debug, Clone)]
pub struct PopupSighting {
    pub target_id: String,
    /// The target's URL at attach time; may still be empty if the popup has
    /// not committed its first navigation
    pub url: String,
}

/// Capability to catch popups at the browser-control-session level.
///
/// `arm` must be called before the click; `disarm` reverts the auto-attach
/// configuration and is part of the handler's idempotent cleanup.
pub trait TargetInterceptor: Send + Sync {
    type Sightings: futures::Stream<Item = PopupSighting> + Send + Unpin + 'static;

    /// Enable auto-attach and return the stream of popup sightings for
    /// targets opened by `opener`.
    fn arm(&self, opener: &TargetId) -> impl Future<Output = Result<Self::Sightings>> + Send;

    /// Revert auto-attach. Idempotent, best-effort.
    fn disarm(&self) -> impl Future<Output = Result<()>> + Send;

    /// Resume a target that auto-attach left paused. A target that already
    /// closed itself counts as successfully resumed.
    fn resume(&self, target_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Fail the popup's first outbound request and close the target at the
    /// protocol level. Returns the destination URL that was observed.
    fn block_popup(
        &self,
        target_id: &str,
        fallback_url: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// CDP implementation over the shared browser connection.
pub struct CdpInterceptor<'b> {
    browser: &'b Browser,
    /// Bound on waiting for a paused popup's first request
    first_request_timeout: Duration,
}

impl<'b> CdpInterceptor<'b> {
    #[must_use]
    pub fn new(browser: &'b Browser) -> Self {
        Self {
            browser,
            first_request_timeout: Duration::from_secs(5),
        }
    }

    async fn set_auto_attach(&self, enabled: bool) -> Result<()> {
        let params = SetAutoAttachParams::builder()
            .auto_attach(enabled)
            .wait_for_debugger_on_start(enabled)
            .flatten(true)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build auto-attach params: {e}"))?;
        self.browser
            .execute(params)
            .await
            .context("Target.setAutoAttach failed")?;
        Ok(())
    }

    /// Let a paused popup run again so its first request can be observed.
    async fn run_if_waiting(&self, page: &Page) {
        if let Err(e) = page.execute(RunIfWaitingForDebuggerParams::default()).await {
            // The popup may have been reaped already; nothing to resume
            debug!("runIfWaitingForDebugger on popup failed (target likely gone): {e}");
        }
    }

    /// Look the popup's page handle up by target id. `None` means the popup
    /// already closed itself.
    async fn page_for_target(&self, target_id: &str) -> Option<Page> {
        let tid = TargetId::from(target_id.to_string());
        match self.browser.pages().await {
            Ok(pages) => pages.into_iter().find(|p| p.target_id() == &tid),
            Err(e) => {
                debug!("Listing pages for popup {target_id} failed: {e}");
                None
            }
        }
    }
}

impl TargetInterceptor for CdpInterceptor<'_> {
    type Sightings = futures::stream::BoxStream<'static, PopupSighting>;

    async fn arm(&self, opener: &TargetId) -> Result<Self::Sightings> {
        let attached = self
            .browser
            .event_listener::<EventAttachedToTarget>()
            .await
            .context("Failed to listen for attached targets")?;

        self.set_auto_attach(true).await?;

        let opener = opener.clone();
        let sightings = attached
            .filter_map(move |event| {
                let opener = opener.clone();
                async move {
                    let info = &event.target_info;
                    if info.r#type == "page" && info.opener_id.as_ref() == Some(&opener) {
                        Some(PopupSighting {
                            target_id: info.target_id.inner().clone(),
                            url: info.url.clone(),
                        })
                    } else {
                        None
                    }
                }
            })
            .boxed();

        Ok(sightings)
    }

    async fn disarm(&self) -> Result<()> {
        self.set_auto_attach(false).await
    }

    async fn resume(&self, target_id: &str) -> Result<()> {
        match self.page_for_target(target_id).await {
            Some(page) => {
                self.run_if_waiting(&page).await;
                Ok(())
            }
            // Racing with an already-closed popup is success: the popup was
            // observed, there is nothing further to do
            None => {
                debug!("Popup {target_id} already gone before resume");
                Ok(())
            }
        }
    }

    async fn block_popup(&self, target_id: &str, fallback_url: &str) -> Result<String> {
        let tid = TargetId::from(target_id.to_string());

        let observed = match self.page_for_target(target_id).await {
            Some(popup) => self.fail_first_request(&popup, fallback_url).await,
            None => {
                debug!("Popup {target_id} already gone before block");
                fallback_url.to_string()
            }
        };

        if let Err(e) = self.browser.execute(CloseTargetParams::new(tid)).await {
            // Already-closed targets error here; that is the desired state
            debug!("Popup {target_id} close returned error (likely already closed): {e}");
        }

        Ok(observed)
    }
}

impl CdpInterceptor<'_> {
    /// Intercept the paused popup's first document request and fail it
    /// before anything loads. Falls back to the attach-time URL when the
    /// request never materializes.
    async fn fail_first_request(&self, popup: &Page, fallback_url: &str) -> String {
        let listener = match popup.event_listener::<EventRequestPaused>().await {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to listen on popup requests: {e}");
                return fallback_url.to_string();
            }
        };

        let pattern = RequestPattern::builder()
            .url_pattern("*")
            .resource_type(ResourceType::Document)
            .request_stage(RequestStage::Request)
            .build();
        let enable = fetch::EnableParams::builder().patterns(vec![pattern]).build();
        if let Err(e) = popup.execute(enable).await {
            warn!("Failed to enable fetch on popup: {e}");
            return fallback_url.to_string();
        }

        // The popup is paused at startup; let it run into our interception
        self.run_if_waiting(popup).await;

        let mut listener = listener;
        match tokio::time::timeout(self.first_request_timeout, listener.next()).await {
            Ok(Some(event)) => {
                let url = event.request.url.clone();
                let fail =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = popup.execute(fail).await {
                    debug!("Failing popup request returned error: {e}");
                }
                url
            }
            Ok(None) | Err(_) => {
                debug!("Popup produced no interceptable request, using attach-time URL");
                fallback_url.to_string()
            }
        }
    }
}

//! Single-commit arbitration for the three click-detection paths.
//!
//! Clicking an ad can surface in three physically different ways - a blocked
//! same-tab navigation, a popup target creation event, or a low-level
//! auto-attach sighting - and the notifications arrive in no particular
//! order. Whichever fires first wins; the losers are disarmed by dropping
//! their streams, so a late notification can never double-resolve.
//!
//! This module is deliberately browser-free: the handler feeds it detection
//! streams pumped from CDP events, and tests feed it plain channels.

use std::time::Duration;

use futures::stream::{BoxStream, StreamExt, select_all};

use crate::error::ClickthroughError;

/// One observation from a detection path. Ids are carried as plain strings
/// so this type stays independent of the browser-control protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The current tab tried to navigate away; the request is paused and
    /// waiting for a verdict.
    Navigation { request_id: String, url: String },
    /// A popup target was created with the clicked page as opener.
    Popup { target_id: String, url: String },
    /// The low-level channel attached to a popup target before it rendered.
    LowLevel { target_id: String, url: String },
}

impl Detection {
    /// The destination URL this detection observed, if it carried one.
    /// Popup targets occasionally report an empty URL before their first
    /// navigation commits.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Navigation { url, .. } | Self::Popup { url, .. } | Self::LowLevel { url, .. } => {
                url
            }
        }
    }
}

/// Wait for the first detection across the three paths, bounded by the
/// click timeout.
///
/// Exactly one of three things happens:
/// - some path yields: that detection is committed, the merged stream (and
///   with it every losing path) is dropped
/// - every stream ends without yielding: the browser-control session is
///   gone, reported as such rather than as a timeout
/// - the deadline expires: click-timeout error
pub async fn first_detection(
    streams: Vec<BoxStream<'_, Detection>>,
    click_timeout: Duration,
) -> Result<Detection, ClickthroughError> {
    let mut merged = select_all(streams);

    match tokio::time::timeout(click_timeout, merged.next()).await {
        Ok(Some(detection)) => Ok(detection),
        Ok(None) => Err(ClickthroughError::SessionLost(
            "all detection channels closed before any event".into(),
        )),
        Err(_) => Err(ClickthroughError::ClickTimeout(click_timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    fn channel_stream() -> (mpsc::Sender<Detection>, BoxStream<'static, Detection>) {
        let (tx, rx) = mpsc::channel(4);
        (tx, ReceiverStream::new(rx).boxed())
    }

    #[tokio::test]
    async fn first_path_to_fire_wins() {
        let (nav_tx, nav) = channel_stream();
        let (popup_tx, popup) = channel_stream();
        let (_low_tx, low) = channel_stream();

        popup_tx
            .send(Detection::Popup {
                target_id: "t1".into(),
                url: "http://dest.test/".into(),
            })
            .await
            .unwrap();
        // A slower navigation arrives afterwards; it must lose
        nav_tx
            .send(Detection::Navigation {
                request_id: "r1".into(),
                url: "http://other.test/".into(),
            })
            .await
            .unwrap();

        let won = first_detection(vec![nav, popup, low], Duration::from_secs(1))
            .await
            .unwrap();
        // select_all polls fairly, so with both queued either could win the
        // poll order - but exactly one commits and it carries a real URL
        assert!(matches!(
            won,
            Detection::Popup { .. } | Detection::Navigation { .. }
        ));
    }

    #[tokio::test]
    async fn single_queued_detection_commits() {
        let (_nav_tx, nav) = channel_stream();
        let (_popup_tx, popup) = channel_stream();
        let (low_tx, low) = channel_stream();

        low_tx
            .send(Detection::LowLevel {
                target_id: "t9".into(),
                url: "http://ad.test/dest".into(),
            })
            .await
            .unwrap();

        let won = first_detection(vec![nav, popup, low], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            won,
            Detection::LowLevel {
                target_id: "t9".into(),
                url: "http://ad.test/dest".into(),
            }
        );
    }

    #[tokio::test]
    async fn no_event_within_deadline_is_click_timeout() {
        let (_nav_tx, nav) = channel_stream();
        let (_popup_tx, popup) = channel_stream();
        let (_low_tx, low) = channel_stream();

        let err = first_detection(vec![nav, popup, low], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClickthroughError::ClickTimeout(_)));
    }

    #[tokio::test]
    async fn all_channels_closed_is_session_lost_not_timeout() {
        let (nav_tx, nav) = channel_stream();
        let (popup_tx, popup) = channel_stream();
        let (low_tx, low) = channel_stream();
        drop(nav_tx);
        drop(popup_tx);
        drop(low_tx);

        let err = first_detection(vec![nav, popup, low], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClickthroughError::SessionLost(_)));
    }

    #[tokio::test]
    async fn late_event_after_commit_is_dropped_silently() {
        let (nav_tx, nav) = channel_stream();
        let (popup_tx, popup) = channel_stream();
        let (_low_tx, low) = channel_stream();

        nav_tx
            .send(Detection::Navigation {
                request_id: "r1".into(),
                url: "http://ad.test/dest".into(),
            })
            .await
            .unwrap();

        let won = first_detection(vec![nav, popup, low], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(won.url(), "http://ad.test/dest");

        // The race is over and its streams are dropped; a late popup send
        // fails cleanly instead of resolving anything
        let late = popup_tx
            .send(Detection::Popup {
                target_id: "t2".into(),
                url: "http://late.test/".into(),
            })
            .await;
        assert!(late.is_err());
    }
}

//! Error taxonomy for crawl operations.
//!
//! Errors are caught at the smallest scope that preserves forward progress:
//! a failed ad clickthrough never fails its page, a failed page never fails
//! the run. Only configuration and browser-session errors escalate to the
//! top of the process.

use std::fmt;

/// Custom error type for crawl operations
#[derive(Debug, Clone)]
pub enum CrawlError {
    /// Configuration error (bad paths, malformed URL list, resume mismatch).
    /// Fatal: the process exits with a descriptive message.
    Config(String),
    /// Browser session error (launch failure, lost CDP connection)
    Browser(String),
    /// Persistence error
    Store(String),
    /// Navigation error on a page
    Navigation(String),
    /// Operation cancelled (interrupt signal)
    Cancelled,
    /// Other errors
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Browser(msg) => write!(f, "Browser error: {msg}"),
            Self::Store(msg) => write!(f, "Store error: {msg}"),
            Self::Navigation(msg) => write!(f, "Navigation error: {msg}"),
            Self::Cancelled => write!(f, "Crawl was cancelled"),
            Self::Other(msg) => write!(f, "Crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // Use {:#} to preserve the full error chain with context
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for Result with `CrawlError`
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Terminal failure of a single ad clickthrough attempt.
///
/// Recovered at the ad-handling boundary: the enclosing page's crawl
/// continues and only this ad's clickthrough is abandoned. The variant set
/// is closed; the two timeout variants name which phase expired.
#[derive(Debug, thiserror::Error)]
pub enum ClickthroughError {
    /// Nothing happened after the click within the click budget
    #[error("no navigation or popup observed within {0} seconds of click")]
    ClickTimeout(u64),
    /// A destination was observed but the follow-through exceeded its budget
    #[error("clickthrough handling exceeded {0} seconds")]
    ClickthroughTimeout(u64),
    /// The click action itself failed
    #[error("ad click failed: {0}")]
    ClickFailed(String),
    /// The browser-control session went away mid-clickthrough
    #[error("browser session lost: {0}")]
    SessionLost(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

//! Configuration for ad-clickthrough crawling.
//!
//! A single `CrawlConfig` is constructed once at startup and passed by
//! reference into every component that needs it; nothing reads ambient
//! global state.

mod builder;
mod getters;
mod types;

pub use builder::CrawlConfigBuilder;
pub use types::{ClickAdsMode, CrawlConfig};

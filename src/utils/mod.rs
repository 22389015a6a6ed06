pub mod constants;
pub mod url_list;

pub use constants::*;
pub use url_list::{read_url_list, validate_absolute_url};

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Wrap an async operation with an explicit deadline.
///
/// Prevents indefinite hangs on browser operations by applying
/// `tokio::time::timeout`. The error message distinguishes a deadline
/// expiry from an operation failure.
pub async fn with_timeout<F, T>(operation: F, timeout_secs: u64, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs), operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{operation_name} timeout after {timeout_secs} seconds"
        )),
    }
}

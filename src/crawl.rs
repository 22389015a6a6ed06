//! The crawl run: job lifecycle, seed loop, checkpointing.
//!
//! A run walks a URL list one seed at a time. Each seed gets its own tab
//! and its own time budget; whatever happens inside that budget, the job's
//! checkpoint advances afterwards, so a crash or interrupt resumes at the
//! seed after the last fully processed one. Already-processed seeds are
//! never revisited and their ads are never re-clicked.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::config::CrawlConfig;
use crate::context::CrawlContext;
use crate::error::{CrawlError, CrawlResult};
use crate::page_loader::{self, PageTarget};
use crate::scrape::{AdScraper, PageScraper};
use crate::store::{CrawlJob, JobStore};
use crate::utils::read_url_list;

/// Run a crawl to completion with the given collaborators.
///
/// Fails fast on configuration problems - unreadable URL list, uncreatable
/// output directory, resume mismatch - before any browser or job-row work.
pub async fn run_crawl<S, P, A>(
    config: CrawlConfig,
    store: S,
    page_scraper: P,
    ad_scraper: A,
) -> CrawlResult<()>
where
    S: JobStore,
    P: PageScraper,
    A: AdScraper,
{
    let urls = read_url_list(config.url_list())
        .await
        .map_err(|e| CrawlError::Config(format!("{e:#}")))?;
    std::fs::create_dir_all(config.output_dir())
        .map_err(|e| CrawlError::Config(format!("cannot create output directory: {e}")))?;

    let job = resolve_job(&config, &store, urls.len() as i64).await?;
    let start_index = usize::try_from(job.current_index).unwrap_or(0);
    if start_index >= urls.len() {
        info!("Job {} already past the last seed, marking complete", job.id);
        store
            .complete_job(&job.id)
            .await
            .map_err(|e| CrawlError::Store(format!("{e:#}")))?;
        return Ok(());
    }
    info!(
        "Job {}: {} seeds, starting at index {start_index}",
        job.id,
        urls.len()
    );

    let session = BrowserSession::launch(&config)
        .await
        .map_err(|e| CrawlError::Browser(format!("{e:#}")))?;

    let item_budget = Duration::from_secs(config.item_timeout_secs());
    let ctx = CrawlContext::new(config, store, job.id.clone(), page_scraper, ad_scraper);

    let mut interrupted = false;
    for (index, url) in urls.iter().enumerate().skip(start_index) {
        // The tab lives outside the raced future: a timed-out or
        // interrupted item must still get its tab closed
        let tab = session
            .new_tab()
            .await
            .map_err(|e| CrawlError::Browser(format!("{e:#}")))?;

        let item = page_loader::load_and_handle_page(
            &ctx,
            session.browser(),
            &tab,
            PageTarget::seed(url.clone(), index as i64),
        );
        let disposition = tokio::select! {
            result = timeout(item_budget, item) => match result {
                Ok(Ok(())) => {
                    info!("Seed {index} done: {url}");
                    SeedDisposition::Done
                }
                Ok(Err(e)) => {
                    error!("Seed {index} failed, continuing: {e:#}");
                    SeedDisposition::Failed
                }
                Err(_) => {
                    error!(
                        "Seed {index} exceeded its {}s budget, continuing",
                        item_budget.as_secs()
                    );
                    SeedDisposition::TimedOut
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received mid-seed; this seed will be redone on resume");
                SeedDisposition::Interrupted
            }
        };

        session.close_tab(tab).await;

        if !advances_checkpoint(disposition) {
            interrupted = true;
            break;
        }
        ctx.store
            .update_job_index(&job.id, (index + 1) as i64)
            .await
            .map_err(|e| CrawlError::Store(format!("{e:#}")))?;
    }

    if !interrupted {
        ctx.store
            .complete_job(&job.id)
            .await
            .map_err(|e| CrawlError::Store(format!("{e:#}")))?;
        info!("Job {} complete", job.id);
    }

    if let Err(e) = session.close().await {
        warn!("Browser session shutdown reported: {e:#}");
    }

    if interrupted {
        Err(CrawlError::Cancelled)
    } else {
        Ok(())
    }
}

/// How one seed's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedDisposition {
    Done,
    Failed,
    TimedOut,
    Interrupted,
}

/// Failures and timeouts are the seed's own problem and the checkpoint
/// moves past them. An interrupt stops mid-seed before the work is done,
/// so the checkpoint stays put and that seed is redone on resume.
fn advances_checkpoint(disposition: SeedDisposition) -> bool {
    !matches!(disposition, SeedDisposition::Interrupted)
}

/// Create a fresh job row, or load and verify the one being resumed.
///
/// A resumed job must have been started from the same URL list: the list's
/// file name and length are its identity. On mismatch nothing is written -
/// the caller gets a configuration error and the stored job is untouched.
async fn resolve_job<S: JobStore>(
    config: &CrawlConfig,
    store: &S,
    total_urls: i64,
) -> CrawlResult<CrawlJob> {
    let list_name = config.url_list_name();

    if let Some(job_id) = config.resume_job_id() {
        let job = store
            .get_job(job_id)
            .await
            .map_err(|e| CrawlError::Store(format!("{e:#}")))?
            .ok_or_else(|| CrawlError::Config(format!("no job with id {job_id} to resume")))?;

        if job.completed {
            return Err(CrawlError::Config(format!(
                "job {job_id} already ran to completion"
            )));
        }
        if job.crawl_list != list_name || job.total_urls != total_urls {
            return Err(CrawlError::Config(format!(
                "job {job_id} was started from '{}' with {} URLs, \
                 but the current list is '{list_name}' with {total_urls}",
                job.crawl_list, job.total_urls
            )));
        }
        info!(
            "Resuming job {job_id} at index {} of {}",
            job.current_index, job.total_urls
        );
        return Ok(job);
    }

    let host_identity = std::env::var("ADTRAIL_HOST_IDENTITY").ok();
    store
        .create_job(config.crawl_name(), &list_name, total_urls, host_identity.as_deref())
        .await
        .map_err(|e| CrawlError::Store(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_outcomes_still_advance_the_checkpoint() {
        assert!(advances_checkpoint(SeedDisposition::Done));
        assert!(advances_checkpoint(SeedDisposition::Failed));
        assert!(advances_checkpoint(SeedDisposition::TimedOut));
    }

    #[test]
    fn interrupt_leaves_the_checkpoint_on_the_current_seed() {
        assert!(!advances_checkpoint(SeedDisposition::Interrupted));
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use adtrail::{ClickAdsMode, CrawlConfig, CrawlError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClickMode {
    /// Record ads but never click them
    None,
    /// Click each ad, record its destination, block the load
    Block,
    /// Click each ad and scrape the landing page it leads to
    Follow,
}

impl From<ClickMode> for ClickAdsMode {
    fn from(mode: ClickMode) -> Self {
        match mode {
            ClickMode::None => Self::NoClick,
            ClickMode::Block => Self::ClickAndBlockLoad,
            ClickMode::Follow => Self::ClickAndScrapeLandingPage,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "adtrail",
    version,
    about = "Visit pages, click their ads, record where they lead"
)]
struct Cli {
    /// Newline-delimited file of absolute seed URLs
    #[arg(value_name = "URL_LIST")]
    url_list: PathBuf,

    /// Output directory for the database and artifacts
    #[arg(short, long, value_name = "DIR", default_value = "./output")]
    output: PathBuf,

    /// Crawl name recorded on the job; defaults to the list file's stem
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// SQLite database path; defaults to {output}/adtrail.sqlite
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Resume an interrupted job by id instead of starting a new one
    #[arg(long, value_name = "JOB_ID")]
    resume: Option<String>,

    #[arg(long, value_enum, default_value_t = ClickMode::None)]
    click_ads: ClickMode,

    /// Run Chrome with a visible window
    #[arg(long, default_value_t = false)]
    headed: bool,

    /// Skip content scraping; pages are recorded but not archived
    #[arg(long, default_value_t = false)]
    no_site_scrape: bool,

    /// Skip ad discovery entirely
    #[arg(long, default_value_t = false)]
    no_ads: bool,

    /// Save a full-page screenshot of each page with its ads in place
    #[arg(long, default_value_t = false)]
    screenshots: bool,

    /// Follow same-site links from each seed page
    #[arg(long, default_value_t = false)]
    subpages: bool,

    /// Maximum same-site links to follow per seed
    #[arg(long, value_name = "N", default_value_t = 2)]
    max_subpages: usize,

    /// Whole-seed time budget in seconds
    #[arg(long, value_name = "SECS", default_value_t = 900)]
    item_timeout: u64,
}

fn build_config(cli: Cli) -> anyhow::Result<CrawlConfig> {
    let mut builder = CrawlConfig::builder()
        .output_dir(cli.output)
        .url_list(cli.url_list)
        .headless(!cli.headed)
        .scrape_site(!cli.no_site_scrape)
        .scrape_ads(!cli.no_ads)
        .click_ads(cli.click_ads.into())
        .screenshot_ads_with_context(cli.screenshots)
        .follow_subpages(cli.subpages)
        .max_subpages(cli.max_subpages)
        .item_timeout_secs(cli.item_timeout);

    if let Some(name) = cli.name {
        builder = builder.crawl_name(name);
    }
    if let Some(database) = cli.database {
        builder = builder.db_path(database);
    }
    if let Some(job_id) = cli.resume {
        builder = builder.resume_job_id(job_id);
    }
    builder.build()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match build_config(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e:#}");
            return ExitCode::from(2);
        }
    };

    match adtrail::crawl(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CrawlError::Cancelled) => {
            error!("Crawl interrupted; resume with --resume <job-id>");
            ExitCode::from(130)
        }
        Err(e) => {
            error!("Crawl failed: {e}");
            ExitCode::FAILURE
        }
    }
}

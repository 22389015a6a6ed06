use adtrail::{ClickAdsMode, CrawlConfig};
use std::path::PathBuf;

#[test]
fn defaults_are_safe_and_headless() {
    let config = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/tmp/seeds.txt")
        .build()
        .expect("default build");

    assert!(config.headless());
    assert!(config.scrape_site());
    assert!(config.scrape_ads());
    assert_eq!(config.click_ads(), ClickAdsMode::NoClick);
    assert!(!config.follow_subpages());
    assert!(config.clickthrough_timeout_secs() >= config.click_timeout_secs());
}

#[test]
fn crawl_name_derived_from_list_file_stem() {
    let config = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/data/news-sites.txt")
        .build()
        .expect("build");
    assert_eq!(config.crawl_name(), "news-sites");

    let named = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/data/news-sites.txt")
        .crawl_name("march-run")
        .build()
        .expect("build");
    assert_eq!(named.crawl_name(), "march-run");
}

#[test]
fn clicking_requires_ad_scraping() {
    let err = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/tmp/seeds.txt")
        .scrape_ads(false)
        .click_ads(ClickAdsMode::ClickAndBlockLoad)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("scrape_ads"));
}

#[test]
fn clickthrough_budget_must_cover_click_budget() {
    let err = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/tmp/seeds.txt")
        .click_timeout_secs(30)
        .clickthrough_timeout_secs(10)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("clickthrough timeout"));

    let zero = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/tmp/seeds.txt")
        .click_timeout_secs(0)
        .build()
        .unwrap_err();
    assert!(zero.to_string().contains("non-zero"));
}

#[test]
fn database_path_defaults_under_output_dir() {
    let config = CrawlConfig::builder()
        .output_dir("/srv/crawls")
        .url_list("/tmp/seeds.txt")
        .build()
        .expect("build");
    assert_eq!(config.db_path(), PathBuf::from("/srv/crawls/adtrail.sqlite"));

    let custom = CrawlConfig::builder()
        .output_dir("/srv/crawls")
        .url_list("/tmp/seeds.txt")
        .db_path("/var/lib/adtrail/run.sqlite")
        .build()
        .expect("build");
    assert_eq!(custom.db_path(), PathBuf::from("/var/lib/adtrail/run.sqlite"));
}

#[test]
fn follow_mode_is_the_only_one_that_chases_destinations() {
    assert!(!ClickAdsMode::NoClick.follows_destination());
    assert!(!ClickAdsMode::ClickAndBlockLoad.follows_destination());
    assert!(ClickAdsMode::ClickAndScrapeLandingPage.follows_destination());
}

#[test]
fn url_list_name_is_the_file_name() {
    let config = CrawlConfig::builder()
        .output_dir("/tmp/out")
        .url_list("/data/lists/news-sites.txt")
        .build()
        .expect("build");
    assert_eq!(config.url_list_name(), "news-sites.txt");
}

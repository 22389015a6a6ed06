use adtrail::store::{JobStore, NewPage, PageType, SqliteStore};

fn page_for(job_id: &str, url: &str, page_type: PageType) -> NewPage {
    NewPage {
        job_id: job_id.to_string(),
        seed_index: 0,
        url: url.to_string(),
        crawl_list_url: "https://news.example/".to_string(),
        page_type,
        referrer_page_id: None,
        referrer_page_url: None,
        referrer_ad_id: None,
    }
}

#[tokio::test]
async fn job_lifecycle_checkpoints_and_completes() {
    let store = SqliteStore::open_in_memory().await.expect("open");

    let job = store
        .create_job("news-run", "news-sites.txt", 5, Some("203.0.113.7"))
        .await
        .expect("create");
    assert_eq!(job.current_index, 0);
    assert!(!job.completed);

    store.update_job_index(&job.id, 3).await.expect("checkpoint");
    let reloaded = store.get_job(&job.id).await.expect("get").expect("exists");
    assert_eq!(reloaded.current_index, 3);
    assert_eq!(reloaded.crawl_list, "news-sites.txt");
    assert_eq!(reloaded.total_urls, 5);
    assert_eq!(reloaded.host_identity.as_deref(), Some("203.0.113.7"));

    store.complete_job(&job.id).await.expect("complete");
    let done = store.get_job(&job.id).await.expect("get").expect("exists");
    assert!(done.completed);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn missing_job_is_none_not_error() {
    let store = SqliteStore::open_in_memory().await.expect("open");
    assert!(store.get_job("no-such-job").await.expect("get").is_none());
}

#[tokio::test]
async fn ad_destination_writes_exactly_once() {
    let store = SqliteStore::open_in_memory().await.expect("open");
    let job = store
        .create_job("run", "list.txt", 1, None)
        .await
        .expect("create");
    let page_id = store
        .insert_page(page_for(&job.id, "https://news.example/", PageType::Main))
        .await
        .expect("page");
    let ad_id = store
        .insert_ad(&page_id, Some("ins.adsbygoogle"))
        .await
        .expect("ad");

    assert_eq!(store.ad_url(&ad_id).await.expect("query"), None);

    // First observer wins
    let wrote = store
        .set_ad_url(&ad_id, "https://advertiser.example/offer")
        .await
        .expect("set");
    assert!(wrote);

    // A slower detection path reporting later is a no-op
    let wrote_again = store
        .set_ad_url(&ad_id, "https://late.example/other")
        .await
        .expect("set");
    assert!(!wrote_again);

    assert_eq!(
        store.ad_url(&ad_id).await.expect("query").as_deref(),
        Some("https://advertiser.example/offer")
    );
}

#[tokio::test]
async fn landing_page_links_back_to_its_ad() {
    let store = SqliteStore::open_in_memory().await.expect("open");
    let job = store
        .create_job("run", "list.txt", 1, None)
        .await
        .expect("create");

    let main_id = store
        .insert_page(page_for(&job.id, "https://news.example/", PageType::Main))
        .await
        .expect("main page");
    let ad_id = store
        .insert_ad(&main_id, Some("iframe[id^='google_ads_iframe']"))
        .await
        .expect("ad");

    let mut landing = page_for(&job.id, "https://advertiser.example/offer", PageType::Landing);
    landing.referrer_page_id = Some(main_id.clone());
    landing.referrer_page_url = Some("https://news.example/".to_string());
    landing.referrer_ad_id = Some(ad_id.clone());
    let landing_id = store.insert_page(landing).await.expect("landing page");

    let record = store
        .get_page(&landing_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.page_type, PageType::Landing);
    assert_eq!(record.referrer_page_id.as_deref(), Some(main_id.as_str()));
    assert_eq!(record.referrer_ad_id.as_deref(), Some(ad_id.as_str()));
    assert!(!record.archived);
}

#[tokio::test]
async fn archived_pages_are_marked() {
    let store = SqliteStore::open_in_memory().await.expect("open");
    let job = store
        .create_job("run", "list.txt", 1, None)
        .await
        .expect("create");
    let id = store
        .archive_page(page_for(&job.id, "https://news.example/", PageType::Main))
        .await
        .expect("archive");
    let record = store.get_page(&id).await.expect("get").expect("exists");
    assert!(record.archived);
}

#[tokio::test]
async fn checkpoint_survives_reopening_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("adtrail.sqlite");

    let job_id = {
        let store = SqliteStore::open(&db_path).await.expect("open");
        let job = store
            .create_job("run", "list.txt", 10, None)
            .await
            .expect("create");
        store.update_job_index(&job.id, 7).await.expect("checkpoint");
        job.id
    };

    // A resumed process opens the same file and finds the checkpoint
    let store = SqliteStore::open(&db_path).await.expect("reopen");
    let job = store.get_job(&job_id).await.expect("get").expect("exists");
    assert_eq!(job.current_index, 7);
    assert!(!job.completed);
}

#[tokio::test]
async fn pages_for_job_only_returns_that_job() {
    let store = SqliteStore::open_in_memory().await.expect("open");
    let job_a = store
        .create_job("a", "a.txt", 1, None)
        .await
        .expect("create");
    let job_b = store
        .create_job("b", "b.txt", 1, None)
        .await
        .expect("create");

    store
        .insert_page(page_for(&job_a.id, "https://one.example/", PageType::Main))
        .await
        .expect("page");
    store
        .insert_page(page_for(&job_a.id, "https://two.example/", PageType::Subpage))
        .await
        .expect("page");
    store
        .insert_page(page_for(&job_b.id, "https://other.example/", PageType::Main))
        .await
        .expect("page");

    let pages = store.pages_for_job(&job_a.id).await.expect("query");
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p.job_id == job_a.id));
}

use crate::common::*;
use habr_harvest::crawler::{crawl_hub, CrawlContext};
use habr_harvest::state::CrawlStatus;
use habr_harvest::storage::Storage;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(server: &MockServer, page: u32, pages_count: u32, ids: &[i64]) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("hub", "career"))
        .and(query_param("page", page.to_string()))
        .and(query_param("perPage", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(pages_count, ids)))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_article(server: &MockServer, article_id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/kek/v2/articles/{}/", article_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_body(article_id)))
        .mount(server)
        .await;
}

async fn mount_all_articles(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/kek/v2/articles/\d+/$"))
        .respond_with(|req: &wiremock::Request| {
            let id: i64 = req
                .url
                .path_segments()
                .and_then(|mut segments| segments.nth(3))
                .and_then(|segment| segment.parse().ok())
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(article_body(id))
        })
        .mount(server)
        .await;
}

fn article_count(ctx: &CrawlContext) -> u64 {
    ctx.storage.with(|s| s.count_articles()).unwrap()
}

#[tokio::test]
async fn test_two_page_crawl_persists_every_article() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 5, &[101, 102]).await;
    mount_listing(&server, 2, 5, &[103, 104]).await;
    mount_all_articles(&server).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 2, 2));

    let finished = crawl_hub(ctx.clone(), hub.clone()).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Processed);
    assert_eq!(
        finished.next_check_at,
        Some(finished.last_checked_at + chrono::Duration::seconds(600))
    );

    let mut pages = requested_pages(&server).await;
    pages.sort();
    assert_eq!(pages, vec![1, 2], "max_pages caps the reported page count");

    assert_eq!(article_count(&ctx), 4);
    assert_eq!(
        ctx.storage
            .with(|s| s.count_articles_by_status(CrawlStatus::Processed))
            .unwrap(),
        4
    );

    let stored = ctx.storage.with(|s| s.get_article(103)).unwrap().unwrap();
    assert_eq!(stored.hub_id, Some(hub.id));
    assert_eq!(stored.hub_link, CAREER_LINK);
    assert_eq!(stored.url, "https://habr.com/ru/articles/103/");
    assert_eq!(stored.title.as_deref(), Some("Article 103"));
    assert_eq!(stored.author_name.as_deref(), Some("Alice Smith"));
    assert_eq!(
        stored.author_url.as_deref(),
        Some("https://habr.com/ru/users/alice/")
    );
    assert_eq!(
        stored.published_at.map(|t| t.to_rfc3339()),
        Some("2024-05-13T07:00:00+00:00".to_string())
    );

    let stored_hub = ctx.storage.with(|s| s.get_hub(hub.id)).unwrap();
    assert_eq!(stored_hub.status, CrawlStatus::Processed);
    assert!(stored_hub.next_check_at.is_some());
}

#[tokio::test]
async fn test_reported_page_count_below_cap() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[201]).await;
    mount_article(&server, 201).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 10, 100));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Processed);
    assert_eq!(requested_pages(&server).await, vec![1]);
    assert_eq!(article_count(&ctx), 1);
}

#[tokio::test]
async fn test_only_first_page_enqueues_more_pages() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 3, &[301]).await;
    // Later pages report a larger count; it must be ignored
    mount_listing(&server, 2, 50, &[302]).await;
    mount_listing(&server, 3, 50, &[303]).await;
    mount_all_articles(&server).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 20, 100));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Processed);
    let mut pages = requested_pages(&server).await;
    pages.sort();
    assert_eq!(pages, vec![1, 2, 3]);
    assert_eq!(article_count(&ctx), 3);
}

#[tokio::test]
async fn test_listing_error_marks_hub_error_and_reschedules() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/kek/v2/articles/\d+/$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 5, 10));

    let finished = crawl_hub(ctx.clone(), hub.clone()).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Error);
    assert_eq!(
        finished.next_check_at,
        Some(finished.last_checked_at + chrono::Duration::seconds(600))
    );
    assert_eq!(article_count(&ctx), 0);

    let stored = ctx.storage.with(|s| s.get_hub(hub.id)).unwrap();
    assert_eq!(stored.status, CrawlStatus::Error);
}

#[tokio::test]
async fn test_later_listing_page_error_keeps_earlier_articles() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 2, &[401, 402]).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_all_articles(&server).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 5, 10));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Error);
    assert_eq!(article_count(&ctx), 2);
}

#[tokio::test]
async fn test_undecodable_listing_keeps_hub_processed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/kek/v2/articles/\d+/$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 5, 10));

    let finished = crawl_hub(ctx.clone(), hub.clone()).await.unwrap();

    // Only a refused listing fails the hub; exhausted retries just lose the page
    assert_eq!(finished.status, CrawlStatus::Processed);
    assert_eq!(
        finished.next_check_at,
        Some(finished.last_checked_at + chrono::Duration::seconds(600))
    );
    assert_eq!(article_count(&ctx), 0);
    assert_eq!(requested_pages(&server).await, vec![1, 1]);

    let stored = ctx.storage.with(|s| s.get_hub(hub.id)).unwrap();
    assert_eq!(stored.status, CrawlStatus::Processed);
}

#[tokio::test]
async fn test_refused_article_is_recorded_as_error() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[501, 502]).await;
    mount_article(&server, 501).await;
    Mock::given(method("GET"))
        .and(path("/kek/v2/articles/502/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    let finished = crawl_hub(ctx.clone(), hub.clone()).await.unwrap();

    // Article failures do not affect the hub outcome
    assert_eq!(finished.status, CrawlStatus::Processed);
    assert_eq!(article_count(&ctx), 2);

    let errored = ctx.storage.with(|s| s.get_article(502)).unwrap().unwrap();
    assert_eq!(errored.status, CrawlStatus::Error);
    assert_eq!(errored.hub_id, Some(hub.id));
    assert_eq!(errored.url, "https://habr.com/ru/articles/502/");
    assert_eq!(errored.title, None);
    assert_eq!(errored.published_at, None);
    assert_eq!(errored.author_name, None);
    assert_eq!(errored.author_url, None);
    assert_eq!(errored.main_text, None);
}

#[tokio::test]
async fn test_article_with_exhausted_retries_is_not_recorded() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[601, 602]).await;
    mount_article(&server, 601).await;
    Mock::given(method("GET"))
        .and(path("/kek/v2/articles/602/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(2)
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Processed);
    assert!(ctx.storage.with(|s| s.get_article(601)).unwrap().is_some());
    assert!(ctx.storage.with(|s| s.get_article(602)).unwrap().is_none());
}

#[tokio::test]
async fn test_sparse_article_payload_uses_defaults() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[701]).await;
    Mock::given(method("GET"))
        .and(path("/kek/v2/articles/701/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    crawl_hub(ctx.clone(), hub).await.unwrap();

    let stored = ctx.storage.with(|s| s.get_article(701)).unwrap().unwrap();
    assert_eq!(stored.status, CrawlStatus::Processed);
    assert_eq!(stored.title.as_deref(), Some(""));
    assert_eq!(stored.author_name.as_deref(), Some(""));
    assert_eq!(stored.author_url, None);
    assert_eq!(stored.published_at, None);
}

#[tokio::test]
async fn test_malformed_hub_link_makes_no_requests() {
    let server = MockServer::start().await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub("https://habr.com/ru/hubs/career/", 5, 10));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Error);
    assert!(finished.next_check_at.is_some());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_final_flush_stores_records_below_batch_size() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[801, 802, 803]).await;
    mount_all_articles(&server).await;

    // The periodic flusher never fires; everything goes through the final flush
    let mut crawler = test_crawler_config(&server);
    crawler.flush_interval_ms = 3_600_000;
    let ctx = test_context_with(crawler);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 100));

    let finished = crawl_hub(ctx.clone(), hub).await.unwrap();

    assert_eq!(finished.status, CrawlStatus::Processed);
    assert_eq!(article_count(&ctx), 3);
}

#[tokio::test]
async fn test_recrawl_does_not_duplicate_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(1, &[901, 902])))
        .expect(2)
        .mount(&server)
        .await;
    mount_all_articles(&server).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 1));

    let first = crawl_hub(ctx.clone(), hub).await.unwrap();
    assert_eq!(article_count(&ctx), 2);

    let second = crawl_hub(ctx.clone(), first).await.unwrap();
    assert_eq!(second.status, CrawlStatus::Processed);
    assert_eq!(article_count(&ctx), 2);
}

#[tokio::test]
async fn test_concurrent_sessions_share_storage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing_body(1, &[1001, 1002, 1003]))
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;
    mount_all_articles(&server).await;

    let ctx = test_context(&server);
    let career = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 1));
    let rust = seed_hub(
        &ctx,
        new_hub("https://habr.com/ru/hubs/rust/articles/", 1, 1),
    );

    // Both hubs list the same articles; each id must be stored once
    let (a, b) = tokio::join!(crawl_hub(ctx.clone(), career), crawl_hub(ctx.clone(), rust));

    assert_eq!(a.unwrap().status, CrawlStatus::Processed);
    assert_eq!(b.unwrap().status, CrawlStatus::Processed);
    assert_eq!(article_count(&ctx), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_crawl_stores_in_flight_articles() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, 1, &[701, 702]).await;
    mount_article(&server, 702).await;
    Mock::given(method("GET"))
        .and(path("/kek/v2/articles/701/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(article_body(701))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    let cancelled =
        tokio::time::timeout(Duration::from_millis(100), crawl_hub(ctx.clone(), hub.clone())).await;
    assert!(cancelled.is_err(), "the crawl should still be waiting on article 701");

    tokio::time::sleep(Duration::from_millis(800)).await;

    assert!(ctx.storage.with(|s| s.get_article(702)).unwrap().is_some());
    let slow = ctx.storage.with(|s| s.get_article(701)).unwrap();
    assert_eq!(slow.map(|a| a.status), Some(CrawlStatus::Processed));

    let stored = ctx.storage.with(|s| s.get_hub(hub.id)).unwrap();
    assert_eq!(stored.status, CrawlStatus::Error);
    assert!(stored.next_check_at.is_some());
}

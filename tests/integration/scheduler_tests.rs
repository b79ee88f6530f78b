use crate::common::*;
use chrono::Utc;
use habr_harvest::crawler::{run_once, run_scheduler, trigger_due_hubs};
use habr_harvest::state::{CrawlStatus, Hub};
use habr_harvest::storage::Storage;
use habr_harvest::Result;
use std::time::Duration;
use tokio::task::JoinSet;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_single_page_hub(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(1, &[11, 12])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/kek/v2/articles/\d+/$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_body(11)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_trigger_skips_busy_and_future_hubs() {
    let server = MockServer::start().await;
    mount_single_page_hub(&server).await;

    let ctx = test_context(&server);
    let due = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    let mut busy = seed_hub(
        &ctx,
        new_hub("https://habr.com/ru/hubs/rust/articles/", 1, 10),
    );
    busy.status = CrawlStatus::AtWork;
    ctx.storage.with(|s| s.save_hub(&busy)).unwrap();

    let mut later = seed_hub(
        &ctx,
        new_hub("https://habr.com/ru/hubs/go/articles/", 1, 10),
    );
    later.next_check_at = Some(Utc::now() + chrono::Duration::hours(1));
    ctx.storage.with(|s| s.save_hub(&later)).unwrap();

    let mut sessions: JoinSet<Result<Hub>> = JoinSet::new();
    let started = trigger_due_hubs(&ctx, &mut sessions).await.unwrap();
    assert_eq!(started, 1);

    let finished = sessions.join_next().await.unwrap().unwrap().unwrap();
    assert_eq!(finished.id, due.id);
    assert_eq!(finished.status, CrawlStatus::Processed);
    assert!(sessions.join_next().await.is_none());

    let busy_after = ctx.storage.with(|s| s.get_hub(busy.id)).unwrap();
    assert_eq!(busy_after.status, CrawlStatus::AtWork);
    let later_after = ctx.storage.with(|s| s.get_hub(later.id)).unwrap();
    assert_eq!(later_after.status, CrawlStatus::Processed);
    assert_eq!(
        later_after.last_checked_at.timestamp(),
        later.last_checked_at.timestamp()
    );
}

#[tokio::test]
async fn test_run_once_crawls_each_due_hub_once() {
    let server = MockServer::start().await;
    mount_single_page_hub(&server).await;

    let ctx = test_context(&server);
    seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));
    seed_hub(
        &ctx,
        new_hub("https://habr.com/ru/hubs/rust/articles/", 1, 10),
    );

    let finished = run_once(&ctx).await.unwrap();
    assert_eq!(finished.len(), 2);
    assert!(finished.iter().all(|h| h.status == CrawlStatus::Processed));
    assert_eq!(ctx.storage.with(|s| s.count_articles()).unwrap(), 2);

    // Rescheduled ten minutes ahead, so nothing is due any more
    let again = run_once(&ctx).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_scheduler_loop_crawls_and_stops() {
    let server = MockServer::start().await;
    mount_single_page_hub(&server).await;

    let ctx = test_context(&server);
    let hub = seed_hub(&ctx, new_hub(CAREER_LINK, 1, 10));

    let shutdown = tokio::time::sleep(Duration::from_millis(300));
    tokio::time::timeout(Duration::from_secs(10), run_scheduler(ctx.clone(), shutdown))
        .await
        .expect("scheduler should stop after shutdown")
        .unwrap();

    let stored = ctx.storage.with(|s| s.get_hub(hub.id)).unwrap();
    assert_eq!(stored.status, CrawlStatus::Processed);
    assert!(stored.next_check_at.unwrap() > Utc::now());
    assert_eq!(ctx.storage.with(|s| s.count_articles()).unwrap(), 2);
}

#[tokio::test]
async fn test_erroring_hub_is_rescheduled_not_stuck() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctx = test_context(&server);
    let mut entry = new_hub(CAREER_LINK, 1, 10);
    entry.check_interval_secs = 1;
    let hub = seed_hub(&ctx, entry);

    let first = run_once(&ctx).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].status, CrawlStatus::Error);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Due again once its interval has passed
    let second = run_once(&ctx).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, hub.id);
}

use crate::common::*;
use habr_harvest::crawler::{FetchError, ListingPayload};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    // First answer is not valid JSON, the second one is
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(4, &[1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(3, Duration::from_secs(5));
    let listing: ListingPayload = fetcher
        .fetch_json(&format!("{}/listing", server.uri()))
        .await
        .unwrap();

    assert_eq!(listing.pages_count(), 4);
    assert_eq!(listing.article_ids().len(), 2);
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(3, Duration::from_secs(5));
    let result = fetcher
        .fetch_json::<ListingPayload>(&format!("{}/missing", server.uri()))
        .await;

    match result {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected a status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retries_are_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(3, Duration::from_secs(5));
    let result = fetcher
        .fetch_json::<ListingPayload>(&format!("{}/broken", server.uri()))
        .await;

    match result {
        Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected exhausted retries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_counts_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing_body(1, &[]))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(2, Duration::from_millis(200));
    let result = fetcher
        .fetch_json::<ListingPayload>(&format!("{}/slow", server.uri()))
        .await;

    let err = result.unwrap_err();
    assert!(!err.is_status());
    assert!(err.to_string().contains("timeout"), "{}", err);
}

#[tokio::test]
async fn test_user_agent_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(0, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(1, Duration::from_secs(5));
    let listing: ListingPayload = fetcher
        .fetch_json(&format!("{}/ua", server.uri()))
        .await
        .unwrap();

    assert!(listing.article_ids().is_empty());
}

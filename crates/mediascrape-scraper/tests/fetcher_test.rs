//! Integration tests for the HTTP fetcher against a mock server.

use std::time::{Duration, Instant};

use mediascrape_core::{Error, Fetcher};
use mediascrape_scraper::{extract_media, FetchConfig, HttpFetcher};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(config: FetchConfig) -> HttpFetcher {
    HttpFetcher::new(config).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_sends_identifying_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "media-scraper/1.0"))
        .and(header("accept", "text/html,application/xhtml+xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<img src=a.png>", "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = fetcher(FetchConfig::default())
        .fetch(&format!("{}/page", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "<img src=a.png>");
}

#[tokio::test]
async fn test_timeout_fails_with_fetch_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = FetchConfig::default().with_timeout(Duration::from_millis(300));
    let start = Instant::now();
    let err = fetcher(config)
        .fetch(&format!("{}/slow", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FetchTimeout(300)), "got {err:?}");
    assert!(!err.to_string().is_empty());
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_oversized_body_is_truncated_not_rejected() {
    let mock_server = MockServer::start().await;
    let big = "x".repeat(5_000);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(big, "text/html"))
        .mount(&mock_server)
        .await;

    let config = FetchConfig::default().with_max_body_chars(100);
    let body = fetcher(config)
        .fetch(&format!("{}/big", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body.chars().count(), 100);
}

#[tokio::test]
async fn test_truncation_counts_characters_not_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ééééé", "text/html; charset=utf-8"))
        .mount(&mock_server)
        .await;

    let config = FetchConfig::default().with_max_body_chars(3);
    let body = fetcher(config).fetch(&mock_server.uri()).await.unwrap();
    assert_eq!(body, "ééé");
}

#[tokio::test]
async fn test_non_html_content_type_is_still_returned() {
    let mock_server = MockServer::start().await;
    let html = r#"<video src="/v.mp4"></video>"#;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "application/octet-stream"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/mislabeled", mock_server.uri());
    let body = fetcher(FetchConfig::default()).fetch(&url).await.unwrap();
    let media = extract_media(&body, &url);
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].media_url, format!("{}/v.mp4", mock_server.uri()));
}

#[tokio::test]
async fn test_http_error_status_still_returns_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<img src=missing.png>", "text/html"))
        .mount(&mock_server)
        .await;

    let body = fetcher(FetchConfig::default())
        .fetch(&format!("{}/gone", mock_server.uri()))
        .await
        .unwrap();
    assert!(body.contains("missing.png"));
}

#[tokio::test]
async fn test_follows_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/new"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("moved here", "text/html"))
        .mount(&mock_server)
        .await;

    let body = fetcher(FetchConfig::default())
        .fetch(&format!("{}/old", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "moved here");
}

#[tokio::test]
async fn test_connection_failure_is_fetch_error() {
    // Bind then drop a listener so the port is known to be closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(FetchConfig::default())
        .fetch(&format!("http://{addr}/"))
        .await
        .unwrap_err();
    match err {
        Error::Fetch(msg) => assert!(!msg.is_empty()),
        other => panic!("expected fetch error, got {other:?}"),
    }
}

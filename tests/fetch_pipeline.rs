//! Integration tests for the fetch pipeline: service envelope over HTTP,
//! feed parsing and article normalization.
//!
//! Each test starts its own wiremock server standing in for the feed request
//! service.

use feedwell::fetch::{
    ClientError, FeedClient, FetchError, FetchErrorKind, FetchOptions, HttpTransport, RetryPolicy,
};
use feedwell::normalize::{FormatOptions, NormalizeOptions, PostProcessRule};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_URL: &str = "https://news.example.com/feed.xml";

const RSS_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <item>
      <title>First post</title>
      <link>https://news.example.com/first</link>
      <guid>first</guid>
      <category>rust</category>
      <category>feeds</category>
      <pubDate>Sun, 01 Jan 2023 00:00:00 GMT</pubDate>
      <description><![CDATA[<p>Look <img src="https://img.example.com/a.png"> and <a href="https://news.example.com/more">more</a></p> [link] [comments]]]></description>
    </item>
    <item>
      <title>Second post</title>
      <guid>second</guid>
    </item>
  </channel>
</rss>"#;

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn client_for(server: &MockServer) -> FeedClient {
    let transport = HttpTransport::new(reqwest::Client::new(), &server.uri())
        .with_timeout(Duration::from_secs(5));
    FeedClient::new(Arc::new(transport)).with_retry_policy(fast_policy(3))
}

async fn mount_envelope(server: &MockServer, status: u16, envelope: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v1/feed-requests"))
        .respond_with(ResponseTemplate::new(status).set_body_json(envelope))
        .mount(server)
        .await;
}

fn success_envelope() -> serde_json::Value {
    json!({
        "requestStatus": "success",
        "response": { "statusCode": 200, "body": RSS_BODY },
    })
}

// ============================================================================
// Article Normalization
// ============================================================================

#[tokio::test]
async fn test_articles_are_flattened_and_enriched() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, success_envelope()).await;

    let articles = client_for(&server)
        .fetch_feed_articles(FEED_URL, &NormalizeOptions::default())
        .await
        .unwrap()
        .expect("feed should not be pending");
    assert_eq!(articles.len(), 2);

    let first = &articles[0];
    let get = |key: &str| first.get(key).map(String::as_str);
    assert_eq!(get("id"), Some("first"));
    assert_eq!(get("title"), Some("First post"));
    assert_eq!(get("published"), Some("2023-01-01T00:00:00+00:00"));
    assert_eq!(get("categories.0"), Some("rust"));
    assert_eq!(get("categories.1"), Some("feeds"));
    assert_eq!(get("processed::categories"), Some("rust,feeds"));
    assert_eq!(
        get("extracted::description::image1"),
        Some("https://img.example.com/a.png")
    );
    assert_eq!(
        get("extracted::description::anchor1"),
        Some("https://news.example.com/more")
    );
    assert_eq!(get("processed::description::stripped"), None);

    let second = &articles[1];
    assert_eq!(second.get("title").map(String::as_str), Some("Second post"));
    assert!(!second.contains_key("processed::categories"));
}

#[tokio::test]
async fn test_article_options_apply_timezone_and_rules() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, success_envelope()).await;

    let options = NormalizeOptions {
        format_options: FormatOptions {
            date_timezone: Some("America/New_York".to_string()),
            date_format: None,
        },
        use_parser_rules: vec![PostProcessRule::StripRedditMarkers],
    };

    let article = client_for(&server)
        .fetch_feed_article(FEED_URL, "first", &options)
        .await
        .unwrap();

    assert_eq!(
        article.get("published").map(String::as_str),
        Some("2022-12-31T19:00:00-05:00")
    );
    let stripped = article
        .get("processed::description::stripped")
        .expect("rule should add the stripped description");
    assert!(!stripped.contains("[link]"));
    assert!(!stripped.contains("[comments]"));
}

#[tokio::test]
async fn test_missing_article_id_is_not_found() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, success_envelope()).await;

    let err = client_for(&server)
        .fetch_feed_article(FEED_URL, "nope", &NormalizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ArticleNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_random_article_comes_from_feed() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, success_envelope()).await;

    let article = client_for(&server)
        .fetch_random_feed_article(FEED_URL, &NormalizeOptions::default())
        .await
        .unwrap()
        .expect("feed has articles");
    let id = article.get("id").map(String::as_str);
    assert!(id == Some("first") || id == Some("second"));
}

#[tokio::test]
async fn test_invalid_timezone_fails_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_envelope()))
        .expect(0)
        .mount(&server)
        .await;

    let options = NormalizeOptions {
        format_options: FormatOptions {
            date_timezone: Some("Mars/Olympus_Mons".to_string()),
            date_format: None,
        },
        use_parser_rules: Vec::new(),
    };

    let err = client_for(&server)
        .fetch_feed_articles(FEED_URL, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Normalize(_)));
}

#[tokio::test]
async fn test_private_feed_url_rejected() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, success_envelope()).await;

    let err = client_for(&server)
        .fetch_feed_articles("http://192.168.1.10/feed.xml", &NormalizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl(_)));
}

// ============================================================================
// Service Outcomes
// ============================================================================

#[tokio::test]
async fn test_pending_feed() {
    let server = MockServer::start().await;
    mount_envelope(&server, 200, json!({ "requestStatus": "pending" })).await;
    let client = client_for(&server);

    let raw = client.fetch(FEED_URL, FetchOptions::default()).await.unwrap();
    assert!(raw.is_none());

    let articles = client
        .fetch_feed_articles(FEED_URL, &NormalizeOptions::default())
        .await
        .unwrap();
    assert!(articles.is_none());

    let err = client
        .fetch_feed_article(FEED_URL, "first", &NormalizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::StillPending));
}

#[tokio::test]
async fn test_origin_bad_status_code() {
    let server = MockServer::start().await;
    mount_envelope(
        &server,
        200,
        json!({ "requestStatus": "bad_status_code", "response": { "statusCode": 429 } }),
    )
    .await;

    let err = client_for(&server)
        .fetch(FEED_URL, FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::BadStatusCode(429)));
}

#[tokio::test]
async fn test_service_error_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/feed-requests"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch(FEED_URL, FetchOptions::default())
        .await
        .unwrap_err();

    match err {
        FetchError::ServerStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, json!({ "error": "boom" }));
        }
        other => panic!("expected ServerStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_exhausts_retries() {
    // Nothing listens on port 1.
    let transport = HttpTransport::new(reqwest::Client::new(), "http://127.0.0.1:1")
        .with_timeout(Duration::from_secs(2));
    let client = FeedClient::new(Arc::new(transport)).with_retry_policy(fast_policy(5));

    let options = FetchOptions {
        execute_if_not_cached: false,
        retries: Some(2),
    };
    let err = client.fetch(FEED_URL, options).await.unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Network);
    assert!(matches!(err, FetchError::Network { attempts: 2, .. }));
}

#[tokio::test]
async fn test_unparseable_payload_surfaces_source_error() {
    let server = MockServer::start().await;
    mount_envelope(
        &server,
        200,
        json!({
            "requestStatus": "success",
            "response": { "statusCode": 200, "body": "this is not a feed" },
        }),
    )
    .await;

    let err = client_for(&server)
        .fetch_feed_articles(FEED_URL, &NormalizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Source(_)));
}

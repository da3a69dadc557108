//! Integration tests for `GraphClient` using wiremock HTTP mocks.

use std::time::Duration;

use reelbot_engine::{MetricsError, MetricsSource, PublishError, Publisher};
use reelbot_graph::{GraphClient, GraphConfig};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "17841400000";

fn test_config(server: &MockServer) -> GraphConfig {
    let mut config = GraphConfig::new("test-token", USER);
    config.base_url = format!("{}/v19.0", server.uri());
    config.poll_interval = Duration::ZERO;
    config.max_polls = 3;
    config.read_backoff_base_ms = 0;
    config
}

fn test_client(server: &MockServer, media_base_url: Option<&str>) -> GraphClient {
    let mut config = test_config(server);
    config.media_base_url = media_base_url.map(str::to_owned);
    GraphClient::new(config).expect("client construction should not fail")
}

async fn mount_media_publish(server: &MockServer, media_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media_publish")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": media_id })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_container(server: &MockServer, container_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media")))
        .and(body_string_contains("media_type=REELS"))
        .and(body_string_contains("access_token=test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": container_id })))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, container_id: &str, status_code: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v19.0/{container_id}")))
        .and(query_param("fields", "status_code,status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status_code": status_code, "id": container_id })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn publish_runs_the_container_flow() {
    let server = MockServer::start().await;
    mount_container(&server, "c-1").await;
    mount_status(&server, "c-1", "FINISHED").await;

    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media_publish")))
        .and(body_string_contains("creation_id=c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "17900001" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v19.0/17900001"))
        .and(query_param("fields", "permalink"))
        .and(query_param("access_token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "permalink": "https://www.instagram.com/reel/abc/",
            "id": "17900001"
        })))
        .mount(&server)
        .await;

    let result = test_client(&server, None)
        .publish("https://cdn.example.com/reels/1.mp4", "No excuses.")
        .await
        .expect("publish should succeed");

    assert_eq!(result.external_media_id, "17900001");
    assert_eq!(
        result.permalink.as_deref(),
        Some("https://www.instagram.com/reel/abc/")
    );
}

#[tokio::test]
async fn polls_until_processing_finishes() {
    let server = MockServer::start().await;
    mount_container(&server, "c-2").await;

    Mock::given(method("GET"))
        .and(path("/v19.0/c-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status_code": "IN_PROGRESS" })),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_status(&server, "c-2", "FINISHED").await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media_publish")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "m-2" })))
        .mount(&server)
        .await;

    let result = test_client(&server, None)
        .publish("https://cdn.example.com/reels/2.mp4", "Keep going.")
        .await
        .expect("publish should succeed");

    assert_eq!(result.external_media_id, "m-2");
    // No permalink mock is mounted; the lookup failure is tolerated.
    assert_eq!(result.permalink, None);
}

#[tokio::test]
async fn local_locator_is_joined_onto_media_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media")))
        .and(body_string_contains("cdn.example.com"))
        .and(body_string_contains("7.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "c-7" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "c-7", "FINISHED").await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media_publish")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "m-7" })))
        .mount(&server)
        .await;

    let result = test_client(&server, Some("https://cdn.example.com/reels"))
        .publish("output/7.mp4", "Caption")
        .await
        .expect("publish should succeed");
    assert_eq!(result.external_media_id, "m-7");
}

#[tokio::test]
async fn local_locator_without_base_url_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = test_client(&server, None)
        .publish("output/7.mp4", "Caption")
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Permanent(_)));
}

#[tokio::test]
async fn server_error_on_create_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media")))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server, None)
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .unwrap_err();
    match err {
        PublishError::Transient(message) => assert!(message.contains("503")),
        other => panic!("expected Transient, got {other:?}"),
    }
}

#[tokio::test]
async fn api_rejection_is_permanent_and_carries_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media")))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "message": "Invalid parameter",
                "type": "OAuthException",
                "code": 100
            }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server, None)
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .unwrap_err();
    match err {
        PublishError::Permanent(message) => {
            assert!(message.contains("Invalid parameter"), "{message}");
            assert!(message.contains("code 100"), "{message}");
        }
        other => panic!("expected Permanent, got {other:?}"),
    }
}

#[tokio::test]
async fn container_error_is_permanent() {
    let server = MockServer::start().await;
    mount_container(&server, "c-3").await;
    mount_status(&server, "c-3", "ERROR").await;
    Mock::given(method("POST"))
        .and(path(format!("/v19.0/{USER}/media_publish")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = test_client(&server, None)
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Permanent(_)));
}

#[tokio::test]
async fn container_still_processing_after_last_poll_is_transient() {
    let server = MockServer::start().await;
    mount_container(&server, "c-4").await;
    mount_status(&server, "c-4", "IN_PROGRESS").await;

    let err = test_client(&server, None)
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .unwrap_err();
    match err {
        PublishError::Transient(message) => assert!(message.contains("3 polls"), "{message}"),
        other => panic!("expected Transient, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_permalink_lookup_does_not_hold_up_a_live_reel() {
    let server = MockServer::start().await;
    mount_container(&server, "c-5").await;
    mount_status(&server, "c-5", "FINISHED").await;
    mount_media_publish(&server, "m-5").await;
    Mock::given(method("GET"))
        .and(path("/v19.0/m-5"))
        .and(query_param("fields", "permalink"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "permalink": "https://www.instagram.com/reel/late/" }))
                .set_delay(Duration::from_secs(10)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.permalink_timeout = Duration::from_millis(200);
    let client = GraphClient::new(config).expect("client construction should not fail");

    let started = std::time::Instant::now();
    let result = client
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .expect("the reel is live even without a permalink");

    assert_eq!(result.external_media_id, "m-5");
    assert_eq!(result.permalink, None);
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
}

#[tokio::test]
async fn processing_budget_caps_the_container_wait() {
    let server = MockServer::start().await;
    mount_container(&server, "c-6").await;
    mount_status(&server, "c-6", "IN_PROGRESS").await;

    let mut config = test_config(&server);
    config.poll_interval = Duration::from_millis(20);
    config.max_polls = 10_000;
    config.processing_budget = Duration::from_millis(300);
    let client = GraphClient::new(config).expect("client construction should not fail");

    let started = std::time::Instant::now();
    let err = client
        .publish("https://cdn.example.com/r.mp4", "Caption")
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    match err {
        PublishError::Transient(message) => {
            assert!(message.contains("c-6 not finished"), "{message}");
        }
        other => panic!("expected Transient, got {other:?}"),
    }
}

#[test]
fn default_budgets_fit_inside_the_publish_timeout() {
    let publish_timeout = Duration::from_secs(120);
    let config = GraphConfig::new("t", USER).within_publish_timeout(publish_timeout);

    let worst_case =
        config.request_timeout * 2 + config.processing_budget + config.permalink_timeout;
    assert!(worst_case < publish_timeout, "{worst_case:?}");
    assert_eq!(config.request_timeout, Duration::from_secs(20));
    assert_eq!(config.permalink_timeout, Duration::from_secs(5));
    assert_eq!(config.processing_budget, Duration::from_secs(63));
    assert_eq!(config.max_polls, 12);
}

#[test]
fn short_publish_timeout_still_allows_one_poll() {
    let publish_timeout = Duration::from_secs(10);
    let config = GraphConfig::new("t", USER).within_publish_timeout(publish_timeout);

    let worst_case =
        config.request_timeout * 2 + config.processing_budget + config.permalink_timeout;
    assert!(worst_case < publish_timeout, "{worst_case:?}");
    assert_eq!(config.max_polls, 1);
}

#[tokio::test]
async fn insights_are_folded_into_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/17900001/insights"))
        .and(query_param("metric", "likes,comments,shares,reach,saved"))
        .and(query_param("access_token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "name": "likes", "period": "lifetime", "values": [{ "value": 250 }] },
                { "name": "comments", "period": "lifetime", "values": [{ "value": 14 }] },
                { "name": "shares", "period": "lifetime", "values": [{ "value": 36 }] },
                { "name": "reach", "period": "lifetime", "values": [{ "value": 6000 }] },
                { "name": "saved", "period": "lifetime", "values": [{ "value": 41 }] }
            ]
        })))
        .mount(&server)
        .await;

    let counts = test_client(&server, None)
        .fetch("17900001")
        .await
        .expect("insights should parse");
    assert_eq!(counts.likes, 250);
    assert_eq!(counts.comments, 14);
    assert_eq!(counts.shares, 36);
    assert_eq!(counts.reach, 6000);
    assert_eq!(counts.saves, 41);
}

#[tokio::test]
async fn insights_server_error_is_retried_then_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/m-9/insights"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_client(&server, None).fetch("m-9").await.unwrap_err();
    assert!(matches!(err, MetricsError::Unavailable(_)));
}

#[tokio::test]
async fn insights_for_unknown_media_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/gone/insights"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "message": "Object does not exist", "code": 100 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server, None).fetch("gone").await.unwrap_err();
    assert!(matches!(err, MetricsError::Rejected(_)));
}

//! Integration tests for the usage API client against a mock server.

mod common;

use common::*;
use std::time::Duration;
use tally::config::UsageApiConfig;
use tally::usage::{UsageAggregate, UsageApiClient, UsageApiError, UsageSource, UsageWindow};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(config: &UsageApiConfig) -> UsageApiClient {
    UsageApiClient::new(config, ADMIN_KEY.to_string()).unwrap()
}

fn run_window() -> UsageWindow {
    UsageWindow::new(RUN_START, RUN_END).unwrap()
}

#[tokio::test]
async fn test_request_carries_filter_width_and_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("starting_at", RUN_START_RFC3339))
        .and(query_param("ending_at", RUN_END_RFC3339))
        .and(query_param("bucket_width", "1m"))
        .and(query_param("api_key_ids[]", AGENTIC_KEY))
        .and(query_param("group_by[]", "api_key_id"))
        .and(query_param("limit", "11"))
        .and(header("x-api-key", ADMIN_KEY))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(r1_page(AGENTIC_KEY)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let total = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap();

    assert_eq!(total, UsageAggregate::new(5000, 2000, 3, 0));
}

#[tokio::test]
async fn test_every_row_in_every_bucket_is_summed() {
    let mock_server = MockServer::start().await;

    // Two rows for the same key in one bucket, as returned for split model usage
    let page = usage_page(vec![
        minute_bucket(
            0,
            vec![
                usage_row(AGENTIC_KEY, 100, 20, 50, 1),
                usage_row(AGENTIC_KEY, 200, 30, 60, 2),
            ],
        ),
        minute_bucket(1, vec![usage_row(AGENTIC_KEY, 300, 0, 70, 1)]),
        minute_bucket(2, vec![]),
    ]);
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .mount(&mock_server)
        .await;

    let total = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap();

    assert_eq!(total.tokens_in, 100 + 20 + 200 + 30 + 300);
    assert_eq!(total.cached_tokens, 50);
    assert_eq!(total.tokens_out, 180);
    assert_eq!(total.api_calls, 4);
}

#[tokio::test]
async fn test_shared_bucket_never_bleeds_between_keys() {
    let mock_server = MockServer::start().await;

    // Multi-tenant response: both frameworks ran in the same minutes
    let shared = usage_page(vec![
        minute_bucket(
            0,
            vec![
                usage_row(AGENTIC_KEY, 1000, 0, 400, 2),
                usage_row(BASELINE_KEY, 7000, 0, 900, 5),
            ],
        ),
        minute_bucket(
            1,
            vec![
                usage_row(BASELINE_KEY, 3000, 0, 100, 1),
                usage_row(AGENTIC_KEY, 500, 0, 100, 1),
            ],
        ),
    ]);
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(shared))
        .mount(&mock_server)
        .await;

    let client = client(&api_config(&mock_server.uri()));
    let (agentic, baseline) = tokio::join!(
        client.fetch_usage(run_window(), AGENTIC_KEY),
        client.fetch_usage(run_window(), BASELINE_KEY),
    );

    assert_eq!(agentic.unwrap(), UsageAggregate::new(1500, 500, 3, 0));
    assert_eq!(baseline.unwrap(), UsageAggregate::new(10000, 1000, 6, 0));
}

#[tokio::test]
async fn test_pagination_followed_to_the_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_page_with_more(
            vec![minute_bucket(0, vec![usage_row(AGENTIC_KEY, 100, 0, 10, 1)])],
            "cursor-2",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("page", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_page(vec![
            minute_bucket(1, vec![usage_row(AGENTIC_KEY, 200, 0, 20, 1)]),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let total = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap();

    assert_eq!(total, UsageAggregate::new(300, 30, 2, 0));
}

#[tokio::test]
async fn test_pagination_capped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(usage_page_with_more(vec![], "again")),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = UsageApiConfig {
        max_pages: 2,
        ..api_config(&mock_server.uri())
    };
    let err = client(&config)
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();

    assert!(matches!(err, UsageApiError::InvalidResponse(ref m) if m.contains("2 pages")));
}

#[tokio::test]
async fn test_has_more_without_cursor_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [],
            "has_more": true
        })))
        .mount(&mock_server)
        .await;

    let err = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();
    assert!(matches!(err, UsageApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_empty_report_is_zero_not_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_page(vec![])))
        .mount(&mock_server)
        .await;

    let total = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap();
    assert!(total.is_zero());
}

#[tokio::test]
async fn test_day_long_window_uses_hourly_buckets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("bucket_width", "1h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_page(vec![])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // 1441 minutes: one more than a page of minute buckets
    let window = UsageWindow::new(RUN_START, RUN_START + 1441 * 60).unwrap();
    client(&api_config(&mock_server.uri()))
        .fetch_usage(window, AGENTIC_KEY)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&mock_server)
        .await;

    let err = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        UsageApiError::RateLimited {
            retry_after: Some(30)
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient_client_error_is_not() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("api_key_ids[]", AGENTIC_KEY))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("api_key_ids[]", BASELINE_KEY))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&mock_server)
        .await;

    let client = client(&api_config(&mock_server.uri()));

    let err = client.fetch_usage(run_window(), AGENTIC_KEY).await.unwrap_err();
    assert_eq!(
        err,
        UsageApiError::Upstream {
            status: 503,
            message: "overloaded".to_string()
        }
    );
    assert!(err.is_transient());

    let err = client.fetch_usage(run_window(), BASELINE_KEY).await.unwrap_err();
    assert!(matches!(err, UsageApiError::Upstream { status: 403, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_an_error_not_zero() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "buckets": []
        })))
        .mount(&mock_server)
        .await;

    let err = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();

    assert!(matches!(err, UsageApiError::InvalidResponse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_inverted_bucket_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "starting_at": RUN_END_RFC3339,
                "ending_at": RUN_START_RFC3339,
                "results": []
            }],
            "has_more": false
        })))
        .mount(&mock_server)
        .await;

    let err = client(&api_config(&mock_server.uri()))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();
    assert!(matches!(err, UsageApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(usage_page(vec![]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = UsageApiConfig {
        timeout_seconds: 1,
        ..api_config(&mock_server.uri())
    };
    let err = client(&config)
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();

    assert_eq!(err, UsageApiError::Timeout(1));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on the discard port
    let err = client(&api_config("http://127.0.0.1:9"))
        .fetch_usage(run_window(), AGENTIC_KEY)
        .await
        .unwrap_err();

    assert!(matches!(err, UsageApiError::Network(_)));
    assert!(err.is_transient());
}

//! Integration tests for the server client against a mock server.

use archive_client_core::api::{CustomHeader, SearchQuery, SortDirection, SortMethod};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::server::{harness, harness_with, requests_to};
use support::socket_guard::start_mock_server_or_skip;

#[tokio::test]
async fn test_unconfigured_server_sends_nothing() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let h = harness("", "").await;

    assert!(h.context.client().server_info().await.is_none());
    assert!(h.context.client().categories().await.is_none());
    assert!(!h.context.client().clear_temp_folder().await);

    let received = mock_server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "no request may be sent: {received:?}");
    assert!(h.notices.errors().is_empty(), "skips are silent");
}

#[tokio::test]
async fn test_requests_carry_bearer_key_and_custom_headers() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .and(header("authorization", "Bearer c2VjcmV0"))
        .and(header("x-tunnel", "on"))
        .and(header("x-trace", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Test Server",
            "version": "0.9",
            "archives_per_page": "25",
            "server_tracks_progress": "1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "secret").await;
    h.context
        .set_custom_headers(vec![
            CustomHeader::new("X-Tunnel", "on"),
            CustomHeader::new("X-Trace", "1"),
        ])
        .await
        .expect("headers should save");

    let info = h
        .context
        .client()
        .server_info()
        .await
        .expect("server info");

    assert_eq!(info.name, "Test Server");
    assert_eq!(info.page_size(), 25);
    assert!(info.server_tracks_progress);
}

#[tokio::test]
async fn test_empty_api_key_sends_no_authorization() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    assert_eq!(h.context.client().categories().await, Some(Vec::new()));

    let received = mock_server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_application_error_in_success_body_is_reported() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/archives/missing/metadata"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"error": "No archive found", "success": 0})),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;

    assert!(h.context.client().archive("missing").await.is_none());
    assert_eq!(h.notices.errors(), vec!["Could not load archive".to_string()]);
}

#[tokio::test]
async fn test_verbose_errors_include_status() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/archives"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let h = harness_with(&mock_server.uri(), "", |c| c.verbose_errors = true).await;

    assert!(h.context.client().archive_list().await.is_none());
    let errors = h.notices.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Could not load archives: "));
    assert!(errors[0].contains("500"), "cause should be included: {}", errors[0]);
}

#[tokio::test]
async fn test_unreachable_server_reports_once() {
    let h = harness("http://127.0.0.1:9", "").await;

    assert!(h.context.client().server_info().await.is_none());
    assert_eq!(
        h.notices.errors(),
        vec!["Could not read server information".to_string()]
    );
}

#[tokio::test]
async fn test_forced_extraction_polls_job_then_refetches_pages() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/api/archives/abc/extract"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job": 42})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/archives/abc/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pages": ["./api/archives/abc/page?path=001.jpg", "./api/archives/abc/page?path=002.jpg"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "active"})))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "finished"})),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let pages = h
        .context
        .client()
        .extract_archive("abc", true)
        .await
        .expect("pages after job");

    assert_eq!(pages.len(), 2);
    assert_eq!(requests_to(&mock_server, "GET", "/api/minion/42").await.len(), 3);
    assert_eq!(
        h.context.client().page_url(&pages[0]),
        format!("{}/api/archives/abc/page?path=001.jpg", mock_server.uri())
    );
}

#[tokio::test]
async fn test_failed_job_fails_extraction() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/api/archives/abc/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job": 7})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "failed"})))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;

    assert!(h.context.client().extract_archive("abc", true).await.is_none());
    assert_eq!(h.notices.errors(), vec!["Could not extract archive".to_string()]);
    assert_eq!(requests_to(&mock_server, "POST", "/api/archives").await.len(), 1);
}

#[tokio::test]
async fn test_accepted_thumbnail_waits_for_job() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/archives/abc/thumbnail"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({"job": 9})))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/archives/abc/thumbnail"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "finished"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let bytes = h
        .context
        .client()
        .thumbnail("abc", 3)
        .await
        .expect("thumbnail bytes");

    assert_eq!(&bytes[..], b"thumb");
    assert_eq!(
        requests_to(&mock_server, "GET", "/api/archives/abc/thumbnail").await.len(),
        2
    );
}

#[tokio::test]
async fn test_search_sends_criteria_as_query() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("filter", "artist:x"))
        .and(query_param("category", "SET_1"))
        .and(query_param("start", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"arcid": "a1", "title": "One", "isnew": "true"}],
            "recordsFiltered": 51,
            "recordsTotal": 300
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let result = h
        .context
        .client()
        .search(&SearchQuery {
            filter: "artist:x".to_string(),
            category: "SET_1".to_string(),
            new_only: false,
            sort: SortMethod::Title,
            direction: SortDirection::Asc,
            start: 50,
        })
        .await
        .expect("search result");

    assert_eq!(result.records_filtered, 51);
    assert_eq!(result.data[0].id, "a1");
    assert!(result.data[0].isnew);
}

#[tokio::test]
async fn test_cancelled_scope_abandons_request_silently() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"name": "slow"}))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let (scope, client) = h.context.screen_scope();
    let request = tokio::spawn(async move { client.server_info().await });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    scope.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(1), request)
        .await
        .expect("cancellation should end the request promptly")
        .expect("task should not panic");

    assert!(result.is_none());
    assert!(h.notices.errors().is_empty(), "cancellation is not an error");
}

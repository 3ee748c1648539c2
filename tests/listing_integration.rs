//! Integration tests for listing source selection.

use archive_client_core::StrategyKind;
use archive_client_core::api::SortMethod;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::server::{harness, harness_with, requests_to};
use support::socket_guard::start_mock_server_or_skip;

fn archive(id: &str, title: &str, tags: &str) -> serde_json::Value {
    serde_json::json!({ "arcid": id, "title": title, "tags": tags, "isnew": "false" })
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/archives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            archive("a1", "Delta", "artist:alice, date_added:40"),
            archive("a2", "alpha", "artist:bob, date_added:30"),
            archive("a3", "Charlie", "artist:alice, date_added:20"),
            archive("a4", "Bravo", "artist:alice, parody:x, date_added:10"),
        ])))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_server_listing_pages_by_start_offset() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("a1", "One", ""), archive("a2", "Two", "")],
            "recordsFiltered": 3,
            "recordsTotal": 3
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("a3", "Three", "")],
            "recordsFiltered": 3,
            "recordsTotal": 3
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.mark_initialized();
    assert_eq!(selector.active_kind(), StrategyKind::Default);

    let first = selector.next_page().await.expect("first page");
    let second = selector.next_page().await.expect("second page");

    assert_eq!(first.archives.len(), 2);
    assert_eq!(first.total, 3);
    assert_eq!(second.archives[0].id, "a3");
    assert!(selector.next_page().await.is_none(), "listing exhausted");
}

#[tokio::test]
async fn test_uninitialized_listing_sends_nothing() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let h = harness(&mock_server.uri(), "").await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.set_filter("alice");

    assert_eq!(selector.active_kind(), StrategyKind::Empty);
    assert!(selector.next_page().await.is_none());
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_local_filter_uses_catalog_loaded_once() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_catalog(&mock_server).await;

    let h = harness_with(&mock_server.uri(), "", |c| c.local_mode = true).await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.set_page_size(2);
    selector.batch(|s| {
        s.set_filter("alice, -parody");
        s.mark_initialized();
    });
    assert_eq!(selector.active_kind(), StrategyKind::LocalFiltered);

    let page = selector.next_page().await.expect("local page");
    let ids: Vec<&str> = page.archives.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a3", "a1"], "title order, parody excluded");
    assert_eq!(page.total, 2);
    assert!(selector.next_page().await.is_none());

    selector.set_filter("");
    selector.set_sort(SortMethod::DateAdded);
    let page = selector.next_page().await.expect("default local page");
    let ids: Vec<&str> = page.archives.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a4", "a3"]);
    assert_eq!(page.total, 4);

    assert!(requests_to(&mock_server, "GET", "/api/search").await.is_empty());
}

#[tokio::test]
async fn test_random_sample_is_fetched_once_until_count_changes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/search/random"))
        .and(query_param("count", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("r1", "R1", ""), archive("r2", "R2", "")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search/random"))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("r3", "R3", "")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.batch(|s| {
        s.set_random_count(2);
        s.mark_initialized();
    });

    let sample = selector.next_page().await.expect("random sample");
    assert_eq!(sample.archives.len(), 2);
    assert!(selector.next_page().await.is_none());

    selector.set_sort(SortMethod::DateAdded);
    assert!(selector.next_page().await.is_none(), "sample is kept");

    selector.set_random_count(1);
    let sample = selector.next_page().await.expect("new sample");
    assert_eq!(sample.archives[0].id, "r3");
}

#[tokio::test]
async fn test_deleted_category_falls_through_to_default() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "SET_1", "name": "Favourites", "archives": ["a1"], "pinned": "1", "search": "" }
        ])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("a1", "One", "")],
            "recordsFiltered": 1,
            "recordsTotal": 1
        })))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.batch(|s| {
        s.set_category_id("SET_1");
        s.mark_initialized();
    });
    assert_eq!(selector.active_kind(), StrategyKind::Category);

    assert!(h.context.categories().refresh().await);
    assert!(h.context.categories().refresh().await);
    let before = selector.generation();

    assert!(selector.next_page().await.is_some());

    assert_eq!(selector.criteria().category_id(), "");
    assert!(selector.generation() > before);
    let searches = requests_to(&mock_server, "GET", "/api/search").await;
    assert_eq!(searches.len(), 1);
    assert!(!searches[0].contains("category="), "category dropped: {}", searches[0]);
}

#[tokio::test]
async fn test_failed_page_keeps_cursor_for_retry() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [archive("a1", "One", "")],
            "recordsFiltered": 1,
            "recordsTotal": 1
        })))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), "").await;
    let mut selector = h.context.listing(h.context.client().clone());
    selector.batch(|s| {
        s.set_filter("one");
        s.mark_initialized();
    });
    assert_eq!(selector.active_kind(), StrategyKind::ServerFiltered);

    assert!(selector.next_page().await.is_none());
    assert_eq!(h.notices.errors(), vec!["Search failed".to_string()]);

    let page = selector.next_page().await.expect("retry succeeds");
    assert_eq!(page.archives[0].id, "a1");
}

//! Pagination behavior of the Scopus provider against a mock HTTP server.

use litharvest::config::ProviderConfig;
use litharvest::{FetchStatus, ScopusProvider, SearchRequest, SourceProvider};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(index: usize) -> Value {
    json!({
        "dc:title": format!("Paper {index}"),
        "prism:doi": format!("10.1000/paper.{index}"),
        "prism:coverDate": "2022-03-15",
        "citedby-count": index.to_string(),
        "author": [{"authname": "A. Author", "afid": "1"}],
    })
}

fn page_body(start: usize, count: usize) -> Value {
    let entries: Vec<Value> = (start..start + count).map(entry).collect();
    json!({"search-results": {"entry": entries}})
}

fn provider_for(server: &MockServer) -> ScopusProvider {
    let config = ProviderConfig {
        api_key: "test-key".to_string(),
        api_url: format!("{}/content/search/scopus", server.uri()),
        rate_limit_pause_secs: 0.0,
        retry_base_delay_ms: 1,
        ..ProviderConfig::default()
    };
    ScopusProvider::new(&config).expect("provider construction")
}

#[tokio::test]
async fn test_two_pages_fetched_in_offset_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(header("X-ELS-APIKey", "test-key"))
        .and(header("Accept", "application/json"))
        .and(query_param("view", "COMPLETE"))
        .and(query_param("count", "100"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, 100)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(100, 50)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("wildfire".to_string(), 150);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    // Exactly two requests, at offsets 0 and 100
    assert_eq!(outcome.requests, 2);
    assert_eq!(outcome.entries.len(), 150);
    assert_eq!(outcome.status, FetchStatus::Complete);

    // Entries arrive in fetch order
    let titles: Vec<&str> = outcome
        .entries
        .iter()
        .filter_map(|e| e["dc:title"].as_str())
        .collect();
    assert_eq!(titles[0], "Paper 0");
    assert_eq!(titles[99], "Paper 99");
    assert_eq!(titles[149], "Paper 149");
}

#[tokio::test]
async fn test_page_count_is_capped_by_max_results() {
    let server = MockServer::start().await;

    // A 50-result request must ask the provider for 50, not a full page
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("count", "50"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, 50)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("wildfire".to_string(), 50);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    assert_eq!(outcome.requests, 1);
    assert_eq!(outcome.entries.len(), 50);
    assert_eq!(outcome.status, FetchStatus::Complete);
}

#[tokio::test]
async fn test_short_page_terminates_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, 30)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("rare topic".to_string(), 500);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    assert_eq!(outcome.requests, 1);
    assert_eq!(outcome.entries.len(), 30);
    assert_eq!(outcome.status, FetchStatus::Complete);
}

#[tokio::test]
async fn test_empty_first_page_is_a_complete_empty_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"search-results": {"entry": []}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("nothing".to_string(), 100);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    assert!(outcome.entries.is_empty());
    assert_eq!(outcome.status, FetchStatus::Complete);
}

#[tokio::test]
async fn test_server_error_on_second_page_degrades_to_partial() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, 100)))
        .mount(&server)
        .await;

    // Persistent 500 exhausts the retries
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("wildfire".to_string(), 300);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    // First page survives; the failure is reported, not swallowed
    assert_eq!(outcome.entries.len(), 100);
    assert!(matches!(outcome.status, FetchStatus::Partial { .. }));
}

#[tokio::test]
async fn test_permanent_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("(((".to_string(), 100);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    assert!(outcome.entries.is_empty());
    assert!(matches!(outcome.status, FetchStatus::Partial { .. }));
}

#[tokio::test]
async fn test_transient_failure_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    // First attempt fails, the retry hits the fallback mock
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, 5)))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = SearchRequest::new("wildfire".to_string(), 100);
    let outcome = provider.fetch_raw(&request).await.unwrap();

    assert_eq!(outcome.entries.len(), 5);
    assert_eq!(outcome.status, FetchStatus::Complete);
}

//! Integration tests for the transport and the paginated fetcher using wiremock
//!
//! These tests verify retry behavior, status handling and continuation-token
//! aggregation against mocked Databricks endpoints.

mod common;

use halt_workspace::resource::{fetch_collection, query_params};
use halt_workspace::HaltError;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{bearer_token, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test module for transport behavior
mod transport_tests {
    use super::*;

    /// Requests carry the bearer token and JSON content type
    #[tokio::test]
    async fn test_requests_are_authenticated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .and(bearer_token(common::TOKEN))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clusters": []})))
            .expect(1)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let body = session
            .http
            .get(&session.api("2.0", "clusters/list"), &[])
            .await
            .expect("Request should succeed");

        assert_eq!(body, json!({"clusters": []}));
    }

    /// 503 is retried until the server recovers
    #[tokio::test]
    async fn test_retryable_status_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/sql/warehouses"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/sql/warehouses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"warehouses": [{"id": "w1"}]})))
            .expect(1)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let body = session
            .http
            .get(&session.api("2.0", "sql/warehouses"), &[])
            .await
            .expect("Request should succeed after retries");

        assert_eq!(body["warehouses"][0]["id"], "w1");
    }

    /// A 429 carrying Retry-After waits at least that long before retrying
    #[tokio::test]
    async fn test_retry_after_is_honored() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clusters": []})))
            .expect(1)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let started = Instant::now();
        session
            .http
            .get(&session.api("2.0", "clusters/list"), &[])
            .await
            .expect("Request should succeed after waiting");

        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    /// A persistent 429 fails after the initial attempt plus five retries
    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.1/jobs/runs/cancel"))
            .respond_with(ResponseTemplate::new(429))
            .expect(6)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let err = session
            .http
            .post(&session.api("2.1", "jobs/runs/cancel"), Some(&json!({"run_id": 1})))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
    }

    /// 404 is not retried and surfaces as an HTTP error
    #[tokio::test]
    async fn test_404_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(common::principal_path(99)))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let url = session.account_workspace_url("permissionassignments/principals/99");
        let err = session.http.delete(&url).await.unwrap_err();

        assert!(matches!(err, HaltError::Http { status: 404, .. }));
    }

    /// Empty 200 bodies decode as null
    #[tokio::test]
    async fn test_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/sql/warehouses/w1/stop"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let session = common::session(&server);
        let body = session
            .http
            .post(&session.api("2.0", "sql/warehouses/w1/stop"), None)
            .await
            .expect("Request should succeed");

        assert!(body.is_null());
    }
}

/// Test module for continuation-token pagination
mod pagination_tests {
    use super::*;

    /// Pages are concatenated in arrival order and query params are kept
    #[tokio::test]
    async fn test_pages_are_aggregated_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/runs/list"))
            .and(query_param("limit", "25"))
            .and(query_param_is_missing("page_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "runs": [{"run_id": 1}, {"run_id": 2}],
                "has_more": true,
                "next_page_token": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/runs/list"))
            .and(query_param("limit", "25"))
            .and(query_param("page_token", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "runs": [{"run_id": 3}],
                "has_more": true,
                "next_page_token": "page-3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/runs/list"))
            .and(query_param("page_token", "page-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "runs": [{"run_id": 4}, {"run_id": 5}],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let collection = fetch_collection(
            &session.http,
            &session.api("2.1", "jobs/runs/list"),
            "runs",
            &query_params(&[("limit", "25")]),
        )
        .await
        .expect("Fetch should succeed");

        let ids: Vec<i64> = collection
            .items()
            .iter()
            .map(|r| r["run_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(collection.document().get("next_page_token").is_none());
        assert!(collection.document().get("has_more").is_none());
    }

    /// A single page without the aggregate key is an empty listing
    #[tokio::test]
    async fn test_single_page_without_key_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"has_more": false})))
            .mount(&server)
            .await;

        let session = common::session(&server);
        let collection = fetch_collection(&session.http, &session.api("2.1", "jobs/list"), "jobs", &[])
            .await
            .expect("Fetch should succeed");

        assert!(collection.is_empty());
    }

    /// A continuation page missing the aggregate key is a protocol error
    #[tokio::test]
    async fn test_continuation_without_key_is_protocol_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/list"))
            .and(query_param_is_missing("page_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobs": [{"job_id": 1}],
                "has_more": true,
                "next_page_token": "t2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/list"))
            .and(query_param("page_token", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"has_more": false})))
            .mount(&server)
            .await;

        let session = common::session(&server);
        let err = fetch_collection(&session.http, &session.api("2.1", "jobs/list"), "jobs", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, HaltError::Protocol(ref msg) if msg.contains("'jobs'")));
    }

    /// A server that keeps returning the same token is cut off
    #[tokio::test]
    async fn test_repeated_token_is_protocol_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clusters": [{"cluster_id": "c"}],
                "has_more": true,
                "next_page_token": "same"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let session = common::session(&server);
        let err = fetch_collection(&session.http, &session.api("2.0", "clusters/list"), "clusters", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, HaltError::Protocol(ref msg) if msg.contains("repeated")));
    }

    /// A failing page aborts the whole fetch
    #[tokio::test]
    async fn test_failed_page_aborts_fetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .and(query_param_is_missing("page_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clusters": [{"cluster_id": "a"}],
                "has_more": true,
                "next_page_token": "t2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .and(query_param("page_token", "t2"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let session = common::session(&server);
        let err = fetch_collection(&session.http, &session.api("2.0", "clusters/list"), "clusters", &[])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
    }
}

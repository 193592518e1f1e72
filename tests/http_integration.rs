//! Integration tests for the GCP HTTP layer using wiremock
//!
//! These tests run the built-in REST kinds against mocked endpoints: status
//! code mapping, pagination cursors, aggregated lists and the full fan-out
//! across identities.

use serde_json::json;
use std::sync::Arc;
use tfleet::config::Config;
use tfleet::context::{ExecContext, OperationContext, Region, ResourceFilter, Selection};
use tfleet::error::ResourceError;
use tfleet::gcp::auth::StaticCredentials;
use tfleet::gcp::client::Endpoints;
use tfleet::gcp::http::GcpHttpClient;
use tfleet::plugins::{register_builtin, GcpBackend};
use tfleet::resource::{
    CapabilityRegistry, FetchOrchestrator, FetchSettings, ResourceItem, ResourceKind,
};
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test module for the raw HTTP client
mod http_client_tests {
    use super::*;

    async fn get(server: &MockServer, route: &str) -> Result<serde_json::Value, ResourceError> {
        let client = GcpHttpClient::new().unwrap();
        client
            .get(&format!("{}{}", server.uri(), route), "test-token")
            .await
    }

    /// Test successful GET request returns parsed JSON
    #[tokio::test]
    async fn test_get_success_returns_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "us-central1-a"}, {"name": "us-central1-b"}]
            })))
            .mount(&server)
            .await;

        let response = get(&server, "/compute/v1/projects/test-project/zones")
            .await
            .expect("Request should succeed");

        assert_eq!(response["items"].as_array().unwrap().len(), 2);
        assert_eq!(response["items"][0]["name"], "us-central1-a");
    }

    /// Test 404 maps to NotFound with the project-relative path
    #[tokio::test]
    async fn test_404_returns_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/p/zones/z/instances/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The resource was not found"}
            })))
            .mount(&server)
            .await;

        let err = get(&server, "/compute/v1/projects/p/zones/z/instances/gone")
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::NotFound(ref p) if p == "p/zones/z/instances/gone"));
    }

    /// Test 401 is a credential problem, never echoing the body
    #[tokio::test]
    async fn test_401_returns_credential_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "secret-detail"}
            })))
            .mount(&server)
            .await;

        let err = get(&server, "/compute/v1/projects/test-project/zones")
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::Credential(_)));
        assert!(!err.to_string().contains("secret-detail"));
    }

    /// Test 5xx and 429 are transient
    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/unavailable"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = get(&server, "/unavailable").await.unwrap_err();
        assert!(matches!(err, ResourceError::Transient(ref m) if m.contains("temporarily unavailable")));

        let err = get(&server, "/throttled").await.unwrap_err();
        assert!(matches!(err, ResourceError::Transient(ref m) if m.contains("Rate limit")));
    }

    /// Test empty success body (e.g. DELETE) yields null
    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = GcpHttpClient::new().unwrap();
        let response = client
            .delete(&format!("{}/storage/v1/b/logs", server.uri()), "t")
            .await
            .unwrap();
        assert!(response.is_null());
    }

    /// Test malformed JSON is reported, not panicked on
    #[tokio::test]
    async fn test_malformed_json_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = get(&server, "/broken").await.unwrap_err();
        assert!(matches!(err, ResourceError::Transient(ref m) if m.contains("parse")));
    }
}

/// Test module for the built-in kinds driven through the orchestrator
mod fleet_tests {
    use super::*;

    fn prod() -> Selection {
        Selection::Named("prod".into())
    }

    fn fetcher(server: &MockServer, settings: FetchSettings) -> FetchOrchestrator {
        let credentials = Arc::new(StaticCredentials::new([
            (Selection::DefaultChain, "proj-a".to_string()),
            (prod(), "proj-b".to_string()),
        ]));
        let backend = GcpBackend::new(credentials.clone(), GcpHttpClient::new().unwrap())
            .with_endpoints(Endpoints::with_base(&server.uri()));

        let mut registry = CapabilityRegistry::new();
        register_builtin(&mut registry, &backend, &Config::default());

        FetchOrchestrator::new(Arc::new(registry), credentials, settings)
    }

    fn op(selections: Vec<Selection>, regions: &[&str]) -> OperationContext {
        OperationContext::new(selections, regions.iter().map(|r| Region::new(*r)).collect()).unwrap()
    }

    fn kind(s: &str) -> ResourceKind {
        s.parse().unwrap()
    }

    fn ids(items: &[ResourceItem]) -> Vec<String> {
        items.iter().map(ResourceItem::id).collect()
    }

    fn aggregated_instances() -> serde_json::Value {
        json!({
            "items": {
                "zones/us-central1-a": {
                    "instances": [{
                        "name": "vm-1",
                        "status": "RUNNING",
                        "zone": "https://compute.googleapis.com/compute/v1/projects/proj-a/zones/us-central1-a",
                        "machineType": "https://compute.googleapis.com/compute/v1/projects/proj-a/zones/us-central1-a/machineTypes/e2-small"
                    }]
                },
                "zones/us-central1-b": {
                    "warning": {"code": "NO_RESULTS_ON_PAGE"}
                },
                "zones/europe-west1-b": {
                    "instances": [{
                        "name": "vm-2",
                        "status": "TERMINATED",
                        "zone": "https://compute.googleapis.com/compute/v1/projects/proj-a/zones/europe-west1-b"
                    }]
                }
            }
        })
    }

    /// Aggregated instances are narrowed to the pair's region and keyed by zone
    #[tokio::test]
    async fn test_instances_filtered_to_region() {
        let server = MockServer::start().await;

        // the server-side filter names the region; the client narrows again
        for region in ["us-central1", "europe-west1"] {
            Mock::given(method("GET"))
                .and(path("/compute/v1/projects/proj-a/aggregated/instances"))
                .and(query_param("filter", format!("zone eq .*/zones/{}-[a-z]", region)))
                .and(bearer_token("token-default"))
                .respond_with(ResponseTemplate::new(200).set_body_json(aggregated_instances()))
                .mount(&server)
                .await;
        }

        let fetcher = fetcher(&server, FetchSettings::default());
        let result = fetcher
            .load_resources(
                &ExecContext::new(),
                &kind("compute/instances"),
                &op(vec![Selection::DefaultChain], &["us-central1"]),
            )
            .await
            .unwrap();

        assert_eq!(ids(&result.resources), vec!["us-central1-a/vm-1"]);
        assert!(!result.resources[0].is_scoped());
        assert_eq!(result.resources[0].raw()["machineType_short"], "e2-small");

        // two regions: each pair keeps only its own zones
        let result = fetcher
            .load_resources(
                &ExecContext::new(),
                &kind("compute/instances"),
                &op(vec![Selection::DefaultChain], &["us-central1", "europe-west1"]),
            )
            .await
            .unwrap();
        assert_eq!(
            ids(&result.resources),
            vec!["us-central1/us-central1-a/vm-1", "europe-west1/europe-west1-b/vm-2"]
        );
    }

    /// Cursor from one page is sent back on the next
    #[tokio::test]
    async fn test_subnetworks_paginate() {
        let server = MockServer::start().await;
        let route = "/compute/v1/projects/proj-a/regions/us-central1/subnetworks";

        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("pageToken", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "subnet-c"}]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("maxResults", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "subnet-a", "network": "https://x/global/networks/default"},
                    {"name": "subnet-b"}
                ],
                "nextPageToken": "t2"
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(
            &server,
            FetchSettings {
                page_size: 2,
                ..FetchSettings::default()
            },
        );
        let k = kind("compute/subnetworks");
        let op = op(vec![Selection::DefaultChain], &["us-central1"]);
        let ctx = ExecContext::new();

        let mut result = fetcher.load_resources(&ctx, &k, &op).await.unwrap();
        assert_eq!(ids(&result.resources), vec!["subnet-a", "subnet-b"]);
        assert_eq!(result.resources[0].raw()["network_short"], "default");
        assert!(result.has_more());

        let next = fetcher.load_next_page(&ctx, &k, &op, &result.page_tokens).await.unwrap();
        result.append(next);
        assert_eq!(ids(&result.resources), vec!["subnet-a", "subnet-b", "subnet-c"]);
        assert!(!result.has_more());
    }

    /// One region denied, the other served: partial result with a labeled error
    #[tokio::test]
    async fn test_forbidden_region_is_partial() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/regions/us-central1/subnetworks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "subnet-a"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/regions/europe-west1/subnetworks"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = fetcher(&server, FetchSettings::default())
            .load_resources(
                &ExecContext::new(),
                &kind("compute/subnetworks"),
                &op(vec![Selection::DefaultChain], &["us-central1", "europe-west1"]),
            )
            .await
            .unwrap();

        assert_eq!(ids(&result.resources), vec!["us-central1/subnet-a"]);
        assert_eq!(result.partial_errors.len(), 1);
        assert!(result.partial_errors[0].starts_with("europe-west1: Permission denied"));
    }

    /// Buckets across two identities: one call per project, scoped by identity
    #[tokio::test]
    async fn test_buckets_across_identities() {
        let server = MockServer::start().await;

        for (project, bucket, token) in [
            ("proj-a", "logs-a", "token-default"),
            ("proj-b", "logs-b", "token-prod"),
        ] {
            Mock::given(method("GET"))
                .and(path("/storage/v1/b"))
                .and(query_param("project", project))
                .and(bearer_token(token))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "items": [{"name": bucket, "location": "US"}]
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let result = fetcher(&server, FetchSettings::default())
            .load_resources(
                &ExecContext::new(),
                &kind("storage/buckets"),
                &op(vec![Selection::DefaultChain, prod()], &["us-central1", "europe-west1"]),
            )
            .await
            .unwrap();

        assert_eq!(
            ids(&result.resources),
            vec!["default/global/logs-a", "prod/global/logs-b"]
        );
        let accounts: Vec<_> = result
            .resources
            .iter()
            .map(|i| i.scope().unwrap().account_id.clone())
            .collect();
        assert_eq!(accounts, vec![Some("proj-a".to_string()), Some("proj-b".to_string())]);
    }

    /// Objects need a bucket; with one they are listed from that bucket
    #[tokio::test]
    async fn test_objects_require_bucket_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/logs/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "2024/01/app.log", "size": "2048"}]
            })))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, FetchSettings::default());
        let k = kind("storage/objects");
        let op = op(vec![Selection::DefaultChain], &["us-central1"]);

        let err = fetcher
            .load_resources(&ExecContext::new(), &k, &op)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::FilterRequired { ref field, .. } if field == "bucket"));

        let ctx = ExecContext::new().with_filters(vec![ResourceFilter::new("bucket", vec!["logs".into()])]);
        let result = fetcher.load_resources(&ctx, &k, &op).await.unwrap();
        assert_eq!(ids(&result.resources), vec!["2024/01/app.log"]);
    }

    /// Describe of a vanished instance is NotFound; delete hits the zonal URL
    #[tokio::test]
    async fn test_describe_and_delete_instance() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/compute/v1/projects/proj-a/zones/us-central1-a/instances/vm-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "compute#operation",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, FetchSettings::default());
        let k = kind("compute/instances");
        let op = op(vec![Selection::DefaultChain], &["us-central1"]);
        let ctx = ExecContext::new();

        let gone = ResourceItem::Plain(tfleet::resource::Resource::new(
            k.clone(),
            "us-central1-a/gone",
            "gone",
        ));
        let err = fetcher.describe(&ctx, &k, &op, &gone).await.unwrap_err();
        assert!(err.is_not_found());

        let vm = ResourceItem::Plain(tfleet::resource::Resource::new(
            k.clone(),
            "us-central1-a/vm-1",
            "vm-1",
        ));
        fetcher.delete(&ctx, &k, &op, &vm).await.unwrap();
    }

    /// A 401 is retried once with a refreshed token, then reported
    #[tokio::test]
    async fn test_rejected_token_retried_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/zones"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let err = fetcher(&server, FetchSettings::default())
            .load_resources(
                &ExecContext::new(),
                &kind("compute/zones"),
                &op(vec![Selection::DefaultChain], &["us-central1"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Credential(_)));
    }

    /// Zones are read-only
    #[tokio::test]
    async fn test_zones_cannot_be_deleted() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, FetchSettings::default());
        let k = kind("compute/zones");
        let zone = ResourceItem::Plain(tfleet::resource::Resource::new(
            k.clone(),
            "us-central1-a",
            "us-central1-a",
        ));

        let err = fetcher
            .delete(
                &ExecContext::new(),
                &k,
                &op(vec![Selection::DefaultChain], &["us-central1"]),
                &zone,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::ReadOnly(_)));
    }
}

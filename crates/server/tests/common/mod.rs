//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock stage collaborators injected, so whole workflow runs can be
//! driven over HTTP without network access, extraction tools or an LLM.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use docket_core::{
    testing::{MockAnalyzer, MockExtractor, MockScraper},
    Config,
};
use docket_server::api::create_router;
use docket_server::state::AppState;

/// Re-export fixtures for test convenience
pub use docket_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_trigger() {
///     let fixture = TestFixture::new();
///     fixture.scraper.set_documents(fixtures::documents(2)).await;
///
///     let response = fixture.post("/api/trigger-workflow", json!({})).await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock scraper - configure downloaded documents
    pub scraper: MockScraper,
    /// Mock extractor - force extraction failures
    pub extractor: MockExtractor,
    /// Mock analyzer - configure judgments and failures
    pub analyzer: MockAnalyzer,
    /// Configuration the router was built from
    pub config: Config,
    /// Temporary directory for downloads and artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Vec<u8>,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::config_in(temp_dir.path());
        let pipeline = fixtures::MockPipeline::new(&config);

        let state = Arc::new(AppState::new(config.clone(), pipeline.dispatcher));
        let router = create_router(state);

        Self {
            router,
            scraper: pipeline.scraper,
            extractor: pipeline.extractor,
            analyzer: pipeline.analyzer,
            config,
            temp_dir,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with a raw string body.
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body.to_string()).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Trigger a workflow and return its task id.
    pub async fn trigger(&self, body: Value) -> String {
        let response = self.post("/api/trigger-workflow", body).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["task_id"]
            .as_str()
            .expect("task_id in trigger response")
            .to_string()
    }

    /// Poll the status endpoint until the task is completed or failed.
    pub async fn wait_for_terminal(&self, task_id: &str) -> Value {
        let path = format!("/api/workflow-status/{}", task_id);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let response = self.get(&path).await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
            let status = response.body["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return response.body;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("task {} still {} after 5s", task_id, status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn request_raw(&self, method: &str, path: &str, body: String) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            raw: body_bytes.to_vec(),
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

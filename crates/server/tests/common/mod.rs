//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock converter injected, so the HTTP surface can be exercised
//! without a Calibre installation.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use inkpress_core::{testing::MockConverter, Config, Converter, ConverterConfig, ServerConfig};

/// Re-export fixtures for test convenience
pub use inkpress_core::testing::fixtures;

/// Test fixture for API testing with a mock converter.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/convert", json!({
///         "input_path": "/in/book.epub",
///         "output_path": "/out/book.mobi",
///         "target_format": "mobi"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock converter - configure failures and inspect requests
    pub converter: Arc<MockConverter>,
    /// Temporary directory used as workspace root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with a default mock converter.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let converter = Arc::new(MockConverter::new());

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            converter: ConverterConfig::default().with_workspace_root(temp_dir.path()),
        };

        let state = Arc::new(inkpress_server::state::AppState::new(
            config,
            Arc::clone(&converter) as Arc<dyn Converter>,
        ));
        let router = inkpress_server::api::create_router(state);

        Self {
            router,
            converter,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<String>) -> TestResponse {
        let request_builder = Request::builder().method(method).uri(path);

        let request = match body {
            Some(body) => request_builder
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => request_builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! over an in-memory database, with mock ticket outputs injected, so the
//! HTTP surface can be exercised without disks or real renderers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tixcache_core::{Config, FileStorage, GenerationMode, OutputRegistry};
use tixcache_server::state::AppState;

/// Re-export fixtures for test convenience
pub use tixcache_core::testing::{fixtures, MockTicketOutput};

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list_tickets() {
///     let pdf = MockTicketOutput::new("pdf");
///     let fixture = TestFixture::new(OutputRegistry::new().with_output(pdf.factory()));
///     let seeded = fixture.stores.seed_conference(EventSettings::default());
///
///     let response = fixture.get(&format!("/api/v1/orders/{}/tickets", seeded.order.id)).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Stores behind the router, for seeding and inspection
    pub stores: fixtures::Fixture,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).expect("Response body is not JSON")
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8(self.bytes.clone()).expect("Response body is not UTF-8")
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a fixture generating inline.
    pub fn new(registry: OutputRegistry) -> Self {
        Self::with_mode(registry, GenerationMode::Inline)
    }

    /// Create a fixture with the given generation mode.
    ///
    /// Queue mode spawns the worker, so this must run inside a Tokio runtime.
    pub fn with_mode(registry: OutputRegistry, mode: GenerationMode) -> Self {
        let stores = fixtures::Fixture::new();

        let mut config = Config::default();
        config.generation.mode = mode;
        config.generation.workers = 2;

        let storage: Arc<dyn FileStorage> = stores.storage.clone();
        let (state, worker) = AppState::build(config, Arc::clone(&stores.db), storage, registry)
            .expect("Failed to build app state");
        if let Some(worker) = worker {
            tokio::spawn(worker.run());
        }

        let router = tixcache_server::api::create_router(Arc::new(state));

        Self { router, stores }
    }

    /// Send a GET request to the test router.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }
}

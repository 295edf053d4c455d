#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] wires the REAL kernel router and services over the in-process
//! `MemoryStore`, so every test gets an isolated, empty store and needs no
//! external database.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use passport_kernel::content::AutoSaveSettings;
use passport_kernel::publish::{PublishGuard, RequiredFields};
use passport_kernel::services::{LinkCodeGenerator, LocalMediaStore, StaticGrants, UserContext};
use passport_kernel::store::MemoryStore;
use passport_kernel::{AppState, Backends};
use passport_test_utils::TestGrants;

pub const SITE_URL: &str = "https://dpp.example";
pub const EDITOR: &str = "editor-token";
pub const VIEWER: &str = "viewer-token";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub grants: TestGrants,
    pub organization: Uuid,
    pub uploads: PathBuf,
}

/// A decoded response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl TestApp {
    /// An organization with every capability, one editor and one viewer.
    pub fn new() -> Self {
        Self::with_capabilities(passport_test_utils::ALL_CAPABILITIES)
    }

    pub fn with_capabilities(capabilities: &[&str]) -> Self {
        Self::build(capabilities, Arc::new(RequiredFields::default()))
    }

    pub fn with_guard(guard: Arc<dyn PublishGuard>) -> Self {
        Self::build(passport_test_utils::ALL_CAPABILITIES, guard)
    }

    fn build(capabilities: &[&str], guard: Arc<dyn PublishGuard>) -> Self {
        let organization = Uuid::now_v7();
        let grants = TestGrants::new()
            .editor(EDITOR, organization)
            .viewer(VIEWER, organization)
            .organization(organization, capabilities);
        let resolved = Arc::new(StaticGrants::from_toml(&grants.to_toml()).unwrap());

        let uploads =
            std::env::temp_dir().join(format!("passport-test-{}", Uuid::now_v7().simple()));
        let store = Arc::new(MemoryStore::new());

        let state = AppState::from_backends(Backends {
            blocks: store.clone(),
            documents: store.clone(),
            versions: store.clone(),
            sessions: resolved.clone(),
            access: resolved.clone(),
            capabilities: resolved,
            media: Arc::new(LocalMediaStore::new(&uploads, "/files", 1024 * 1024)),
            codes: Arc::new(LinkCodeGenerator),
            guard,
            site_url: SITE_URL.to_string(),
            capabilities_fail_open: true,
            autosave: AutoSaveSettings::default(),
            uploads_dir: uploads.clone(),
            max_upload_bytes: 1024 * 1024,
        });

        Self {
            router: passport_kernel::routes::app(state.clone()),
            state,
            store,
            grants,
            organization,
            uploads,
        }
    }

    /// The user context behind a token.
    pub fn user(&self, token: &str) -> UserContext {
        UserContext::authenticated(self.grants.user(token).unwrap().id)
    }

    /// Send a raw request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a JSON request, optionally authenticated, and read the body.
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        read(self.request(request).await).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call("GET", uri, token, None).await
    }

    /// Create a document as the editor and return its id.
    pub async fn create_document(&self, name: &str) -> Uuid {
        let response = self
            .call(
                "POST",
                "/api/dpp",
                Some(EDITOR),
                Some(passport_test_utils::document_request(self.organization, name)),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_str().unwrap().parse().unwrap()
    }

    /// Create a block as the editor and return the stored block.
    pub async fn create_block(&self, document: Uuid, body: Value) -> Value {
        let response = self
            .call(
                "POST",
                &format!("/api/dpp/{document}/content/blocks"),
                Some(EDITOR),
                Some(body),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }

    pub async fn set_block_status(&self, document: Uuid, block: &str, status: &str) -> Value {
        let response = self
            .call(
                "PUT",
                &format!("/api/dpp/{document}/content/blocks/{block}"),
                Some(EDITOR),
                Some(passport_test_utils::status_update(status)),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.json()
    }

    pub async fn list_blocks(&self, document: Uuid) -> Vec<Value> {
        let response = self
            .get(&format!("/api/dpp/{document}/content/blocks"), Some(EDITOR))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.json().as_array().cloned().unwrap_or_default()
    }

    pub async fn publish(&self, document: Uuid) -> TestResponse {
        self.call("POST", &format!("/api/dpp/{document}/publish"), Some(EDITOR), None)
            .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads);
    }
}

/// Read a response into status, headers and body bytes.
pub async fn read(response: Response) -> TestResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        bytes,
    }
}

/// Block ids of a block list, in order.
pub fn ids(blocks: &[Value]) -> Vec<String> {
    blocks
        .iter()
        .map(|b| b["id"].as_str().unwrap().to_string())
        .collect()
}

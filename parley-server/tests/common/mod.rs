//! Test utilities and common setup.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tower::ServiceExt;

use parley_server::completion::{
    CompletionClient, CompletionError, CompletionRequest, Delta, DeltaStream,
};
use parley_server::config::Config;
use parley_server::entities::SqliteStore;
use parley_server::routes;
use parley_server::state::AppState;

/// Completion client that answers every request with the same reply.
pub struct FakeCompletion {
    parts: Vec<String>,
    fail: bool,
    /// Break the stream after this many deltas.
    fail_after: Option<usize>,
}

impl FakeCompletion {
    pub fn replying(parts: &[&str]) -> Self {
        Self {
            parts: parts.iter().map(|p| p.to_string()).collect(),
            fail: false,
            fail_after: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            parts: Vec::new(),
            fail: true,
            fail_after: None,
        }
    }

    /// Streams the first `after` parts, then fails.
    pub fn failing_after(parts: &[&str], after: usize) -> Self {
        Self {
            fail_after: Some(after),
            ..Self::replying(parts)
        }
    }

    fn check(&self) -> Result<(), CompletionError> {
        if self.fail {
            return Err(unavailable());
        }
        Ok(())
    }
}

fn unavailable() -> CompletionError {
    CompletionError::Api {
        status: 503,
        message: "upstream unavailable".into(),
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        self.check()?;
        if self.fail_after.is_some() {
            return Err(unavailable());
        }
        Ok(self.parts.concat())
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.check()?;
        let take = self.fail_after.unwrap_or(self.parts.len());
        let mut deltas: Vec<Result<Delta, CompletionError>> = self
            .parts
            .iter()
            .take(take)
            .map(|p| Ok(Delta::text(p.clone())))
            .collect();
        if self.fail_after.is_some() {
            deltas.push(Err(unavailable()));
        }
        Ok(stream::iter(deltas).boxed())
    }
}

/// Router backed by a fresh in-memory store and the given completion client.
pub async fn test_app_with(client: FakeCompletion) -> Router {
    let store = SqliteStore::in_memory()
        .await
        .expect("in-memory store opens");
    let state = AppState::new(Config::default(), store, Arc::new(client));
    routes::build(Arc::new(state))
}

pub async fn test_app() -> Router {
    test_app_with(FakeCompletion::replying(&["Hello", " there", "!"])).await
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    /// Parse an ndjson body into one value per line.
    pub fn lines(&self) -> Vec<Value> {
        std::str::from_utf8(&self.body)
            .expect("utf-8 body")
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).expect("each line is JSON"))
            .collect()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body completes");
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::GET)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// `POST /api/generate`, optionally continuing `conversation_id`.
pub fn generate(body: &Value, conversation_id: Option<&str>) -> Request<Body> {
    let mut req = json_request(Method::POST, "/api/generate", body);
    if let Some(id) = conversation_id {
        req.headers_mut()
            .insert("x-conversation-id", id.parse().unwrap());
    }
    req
}

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Request bodies up to this size are logged at debug level.
const MAX_LOGGED_BODY: u64 = 1024;

/// Per-request span, `x-trace-id` propagation and access logging.
///
/// Response bodies pass through untouched, so chunked generate streams reach
/// the client as they are produced; the "finished" line marks when headers
/// went out, not when the body ended.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");

        let mut response = match log_small_json_body(req).await {
            Ok(mut req) => {
                if let Some(v) = &trace_header {
                    req.headers_mut().insert(X_TRACE_ID, v.clone());
                }
                next.run(req).await
            }
            Err(e) => e.into_response(),
        };
        if let Some(v) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response started"
        );
        response
    }
    .instrument(span)
    .await
}

/// Buffer and log the request body when it is small JSON; anything else is
/// forwarded as a stream without being read. A body that cannot be read is
/// answered with a 400 instead of reaching the handler.
async fn log_small_json_body(req: Request<Body>) -> Result<Request<Body>, ServerError> {
    if !is_small_json(req.headers()) {
        return Ok(req);
    }

    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to read request body");
            ServerError::BadRequest("failed to read request body".into())
        })?
        .to_bytes();
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!(body = %text, "request body");
    }
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn is_small_json(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    is_json && len.is_some_and(|n| n <= MAX_LOGGED_BODY)
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Bytes;
    use futures::stream;
    use tracing_test::traced_test;

    fn headers(content_type: &str, len: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        if let Some(len) = len {
            h.insert(header::CONTENT_LENGTH, HeaderValue::from_str(len).unwrap());
        }
        h
    }

    #[test]
    fn only_small_json_with_known_length_is_logged() {
        assert!(is_small_json(&headers("application/json", Some("42"))));
        assert!(!is_small_json(&headers("application/json", Some("4096"))));
        assert!(!is_small_json(&headers("application/json", None)));
        assert!(!is_small_json(&headers("text/plain", Some("5"))));
    }

    fn json_post(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/todos")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "10")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn small_json_body_is_buffered_and_forwarded() {
        let req = log_small_json_body(json_post(Body::from("{\"a\":123}")))
            .await
            .unwrap();
        let bytes = req.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from_static(b"{\"a\":123}"));
    }

    #[tokio::test]
    #[traced_test]
    async fn unreadable_body_is_rejected_not_emptied() {
        let broken = Body::from_stream(stream::iter([Err::<Bytes, std::io::Error>(
            std::io::Error::other("connection reset"),
        )]));
        let err = log_small_json_body(json_post(broken)).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        assert!(logs_contain("failed to read request body"));

        let response = err.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}

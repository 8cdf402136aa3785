//! Chat generation route.
//!
//! The conversation is resolved (loaded or created) before the response
//! starts, so resolution failures are plain JSON errors. The completion itself
//! runs in a spawned relay task that feeds the response body through a
//! bounded channel; if the relay fails after the headers went out, the body is
//! aborted instead of being closed cleanly.

use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{StreamExt, stream};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};
use utoipa::OpenApi;

use crate::chat::{ChatError, Delivery, RelayOutcome, StreamChunk, resolve};
use crate::completion::ChatTurn;
use crate::entities::Role;
use crate::error::ServerError;
use crate::schemas::api::generate::{GenerateRequest, GenerateResponse};
use crate::state::AppState;

/// Request and response header carrying the conversation id.
pub const X_CONVERSATION_ID: &str = "x-conversation-id";

const NDJSON: &str = "application/x-ndjson";

#[derive(OpenApi)]
#[openapi(
    paths(generate),
    components(schemas(GenerateRequest, GenerateResponse, StreamChunk, ChatTurn, Role))
)]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/generate", post(generate))
}

/// Generate the next assistant turn.
///
/// With `stream` (the default) the body is `application/x-ndjson`: one
/// `{"content", "conversationId"}` object per line, in upstream order. The
/// concatenated `content` values equal the assistant message that is stored
/// once the upstream stream ends.
#[utoipa::path(
    post,
    path = "/api/generate",
    tag = "chat",
    request_body = GenerateRequest,
    params(
        ("x-conversation-id" = Option<String>, Header, description = "Continue this conversation"),
    ),
    responses(
        (status = 200, description = "Streamed reply (ndjson) or whole reply", body = GenerateResponse),
        (status = 400, description = "Messages are missing or malformed"),
        (status = 500, description = "Store or completion API failure"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload?;
    let existing_id = headers
        .get(X_CONVERSATION_ID)
        .and_then(|v| v.to_str().ok());

    let (conversation, is_new) = resolve(state.store.as_ref(), existing_id, &req.messages).await?;
    let conversation_id = conversation.id.clone();
    let model = req
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.model.clone());
    debug!(
        conversation_id = %conversation_id,
        is_new,
        stream = req.stream,
        %model,
        "generate request resolved"
    );

    let relay = state.relay();
    let mut response = if req.stream {
        let (tx, rx) = mpsc::channel(state.config.stream_buffer);
        let (done_tx, done_rx) = oneshot::channel();
        let history = req.messages;
        tokio::spawn(async move {
            let outcome = relay
                .run(conversation, history, model, Delivery::Streaming, Some(tx))
                .await;
            // The receiver is gone when the client hung up.
            let _ = done_tx.send(outcome);
        });
        ndjson_response(rx, done_rx)
    } else {
        let outcome = relay
            .run(conversation, req.messages, model, Delivery::Whole, None)
            .await?;
        Json(GenerateResponse {
            message: ChatTurn::new(Role::Assistant, outcome.reply),
            conversation_id: outcome.conversation_id,
        })
        .into_response()
    };

    if let Ok(v) = HeaderValue::from_str(&conversation_id) {
        response.headers_mut().insert(X_CONVERSATION_ID, v);
    }
    Ok(response)
}

fn ndjson_response(
    rx: mpsc::Receiver<StreamChunk>,
    done: oneshot::Receiver<Result<RelayOutcome, ChatError>>,
) -> Response {
    let lines = ReceiverStream::new(rx).map(|chunk| encode_line(&chunk));
    let tail = stream::once(done).filter_map(|outcome| async move {
        match outcome {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                error!(error = %e, "generate stream failed");
                Some(Err(io::Error::other(e.to_string())))
            }
            Err(_) => Some(Err(io::Error::other("relay task ended without a result"))),
        }
    });

    let mut response = Body::from_stream(lines.chain(tail)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(NDJSON));
    response
}

fn encode_line(chunk: &StreamChunk) -> Result<Bytes, io::Error> {
    let mut line = serde_json::to_vec(chunk).map_err(io::Error::other)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lines_are_camel_case_and_newline_terminated() {
        let chunk = StreamChunk {
            content: "Hel".into(),
            conversation_id: "abc".into(),
        };
        let line = encode_line(&chunk).unwrap();
        assert_eq!(&line[..], b"{\"content\":\"Hel\",\"conversationId\":\"abc\"}\n");
    }
}

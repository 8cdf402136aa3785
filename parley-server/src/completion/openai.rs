//! OpenAI-compatible `/chat/completions` client.
//!
//! Streaming responses are server-sent events: one `data: {json}` line per
//! delta, terminated by `data: [DONE]` (or simply by the end of the body).
//! Comment lines (`: keep-alive`) and other SSE fields are ignored.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatTurn, CompletionClient, CompletionError, CompletionRequest, Delta, DeltaStream};
use crate::config::Config;

/// Client for an OpenAI-compatible completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .user_agent(concat!("parley-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.completion_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let body = ApiRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, message });
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let resp = self.send(&request, false).await?;
        let data: ApiResponse = resp.json().await?;
        if let Some(err) = data.error {
            return Err(err.into());
        }
        data.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or(CompletionError::Empty)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        let resp = self.send(&request, true).await?;
        debug!(model = %request.model, "completion stream opened");
        Ok(delta_stream(resp.bytes_stream().boxed()))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiStreamEvent {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiDelta,
}

#[derive(Deserialize, Default)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

impl From<ApiErrorBody> for CompletionError {
    fn from(err: ApiErrorBody) -> Self {
        let status = err
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        CompletionError::Api {
            status,
            message: err.message,
        }
    }
}

// ── SSE decoding ─────────────────────────────────────────────────────────────

/// A decoded SSE line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Delta(Delta),
    Done,
}

/// Incremental line splitter for an SSE byte stream.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete event, skipping lines that carry none.
    pub(crate) fn next_event(&mut self) -> Option<Result<SseEvent, CompletionError>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                return Some(event);
            }
        }
        None
    }

    /// Decode whatever is left once the body has ended.
    pub(crate) fn finish(&mut self) -> Option<Result<SseEvent, CompletionError>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<Result<SseEvent, CompletionError>> {
    let line = String::from_utf8_lossy(raw);
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }

    let event: ApiStreamEvent = match serde_json::from_str(data) {
        Ok(e) => e,
        Err(e) => return Some(Err(e.into())),
    };
    if let Some(err) = event.error {
        return Some(Err(err.into()));
    }
    let content = event
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content);
    Some(Ok(SseEvent::Delta(Delta { content })))
}

struct DecodeState {
    body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<SseEvent, CompletionError>>,
    finished: bool,
}

/// Turn a raw SSE body into a stream of deltas, ending at `[DONE]` or EOF.
fn delta_stream(body: BoxStream<'static, Result<Bytes, reqwest::Error>>) -> DeltaStream {
    let state = DecodeState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            match st.pending.pop_front() {
                Some(Ok(SseEvent::Delta(delta))) => return Some((Ok(delta), st)),
                Some(Ok(SseEvent::Done)) => return None,
                Some(Err(e)) => {
                    st.pending.clear();
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None if st.finished => return None,
                None => {}
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.decoder.feed(&chunk);
                    while let Some(event) = st.decoder.next_event() {
                        st.pending.push_back(event);
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    if let Some(event) = st.decoder.finish() {
                        st.pending.push_back(event);
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod test {
    use super::*;

    fn events(decoder: &mut SseDecoder) -> Vec<SseEvent> {
        std::iter::from_fn(|| decoder.next_event())
            .map(|e| e.expect("event decodes"))
            .collect()
    }

    #[test]
    fn decodes_content_deltas_and_done() {
        let mut d = SseDecoder::default();
        d.feed(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
        d.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n");
        d.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n");
        d.feed(b"data: [DONE]\n");

        assert_eq!(
            events(&mut d),
            vec![
                SseEvent::Delta(Delta { content: None }),
                SseEvent::Delta(Delta::text("Hel")),
                SseEvent::Delta(Delta::text("lo")),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let mut d = SseDecoder::default();
        d.feed(b": OPENROUTER PROCESSING\n\nevent: ping\n");
        assert!(events(&mut d).is_empty());
    }

    #[test]
    fn keeps_partial_lines_until_newline() {
        let mut d = SseDecoder::default();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n";
        let bytes = line.as_bytes();
        // Split inside the two-byte UTF-8 sequence for 'é'.
        let split = line.find('\u{e9}').unwrap() + 1;
        d.feed(&bytes[..split]);
        assert!(d.next_event().is_none());
        d.feed(&bytes[split..]);
        assert_eq!(events(&mut d), vec![SseEvent::Delta(Delta::text("café"))]);
    }

    #[test]
    fn in_band_error_becomes_api_error() {
        let mut d = SseDecoder::default();
        d.feed(b"data: {\"error\":{\"code\":429,\"message\":\"rate limited\"}}\n");
        match d.next_event() {
            Some(Err(CompletionError::Api { status, message })) => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut d = SseDecoder::default();
        d.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}");
        assert!(d.next_event().is_none());
        assert!(matches!(
            d.finish(),
            Some(Ok(SseEvent::Delta(Delta { content: Some(ref c) }))) if c == "tail"
        ));
    }

    #[tokio::test]
    async fn delta_stream_stops_at_done() {
        let body = stream::iter(vec![
            Ok::<_, reqwest::Error>(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\ndata: [DONE]\n",
            )),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n")),
        ])
        .boxed();

        let deltas: Vec<_> = delta_stream(body)
            .map(|d| d.expect("delta").content.unwrap_or_default())
            .collect()
            .await;
        assert_eq!(deltas, ["a", "b"]);
    }
}

//! Hosted chat-completion API client.
//!
//! [`CompletionClient`] is the seam between the relay and the upstream model.
//! [`openai::OpenAiClient`] talks to any OpenAI-compatible endpoint
//! (OpenRouter by default); tests substitute a scripted implementation.

pub mod openai;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::entities::Role;

/// A role-tagged message as exchanged with clients and the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    /// Author of the message (`"user"` or `"assistant"`).
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One call to the completion API.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
}

/// One incremental event from a streaming completion.
///
/// `content` is `None` for role-only or control deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
}

impl Delta {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// Lazy, finite, non-restartable sequence of deltas.
pub type DeltaStream = BoxStream<'static, Result<Delta, CompletionError>>;

/// Errors returned by a [`CompletionClient`].
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Transport failure (connect, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status or an in-band error event.
    #[error("completion API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A response or event body could not be decoded.
    #[error("malformed completion payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A non-streaming response carried no choices.
    #[error("completion API returned no choices")]
    Empty,
}

#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    /// Request the whole assistant reply in one response.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    /// Request incremental delivery.
    ///
    /// An `Err` here means the call failed before any delta was produced.
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError>;
}

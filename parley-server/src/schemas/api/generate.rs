use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::completion::ChatTurn;

fn default_stream() -> bool {
    true
}

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Full conversation history as held by the client; the last element is
    /// the new turn. Must not be empty.
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    /// Stream the reply as newline-delimited JSON (default `true`).
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// Model identifier; the server default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Response body for `POST /api/generate` with `"stream": false`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: ChatTurn,
    pub conversation_id: String,
}

//! Chat core: conversation resolution and the streaming relay.
//!
//! A generate request flows through [`resolver::resolve`] (load or create the
//! conversation) and then [`relay::Relay::run`] (call the completion API,
//! forward increments, persist the finished reply).

pub mod relay;
pub mod resolver;

pub use relay::{Delivery, Relay, RelayOutcome, StreamChunk};
pub use resolver::resolve;

use thiserror::Error;

use crate::completion::CompletionError;

/// Failures of one generate request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or missing message list. Raised before any external call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The completion API rejected the call or failed mid-stream.
    #[error("completion failed: {0}")]
    Upstream(#[from] CompletionError),

    /// A store read or write failed.
    #[error("store failed: {0}")]
    Store(#[from] sqlx::Error),

    /// The chunk consumer went away before the stream ended.
    #[error("client disconnected")]
    Disconnected,
}

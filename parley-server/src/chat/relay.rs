//! Streaming relay between the completion API and one caller.
//!
//! The relay is the single producer on a bounded channel whose consumer is
//! the HTTP response body. Increments are forwarded in arrival order, one
//! chunk per upstream delta, while being accumulated for persistence.
//!
//! Persistence is at-most-once: the conversation is saved only after the
//! upstream stream ends normally with a non-empty reply. Upstream failure,
//! store failure or a dropped consumer leave the stored conversation as the
//! resolver left it, even when partial text was already forwarded.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::chat::ChatError;
use crate::completion::{ChatTurn, CompletionClient, CompletionRequest, Delta, DeltaStream};
use crate::entities::{Conversation, ConversationStore, Message, Role};

/// One increment of assistant text, as written to the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    /// Text increment; empty for deltas that carry no text.
    pub content: String,
    /// Conversation the increment belongs to.
    pub conversation_id: String,
}

/// How the completion API is asked to deliver the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Incremental deltas.
    Streaming,
    /// One complete response, handled as a single delta.
    Whole,
}

/// Result of a finished relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub conversation_id: String,
    /// Full assistant text (concatenation of every forwarded increment).
    pub reply: String,
    /// `false` when the reply was empty and nothing was written.
    pub persisted: bool,
}

pub struct Relay<S> {
    store: Arc<S>,
    client: Arc<dyn CompletionClient>,
}

impl<S: ConversationStore> Relay<S> {
    pub fn new(store: Arc<S>, client: Arc<dyn CompletionClient>) -> Self {
        Self { store, client }
    }

    /// Run one completion for `conversation`.
    ///
    /// `history` is sent upstream as-is. When `sink` is set, every delta is
    /// pushed to it as a [`StreamChunk`]; a closed sink, noticed even while
    /// upstream is silent, aborts the relay with
    /// [`ChatError::Disconnected`] and drops the upstream stream.
    pub async fn run(
        &self,
        mut conversation: Conversation,
        history: Vec<ChatTurn>,
        model: String,
        delivery: Delivery,
        sink: Option<mpsc::Sender<StreamChunk>>,
    ) -> Result<RelayOutcome, ChatError> {
        let request = CompletionRequest {
            model,
            messages: history,
        };
        debug!(
            conversation_id = %conversation.id,
            model = %request.model,
            turns = request.messages.len(),
            ?delivery,
            "relay started"
        );

        let mut deltas: DeltaStream = match delivery {
            Delivery::Streaming => self.client.stream(request).await?,
            Delivery::Whole => {
                let text = self.client.complete(request).await?;
                stream::once(async move { Ok(Delta::text(text)) }).boxed()
            }
        };

        let mut reply = String::new();
        let mut forwarded = 0usize;
        loop {
            let delta = tokio::select! {
                biased;
                _ = closed(&sink) => {
                    warn!(
                        conversation_id = %conversation.id,
                        forwarded,
                        "client disconnected; abandoning completion"
                    );
                    return Err(ChatError::Disconnected);
                }
                delta = deltas.next() => delta,
            };
            let Some(delta) = delta else { break };

            let increment = match delta {
                Ok(delta) => delta.content.unwrap_or_default(),
                Err(e) => {
                    warn!(
                        conversation_id = %conversation.id,
                        forwarded,
                        error = %e,
                        "completion stream failed; partial reply discarded"
                    );
                    return Err(e.into());
                }
            };
            reply.push_str(&increment);

            if let Some(sink) = &sink {
                let chunk = StreamChunk {
                    content: increment,
                    conversation_id: conversation.id.clone(),
                };
                if sink.send(chunk).await.is_err() {
                    warn!(
                        conversation_id = %conversation.id,
                        forwarded,
                        "client disconnected; abandoning completion"
                    );
                    return Err(ChatError::Disconnected);
                }
            }
            forwarded += 1;
        }
        drop(deltas);

        let persisted = if reply.is_empty() {
            debug!(conversation_id = %conversation.id, "empty reply; nothing persisted");
            false
        } else {
            conversation
                .messages
                .push(Message::now(Role::Assistant, reply.clone()));
            self.store.save_conversation(&mut conversation).await?;
            true
        };

        info!(
            conversation_id = %conversation.id,
            chunks = forwarded,
            reply_len = reply.len(),
            persisted,
            "relay finished"
        );

        Ok(RelayOutcome {
            conversation_id: conversation.id,
            reply,
            persisted,
        })
    }
}

/// Resolves once the consumer behind `sink` is gone. Never resolves without one.
async fn closed(sink: &Option<mpsc::Sender<StreamChunk>>) {
    match sink {
        Some(sink) => sink.closed().await,
        None => std::future::pending().await,
    }
}

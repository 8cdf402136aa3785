use tracing::{debug, info};

use crate::chat::ChatError;
use crate::completion::ChatTurn;
use crate::entities::{Conversation, ConversationStore, Message, Role};

/// Load the conversation named by `existing_id`, or start a new one.
///
/// For an existing conversation only the trailing incoming message is
/// appended, and only when it is a user turn; nothing is written yet, the
/// relay persists it together with the reply. A new conversation takes the
/// whole incoming history and is written immediately so it has an id.
///
/// Returns the conversation and whether it was just created.
pub async fn resolve<S: ConversationStore>(
    store: &S,
    existing_id: Option<&str>,
    incoming: &[ChatTurn],
) -> Result<(Conversation, bool), ChatError> {
    let Some(last) = incoming.last() else {
        return Err(ChatError::InvalidInput(
            "messages are required and must be a non-empty array".into(),
        ));
    };

    if let Some(id) = existing_id.map(str::trim).filter(|id| !id.is_empty()) {
        match store.find_conversation(id).await? {
            Some(mut conversation) => {
                if last.role == Role::User {
                    conversation
                        .messages
                        .push(Message::now(Role::User, last.content.clone()));
                } else {
                    debug!(conversation_id = %id, role = %last.role, "trailing message is not a user turn; nothing appended");
                }
                return Ok((conversation, false));
            }
            None => debug!(conversation_id = %id, "conversation not found; starting a new one"),
        }
    }

    let messages = incoming
        .iter()
        .map(|turn| Message::now(turn.role, turn.content.clone()))
        .collect();
    let conversation = store.create_conversation(messages).await?;
    info!(
        conversation_id = %conversation.id,
        messages = conversation.messages.len(),
        "conversation created"
    );
    Ok((conversation, true))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{SqliteStore, now};

    fn user(content: &str) -> ChatTurn {
        ChatTurn::new(Role::User, content)
    }

    fn assistant(content: &str) -> ChatTurn {
        ChatTurn::new(Role::Assistant, content)
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_store_access() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = resolve(&store, None, &[]).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
        assert_eq!(store.count_conversations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn no_id_creates_conversation_with_all_messages() {
        let store = SqliteStore::in_memory().await.unwrap();
        let before = now();
        let incoming = vec![user("hi"), assistant("hello"), user("how are you?")];

        let (conv, is_new) = resolve(&store, None, &incoming).await.unwrap();
        assert!(is_new);

        let got: Vec<ChatTurn> = conv
            .messages
            .iter()
            .map(|m| ChatTurn::new(m.role, m.content.clone()))
            .collect();
        assert_eq!(got, incoming);
        assert!(conv.messages.iter().all(|m| m.timestamp >= before));

        // Persisted immediately.
        let stored = store.find_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
    }

    #[tokio::test]
    async fn unknown_id_falls_back_to_create() {
        let store = SqliteStore::in_memory().await.unwrap();
        let (conv, is_new) = resolve(&store, Some("does-not-exist"), &[user("hi")])
            .await
            .unwrap();
        assert!(is_new);
        assert_ne!(conv.id, "does-not-exist");
    }

    #[tokio::test]
    async fn existing_id_appends_only_trailing_user_message_in_memory() {
        let store = SqliteStore::in_memory().await.unwrap();
        let (first, _) = resolve(&store, None, &[user("hi")]).await.unwrap();

        let incoming = vec![user("hi"), assistant("hello"), user("follow-up")];
        let (conv, is_new) = resolve(&store, Some(&first.id), &incoming).await.unwrap();
        assert!(!is_new);
        assert_eq!(conv.id, first.id);

        let contents: Vec<_> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hi", "follow-up"]);

        // Not written until the relay finishes.
        let stored = store.find_conversation(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 1);
    }

    #[tokio::test]
    async fn existing_id_ignores_trailing_assistant_message() {
        let store = SqliteStore::in_memory().await.unwrap();
        let (first, _) = resolve(&store, None, &[user("hi")]).await.unwrap();

        let (conv, is_new) = resolve(&store, Some(&first.id), &[user("hi"), assistant("resent")])
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(conv.messages.len(), 1);
    }
}

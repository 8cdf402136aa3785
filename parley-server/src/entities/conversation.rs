use std::future::Future;
use std::str::FromStr;

use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::entities::dao::{Conversation, ConversationSummary, Message, Role};
use crate::entities::{SqliteStore, decode_time, encode_time, now};

pub trait ConversationStore: Send + Sync + 'static {
    /// Load a conversation with its full message log.
    fn find_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Conversation>, sqlx::Error>> + Send;

    /// Persist a new conversation and assign it an identifier.
    fn create_conversation(
        &self,
        messages: Vec<Message>,
    ) -> impl Future<Output = Result<Conversation, sqlx::Error>> + Send;

    /// Append the messages past `conversation.persisted` and bump `updated_at`.
    ///
    /// New messages go after whatever the store holds at save time, so two
    /// copies loaded before either was saved both land, in save order.
    fn save_conversation(
        &self,
        conversation: &mut Conversation,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Summaries ordered by most recently updated first.
    fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, sqlx::Error>> + Send;

    fn count_conversations(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

impl ConversationStore for SqliteStore {
    async fn find_conversation(&self, id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT id, created_at, updated_at FROM conversations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT role, content, timestamp FROM conversation_messages \
             WHERE conversation_id = ?1 ORDER BY position ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .into_iter()
            .map(|(role, content, timestamp)| -> Result<Message, sqlx::Error> {
                Ok(Message {
                    role: parse_role(&role)?,
                    content,
                    timestamp: decode_time(&timestamp)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(Conversation {
            id,
            persisted: messages.len(),
            messages,
            created_at: decode_time(&created_at)?,
            updated_at: decode_time(&updated_at)?,
        }))
    }

    async fn create_conversation(&self, messages: Vec<Message>) -> Result<Conversation, sqlx::Error> {
        let now = now();
        let mut conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            messages,
            created_at: now,
            updated_at: now,
            persisted: 0,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?3)")
            .bind(&conversation.id)
            .bind(encode_time(&conversation.created_at))
            .bind(encode_time(&conversation.updated_at))
            .execute(&mut *tx)
            .await?;
        append_messages(&mut tx, &conversation.id, &conversation.messages).await?;
        tx.commit().await?;

        conversation.persisted = conversation.messages.len();
        Ok(conversation)
    }

    async fn save_conversation(&self, conversation: &mut Conversation) -> Result<(), sqlx::Error> {
        // Never move backwards even if the wall clock does.
        let updated_at = now().max(conversation.updated_at);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&conversation.id)
        .bind(encode_time(&conversation.created_at))
        .bind(encode_time(&updated_at))
        .execute(&mut *tx)
        .await?;

        let start = conversation.persisted.min(conversation.messages.len());
        append_messages(&mut tx, &conversation.id, &conversation.messages[start..]).await?;
        tx.commit().await?;

        conversation.updated_at = updated_at;
        conversation.persisted = conversation.messages.len();
        Ok(())
    }

    async fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, sqlx::Error> {
        let rows: Vec<(String, String, String, i64, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT c.id, c.created_at, c.updated_at, \
                        (SELECT COUNT(*) FROM conversation_messages m WHERE m.conversation_id = c.id), \
                        f.role, f.content \
                 FROM conversations c \
                 LEFT JOIN conversation_messages f \
                        ON f.conversation_id = c.id AND f.position = 0 \
                 ORDER BY c.updated_at DESC, c.rowid DESC \
                 LIMIT ?1 OFFSET ?2",
            )
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<ConversationSummary, sqlx::Error> {
                let (id, created_at, updated_at, messages_count, role, content) = row;
                let preview = match (role, content) {
                    (Some(role), Some(content)) => Some((parse_role(&role)?, content)),
                    _ => None,
                };
                Ok(ConversationSummary {
                    id,
                    preview,
                    messages_count,
                    created_at: decode_time(&created_at)?,
                    updated_at: decode_time(&updated_at)?,
                })
            })
            .collect()
    }

    async fn count_conversations(&self) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// Insert `messages` after the highest stored position of the conversation.
///
/// The caller's transaction has already written the `conversations` row, so
/// it holds SQLite's write lock and the position lookup cannot race.
async fn append_messages(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
    messages: &[Message],
) -> Result<(), sqlx::Error> {
    for msg in messages {
        sqlx::query(
            "INSERT INTO conversation_messages \
             (conversation_id, position, role, content, timestamp) \
             SELECT ?1, COALESCE(MAX(position) + 1, 0), ?2, ?3, ?4 \
             FROM conversation_messages WHERE conversation_id = ?1",
        )
        .bind(conversation_id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(encode_time(&msg.timestamp))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn parse_role(raw: &str) -> Result<Role, sqlx::Error> {
    Role::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

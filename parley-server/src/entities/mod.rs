//! Persistence layer.
//!
//! [`ConversationStore`] and [`TodoStore`] define the storage interface; the
//! default implementation of both is [`SqliteStore`]. To swap to another
//! database, implement the traits for your new type and change the concrete
//! type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required on this side.

pub mod conversation;
pub mod dao;
pub mod todo;

pub use dao::{Conversation, ConversationSummary, Message, NewTodo, Role, Todo, TodoPatch};

pub use conversation::ConversationStore;
pub use todo::TodoStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// SQLite-backed store shared by every handler.
///
/// Constructed once at process start and handed around behind an `Arc`.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://parley.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database, so pin the
        // pool to one connection that is never recycled.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Convenience constructor for tests.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:").await
    }
}

/// Current instant at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp with fixed precision so that text order matches time order.
pub(crate) fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp. Corrupt values surface as [`sqlx::Error::Decode`].
pub(crate) fn decode_time(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_time_sorts_like_time() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = a + chrono::Duration::seconds(10);
        let (ea, eb, ec) = (encode_time(&a), encode_time(&b), encode_time(&c));
        assert!(ea < eb && eb < ec);
        assert_eq!(ea.len(), ec.len());
    }

    #[test]
    fn decode_round_trips_encoded_time() {
        let t = Utc.with_ymd_and_hms(2024, 6, 30, 12, 34, 56).unwrap();
        assert_eq!(decode_time(&encode_time(&t)).unwrap(), t);
    }

    #[test]
    fn decode_rejects_corrupt_time() {
        assert!(matches!(decode_time("yesterday"), Err(sqlx::Error::Decode(_))));
    }

    #[tokio::test]
    async fn corrupt_stored_timestamp_surfaces_as_error() {
        use crate::entities::ConversationStore;

        let store = SqliteStore::in_memory().await.expect("store");
        let conv = store
            .create_conversation(vec![Message::now(Role::User, "hi")])
            .await
            .expect("create");
        sqlx::query("UPDATE conversations SET updated_at = 'not a time' WHERE id = ?1")
            .bind(&conv.id)
            .execute(&store.pool)
            .await
            .expect("corrupt row");

        let err = store.find_conversation(&conv.id).await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
        assert!(store.list_conversations(0, 10).await.is_err());
    }

    #[tokio::test]
    async fn in_memory_store_runs_migrations() {
        let store = SqliteStore::in_memory().await.expect("store");
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&store.pool)
            .await
            .expect("conversations table exists");
        assert_eq!(n, 0);
    }
}

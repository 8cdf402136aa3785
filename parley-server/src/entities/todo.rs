use std::future::Future;

use uuid::Uuid;

use crate::entities::dao::{NewTodo, Todo, TodoPatch};
use crate::entities::{SqliteStore, decode_time, encode_time, now};

type TodoRow = (String, String, Option<String>, bool, String, String);

pub trait TodoStore: Send + Sync + 'static {
    fn list_todos(&self) -> impl Future<Output = Result<Vec<Todo>, sqlx::Error>> + Send;
    fn create_todo(&self, todo: NewTodo) -> impl Future<Output = Result<Todo, sqlx::Error>> + Send;
    fn get_todo(&self, id: &str) -> impl Future<Output = Result<Option<Todo>, sqlx::Error>> + Send;
    /// Returns `None` when no todo has the given id.
    fn update_todo(
        &self,
        id: &str,
        patch: TodoPatch,
    ) -> impl Future<Output = Result<Option<Todo>, sqlx::Error>> + Send;
    /// Returns `true` if a row was removed.
    fn delete_todo(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl TodoStore for SqliteStore {
    async fn list_todos(&self) -> Result<Vec<Todo>, sqlx::Error> {
        let rows: Vec<TodoRow> = sqlx::query_as(
            "SELECT id, title, description, completed, created_at, updated_at \
             FROM todos ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn create_todo(&self, todo: NewTodo) -> Result<Todo, sqlx::Error> {
        let now = now();
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            title: todo.title,
            description: todo.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO todos (id, title, description, completed, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&todo.id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.completed)
        .bind(encode_time(&todo.created_at))
        .bind(encode_time(&todo.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn get_todo(&self, id: &str) -> Result<Option<Todo>, sqlx::Error> {
        let row: Option<TodoRow> = sqlx::query_as(
            "SELECT id, title, description, completed, created_at, updated_at \
             FROM todos WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn update_todo(&self, id: &str, patch: TodoPatch) -> Result<Option<Todo>, sqlx::Error> {
        let updated_at = encode_time(&now());
        let result = sqlx::query(
            "UPDATE todos SET \
                title       = COALESCE(?1, title), \
                description = COALESCE(?2, description), \
                completed   = COALESCE(?3, completed), \
                updated_at  = ?4 \
             WHERE id = ?5",
        )
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.completed)
        .bind(&updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_todo(id).await
    }

    async fn delete_todo(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn from_row(
    (id, title, description, completed, created_at, updated_at): TodoRow,
) -> Result<Todo, sqlx::Error> {
    Ok(Todo {
        id,
        title,
        description,
        completed,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::TodoStore;
use crate::error::ServerError;
use crate::schemas::api::todo::{
    CreateTodoRequest, DeletedResponse, TodoEnvelope, TodoListResponse, TodoResponse,
    UpdateTodoRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_todos, create_todo, get_todo, update_todo, delete_todo),
    components(schemas(
        CreateTodoRequest,
        UpdateTodoRequest,
        TodoResponse,
        TodoEnvelope,
        TodoListResponse,
        DeletedResponse
    ))
)]
pub struct TodosApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
}

fn todo_not_found() -> ServerError {
    ServerError::NotFound("Todo not found".into())
}

#[utoipa::path(
    get,
    path = "/api/todos",
    tag = "todos",
    responses(
        (status = 200, description = "All todos, newest first", body = TodoListResponse),
    )
)]
pub async fn list_todos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TodoListResponse>, ServerError> {
    let todos = state.store.list_todos().await?;
    Ok(Json(TodoListResponse {
        todos: todos.iter().map(|t| t.to_response()).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/todos",
    tag = "todos",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = TodoEnvelope),
        (status = 400, description = "Title is missing or blank"),
    )
)]
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TodoEnvelope>), ServerError> {
    let Json(req) = payload?;
    req.validate()?;

    let todo = state.store.create_todo(req.into_new_todo()).await?;
    info!(todo_id = %todo.id, "todo created");
    Ok((
        StatusCode::CREATED,
        Json(TodoEnvelope {
            todo: todo.to_response(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/todos/{id}",
    tag = "todos",
    params(("id" = String, Path, description = "Todo id")),
    responses(
        (status = 200, description = "The todo", body = TodoEnvelope),
        (status = 404, description = "Unknown todo"),
    )
)]
pub async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, ServerError> {
    let todo = state.store.get_todo(&id).await?.ok_or_else(todo_not_found)?;
    Ok(Json(TodoEnvelope {
        todo: todo.to_response(),
    }))
}

/// Partial update; fields left out of the body keep their value.
#[utoipa::path(
    patch,
    path = "/api/todos/{id}",
    tag = "todos",
    params(("id" = String, Path, description = "Todo id")),
    request_body = UpdateTodoRequest,
    responses(
        (status = 200, description = "Updated todo", body = TodoEnvelope),
        (status = 400, description = "Blank title"),
        (status = 404, description = "Unknown todo"),
    )
)]
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<TodoEnvelope>, ServerError> {
    let Json(req) = payload?;
    req.validate()?;

    let todo = state
        .store
        .update_todo(&id, req.into_patch())
        .await?
        .ok_or_else(todo_not_found)?;
    Ok(Json(TodoEnvelope {
        todo: todo.to_response(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/todos/{id}",
    tag = "todos",
    params(("id" = String, Path, description = "Todo id")),
    responses(
        (status = 200, description = "Todo deleted", body = DeletedResponse),
        (status = 404, description = "Unknown todo"),
    )
)]
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ServerError> {
    if !state.store.delete_todo(&id).await? {
        return Err(todo_not_found());
    }
    info!(todo_id = %id, "todo deleted");
    Ok(Json(DeletedResponse {
        message: "Todo deleted successfully".into(),
    }))
}

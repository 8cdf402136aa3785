use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::ConversationStore;
use crate::error::ServerError;
use crate::schemas::api::conversation::{
    ConversationListResponse, ConversationQuery, ConversationResponse, ConversationSummaryResponse,
    ListConversationsQuery, MessageResponse, PaginationResponse, PreviewResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_conversation, list_conversations),
    components(schemas(
        ConversationResponse,
        MessageResponse,
        ConversationListResponse,
        ConversationSummaryResponse,
        PreviewResponse,
        PaginationResponse
    ))
)]
pub struct ConversationApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversation", get(get_conversation))
        .route("/conversations", get(list_conversations))
}

#[utoipa::path(
    get,
    path = "/api/conversation",
    tag = "conversations",
    params(ConversationQuery),
    responses(
        (status = 200, description = "Conversation messages", body = ConversationResponse),
        (status = 400, description = "Missing id"),
        (status = 404, description = "Unknown conversation"),
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConversationQuery>, QueryRejection>,
) -> Result<Json<ConversationResponse>, ServerError> {
    let Query(query) = query?;
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Conversation ID is required".into()))?;

    let conversation = state
        .store
        .find_conversation(id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Conversation not found".into()))?;
    Ok(Json(conversation.to_response()))
}

/// Conversations by most recent activity, one page at a time.
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    params(ListConversationsQuery),
    responses(
        (status = 200, description = "One page of conversation summaries", body = ConversationListResponse),
        (status = 400, description = "Invalid limit or page"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListConversationsQuery>, QueryRejection>,
) -> Result<Json<ConversationListResponse>, ServerError> {
    let Query(query) = query?;
    query.validate()?;

    let (page, limit) = (query.page(), query.limit());
    let summaries = state
        .store
        .list_conversations(query.skip(), i64::from(limit))
        .await?;
    let total = state.store.count_conversations().await?;

    Ok(Json(ConversationListResponse {
        conversations: summaries.iter().map(|s| s.to_response()).collect(),
        pagination: PaginationResponse::new(total, page, limit),
    }))
}

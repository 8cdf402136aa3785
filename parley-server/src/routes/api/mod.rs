pub mod conversation;
pub mod generate;
pub mod todos;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(generate::router())
        .merge(conversation::router())
        .merge(todos::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut openapi = Api::openapi();
    openapi.merge(generate::GenerateApi::openapi());
    openapi.merge(conversation::ConversationApi::openapi());
    openapi.merge(todos::TodosApi::openapi());
    openapi
}

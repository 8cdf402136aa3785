use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::{Conversation, ConversationSummary, Message, Role, encode_time};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Query for `GET /api/conversation`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    /// Conversation identifier.
    pub id: Option<String>,
}

/// Query for `GET /api/conversations`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ListConversationsQuery {
    /// Page size, 1 to 100 (default 10).
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    /// One-based page number (default 1).
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<u32>,
}

impl ListConversationsQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    /// Rows to skip for the requested page.
    pub fn skip(&self) -> i64 {
        i64::from(self.page().saturating_sub(1)) * i64::from(self.limit())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub role: Role,
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Response body for `GET /api/conversation`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub messages: Vec<MessageResponse>,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PreviewResponse {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryResponse {
    pub id: String,
    /// First message of the conversation.
    pub preview: Option<PreviewResponse>,
    pub messages_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginationResponse {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl PaginationResponse {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let per_page = i64::from(limit.max(1));
        Self {
            total,
            page,
            limit,
            pages: (total + per_page - 1) / per_page,
        }
    }
}

/// Response body for `GET /api/conversations`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummaryResponse>,
    pub pagination: PaginationResponse,
}

impl Message {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            role: self.role,
            content: self.content.clone(),
            timestamp: encode_time(&self.timestamp),
        }
    }
}

impl Conversation {
    pub fn to_response(&self) -> ConversationResponse {
        ConversationResponse {
            messages: self.messages.iter().map(Message::to_response).collect(),
            conversation_id: self.id.clone(),
        }
    }
}

impl ConversationSummary {
    pub fn to_response(&self) -> ConversationSummaryResponse {
        ConversationSummaryResponse {
            id: self.id.clone(),
            preview: self.preview.as_ref().map(|(role, content)| PreviewResponse {
                role: *role,
                content: content.clone(),
            }),
            messages_count: self.messages_count,
            created_at: encode_time(&self.created_at),
            updated_at: encode_time(&self.updated_at),
        }
    }
}

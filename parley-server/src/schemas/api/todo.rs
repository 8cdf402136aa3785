use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::{NewTodo, Todo, TodoPatch, encode_time};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Title is required".into()));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned())
}

/// Request body for `POST /api/todos`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateTodoRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateTodoRequest {
    pub fn into_new_todo(self) -> NewTodo {
        NewTodo {
            title: self.title.trim().to_owned(),
            description: trimmed(self.description),
        }
    }
}

/// Request body for `PATCH /api/todos/{id}`. Absent fields are left as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl UpdateTodoRequest {
    pub fn into_patch(self) -> TodoPatch {
        TodoPatch {
            title: trimmed(self.title),
            description: trimmed(self.description),
            completed: self.completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoEnvelope {
    pub todo: TodoResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoListResponse {
    pub todos: Vec<TodoResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub message: String,
}

impl Todo {
    pub fn to_response(&self) -> TodoResponse {
        TodoResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            created_at: encode_time(&self.created_at),
            updated_at: encode_time(&self.updated_at),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_title_fails_validation() {
        let req = CreateTodoRequest {
            title: "   ".into(),
            description: None,
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("Title is required"));
    }

    #[test]
    fn create_request_is_trimmed() {
        let req = CreateTodoRequest {
            title: "  buy milk ".into(),
            description: Some(" two litres ".into()),
        };
        assert!(req.validate().is_ok());
        let todo = req.into_new_todo();
        assert_eq!(todo.title, "buy milk");
        assert_eq!(todo.description.as_deref(), Some("two litres"));
    }

    #[test]
    fn patch_without_title_is_valid() {
        let req = UpdateTodoRequest {
            completed: Some(true),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        let blank = UpdateTodoRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }
}

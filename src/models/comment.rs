// src/models/comment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// Quem escreveu o comentário. No banco vira um user_id, com o gerente
// representado pelo ID reservado da configuração (MANAGER_USER_ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User(i64),
    Manager,
}

impl Author {
    pub fn from_user_id(user_id: i64, manager_user_id: i64) -> Self {
        if user_id == manager_user_id {
            Author::Manager
        } else {
            Author::User(user_id)
        }
    }

    pub fn user_id(self, manager_user_id: i64) -> i64 {
        match self {
            Author::User(id) => id,
            Author::Manager => manager_user_id,
        }
    }

    pub fn is_manager(self) -> bool {
        matches!(self, Author::Manager)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Comment {
    pub id: i64,
    pub lead_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// Comentário a gravar. `id = None` deixa o banco gerar o ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub id: Option<i64>,
    pub lead_id: i64,
    pub user_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentDto {
    pub id: i64,
    pub is_manager: bool,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentDto {
    pub fn from_comment(comment: Comment, manager_user_id: i64) -> Self {
        let author = Author::from_user_id(comment.user_id, manager_user_id);
        Self {
            id: comment.id,
            is_manager: author.is_manager(),
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCommentPayload {
    #[schema(example = 1001)]
    pub lead_id: i64,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Cliente pediu retorno à tarde")]
    pub comment: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadCommentsQuery {
    pub lead_id: i64,
}

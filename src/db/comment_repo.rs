// src/db/comment_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::comment::{Comment, NewComment},
};

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Com `id` informado (ID do CRM) grava com esse ID e relê o created_at;
    /// sem `id`, o banco gera ID e created_at.
    ///
    /// Reentrega do mesmo ID não falha: a linha existente é devolvida.
    async fn save(&self, comment: &NewComment) -> Result<Comment, AppError>;

    /// Comentários da lead em ordem cronológica.
    /// `AppError::EmptyResult("comments")` quando não há nenhum.
    async fn by_lead(&self, lead_id: i64) -> Result<Vec<Comment>, AppError>;
}

#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for CommentRepository {
    async fn save(&self, comment: &NewComment) -> Result<Comment, AppError> {
        match comment.id {
            Some(id) => {
                // ON CONFLICT: o Bitrix pode reenviar o mesmo webhook.
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO comments (id, lead_id, user_id, text)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(comment.lead_id)
                .bind(comment.user_id)
                .bind(&comment.text)
                .execute(&self.pool)
                .await?
                .rows_affected();

                if inserted == 0 {
                    tracing::info!(comment_id = id, "Comentário já gravado, ignorando reentrega");
                }

                let saved = sqlx::query_as::<_, Comment>(
                    "SELECT id, lead_id, user_id, text, created_at FROM comments WHERE id = $1",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

                Ok(saved)
            }
            None => {
                let saved = sqlx::query_as::<_, Comment>(
                    r#"
                    INSERT INTO comments (lead_id, user_id, text)
                    VALUES ($1, $2, $3)
                    RETURNING id, lead_id, user_id, text, created_at
                    "#,
                )
                .bind(comment.lead_id)
                .bind(comment.user_id)
                .bind(&comment.text)
                .fetch_one(&self.pool)
                .await?;

                Ok(saved)
            }
        }
    }

    async fn by_lead(&self, lead_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, lead_id, user_id, text, created_at
            FROM comments
            WHERE lead_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        if comments.is_empty() {
            return Err(AppError::EmptyResult("comments"));
        }

        Ok(comments)
    }
}

// src/handlers/comments.rs

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, ApiResponse, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{RequireRole, UserOnly, UserOrManager},
    },
    models::comment::{AddCommentPayload, CommentDto, LeadCommentsQuery},
};

#[utoipa::path(
    post,
    path = "/api/v1/comment/new",
    tag = "Comments",
    request_body = AddCommentPayload,
    responses(
        (status = 200, description = "Comentário gravado no Bitrix e localmente", body = CommentDto),
        (status = 403, description = "A lead é de outro usuário"),
        (status = 404, description = "Lead não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn new_comment(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<UserOnly>,
    payload: Result<Json<AddCommentPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()).to_api_error(&locale))?;

    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let comment = app_state
        .comment_service
        .post(&guard.ctx, payload.lead_id, &payload.comment)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(ApiResponse::new(comment))
}

#[utoipa::path(
    get,
    path = "/api/v1/lead/comments",
    tag = "Comments",
    params(LeadCommentsQuery),
    responses(
        (status = 200, description = "Comentários da lead em ordem cronológica", body = [CommentDto])
    ),
    security(("api_jwt" = []))
)]
pub async fn lead_comments(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<UserOrManager>,
    query: Result<Query<LeadCommentsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()).to_api_error(&locale))?;

    let comments = app_state
        .comment_service
        .list_for(&guard.ctx, query.lead_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(ApiResponse::new(comments))
}

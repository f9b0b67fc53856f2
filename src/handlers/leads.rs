// src/handlers/leads.rs

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::{ApiError, ApiResponse, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{RequireRole, UserOnly, UserOrManager},
    },
    models::lead::{CreateLeadPayload, LeadCreated, LeadDto, LeadFilter, StatisticQuery, UserStatistic},
};

// ---
// Handler: save_lead
// ---
#[utoipa::path(
    post,
    path = "/api/v1/lead/save",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 200, description = "Lead aceita pelo Bitrix e gravada", body = LeadCreated),
        (status = 400, description = "Dados inválidos"),
        (status = 500, description = "Falha no Bitrix ou no banco")
    ),
    security(("api_jwt" = []))
)]
pub async fn save_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<UserOnly>,
    payload: Result<Json<CreateLeadPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(draft) = payload.map_err(|e| AppError::BadRequest(e.body_text()).to_api_error(&locale))?;

    let lead = app_state
        .lead_service
        .submit(&guard.ctx, draft)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(ApiResponse::new(LeadCreated { id: lead.id }))
}

// ---
// Handler: list_leads
// ---
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    tag = "Leads",
    params(LeadFilter),
    responses(
        (status = 200, description = "Leads com comentários", body = [LeadDto])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<UserOrManager>,
    filter: Result<Query<LeadFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(filter) = filter.map_err(|e| AppError::BadRequest(e.body_text()).to_api_error(&locale))?;

    let leads = app_state
        .lead_service
        .list(&guard.ctx, filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(ApiResponse::new(leads))
}

// ---
// Handler: user_statistic
// ---
#[utoipa::path(
    get,
    path = "/api/v1/user/statistic",
    tag = "Leads",
    params(StatisticQuery),
    responses(
        (status = 200, description = "Recompensas do período", body = UserStatistic),
        (status = 403, description = "Usuário comum consultando outro usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn user_statistic(
    State(app_state): State<AppState>,
    locale: Locale,
    guard: RequireRole<UserOrManager>,
    query: Result<Query<StatisticQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()).to_api_error(&locale))?;

    let ctx = &guard.ctx;
    let user_id = match query.user_id {
        Some(other) if other != ctx.user_id && !ctx.is_manager() => {
            return Err(AppError::Forbidden("statistic of another user").to_api_error(&locale));
        }
        Some(user_id) => user_id,
        None => ctx.user_id,
    };

    let stats = app_state
        .lead_service
        .user_payment_statistic(user_id, query.start_date, query.end_date)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(ApiResponse::new(stats))
}

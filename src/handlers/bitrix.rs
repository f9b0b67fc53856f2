// src/handlers/bitrix.rs
//
// Webhooks de saída do Bitrix. Respondem só com o status; o Bitrix não lê o corpo.

use std::collections::HashMap;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    Form,
};

use crate::{
    common::error::{AppError, ErrorKind},
    config::AppState,
    models::bitrix::{CommentHook, DealHook},
};

type HookForm = Result<Form<Vec<(String, String)>>, FormRejection>;

// Campos repetidos: vale o primeiro, como em um form comum.
fn into_map(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut form = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        form.entry(key).or_insert(value);
    }
    form
}

fn status_for(err: &AppError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---
// Handler: deal_changed (gatilho de mudança de etapa)
// ---
#[utoipa::path(
    post,
    path = "/api/v1/bitrix/lead/edit",
    tag = "Bitrix",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "document_id[i], auth[member_id], ..."),
    responses(
        (status = 200, description = "Lead sincronizada"),
        (status = 400, description = "document_id inválido"),
        (status = 403, description = "auth[member_id] incorreto"),
        (status = 500, description = "Falha no Bitrix ou no banco")
    )
)]
pub async fn deal_changed(State(app_state): State<AppState>, form: HookForm) -> StatusCode {
    const OP: &str = "BitrixController.deal_changed";

    let Ok(Form(pairs)) = form else {
        tracing::info!(op = OP, "Corpo do webhook ilegível");
        return StatusCode::BAD_REQUEST;
    };

    let form = into_map(pairs);
    tracing::debug!(op = OP, keys = ?form.keys().collect::<Vec<_>>(), "Webhook recebido");

    let hook = DealHook::from_form(&form);

    if hook.auth.member_id != app_state.config.bitrix.outgoing_webhook_auth {
        tracing::info!(op = OP, "auth[member_id] inválido");
        return StatusCode::FORBIDDEN;
    }

    match app_state.lead_service.reconcile(&hook.document_id).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(op = OP, "{}", e);
            } else {
                tracing::info!(op = OP, "{}", e);
            }
            status
        }
    }
}

// ---
// Handler: comment_added (ONCRMTIMELINECOMMENTADD)
// ---
#[utoipa::path(
    post,
    path = "/api/v1/bitrix/comment/new",
    tag = "Bitrix",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "data[FIELDS][ID], auth[application_token], ..."),
    responses(
        (status = 200, description = "Comentário do gerente gravado"),
        (status = 400, description = "data[FIELDS][ID] inválido"),
        (status = 403, description = "Token incorreto ou comentário de outro funil"),
        (status = 500, description = "Falha no Bitrix ou no banco")
    )
)]
pub async fn comment_added(State(app_state): State<AppState>, form: HookForm) -> StatusCode {
    const OP: &str = "BitrixController.comment_added";

    let Ok(Form(pairs)) = form else {
        tracing::info!(op = OP, "Corpo do webhook ilegível");
        return StatusCode::BAD_REQUEST;
    };

    let form = into_map(pairs);
    tracing::debug!(op = OP, keys = ?form.keys().collect::<Vec<_>>(), "Webhook recebido");

    let hook = CommentHook::from_form(&form);

    // O token é conferido antes do ID: requisição sem token válido é sempre 403.
    if hook.auth.application_token != app_state.config.bitrix.auth_token_comment {
        tracing::info!(op = OP, "auth[application_token] inválido");
        return StatusCode::FORBIDDEN;
    }

    let comment_id = match hook.comment_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(op = OP, "{}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match app_state.comment_service.ingest(comment_id).await {
        Ok(()) => StatusCode::OK,
        Err(e) if e.is_out_of_funnel() => {
            tracing::info!(op = OP, comment_id, "{}", e);
            StatusCode::FORBIDDEN
        }
        Err(e) => {
            tracing::error!(op = OP, comment_id, "{}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// Qualquer método além de POST nos webhooks.
pub async fn method_not_allowed(method: Method) -> impl IntoResponse {
    tracing::info!(%method, "Método não permitido no webhook");
    (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "POST")])
}

// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::common::i18n;
use crate::middleware::i18n::Locale;
use crate::services::bitrix_service::CrmError;

// Conjunto fechado de categorias que a borda HTTP entende.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Validation,
    Unauthenticated,
    Upstream,
    Storage,
    Unknown,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("{0} não encontrado")]
    NotFound(&'static str),

    // Consulta de lista sem linhas. Os serviços convertem em lista vazia.
    #[error("nenhum registro de {0}")]
    EmptyResult(&'static str),

    #[error("Acesso negado: {0}")]
    Forbidden(&'static str),

    #[error("o comentário não pertence ao funil configurado")]
    OutOfFunnel,

    #[error("Falha no CRM: {0}")]
    Upstream(#[from] CrmError),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Erro opaco reembalado com o nome da operação, para diagnóstico.
    #[error("{op}: {source}")]
    Op {
        op: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::InvalidCredentials | AppError::InvalidToken => ErrorKind::Unauthenticated,
            AppError::NotFound(_) | AppError::EmptyResult(_) => ErrorKind::NotFound,
            AppError::Forbidden(_) | AppError::OutOfFunnel => ErrorKind::Forbidden,
            AppError::Upstream(_) => ErrorKind::Upstream,
            AppError::DatabaseError(_) => ErrorKind::Storage,
            AppError::InternalServerError(_) | AppError::BcryptError(_) | AppError::JwtError(_) => {
                ErrorKind::Unknown
            }
            AppError::Op { source, .. } => source.kind(),
        }
    }

    /// Anexa a tag da operação aos erros opacos. Erros que o chamador
    /// precisa distinguir (não encontrado, proibido, validação) passam intactos.
    pub fn with_op(self, op: &'static str) -> Self {
        match self.kind() {
            ErrorKind::Upstream | ErrorKind::Storage | ErrorKind::Unknown => AppError::Op {
                op,
                source: Box::new(self),
            },
            _ => self,
        }
    }

    /// Remove os invólucros `Op`.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Op { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_out_of_funnel(&self) -> bool {
        matches!(self.root(), AppError::OutOfFunnel)
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.root() {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AppError::NotFound(_) | AppError::EmptyResult(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::OutOfFunnel => (StatusCode::FORBIDDEN, "OUT_OF_FUNNEL"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Converte para o envelope HTTP com a mensagem no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, "Erro Interno do Servidor: {}", self);
        }

        let details = match self.root() {
            AppError::ValidationError(errors) => Some(validation_details(errors)),
            _ => None,
        };

        let error = match self.root() {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::NotFound(entity) | AppError::EmptyResult(entity) => {
                format!("{} ({})", i18n::message(code, &locale.0), entity)
            }
            _ => i18n::message(code, &locale.0).to_string(),
        };

        ApiError {
            status,
            code,
            error,
            details,
        }
    }
}

fn validation_details(errors: &validator::ValidationErrors) -> HashMap<String, Vec<String>> {
    let mut details = HashMap::new();
    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<String> = field_errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .collect();
        details.insert(field.to_string(), messages);
    }
    details
}

// Envelope de erro devolvido pelos handlers.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// Usado quando não há Locale disponível (rejeição de extratores).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

// Envelope de sucesso: { "result": ... }
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(result: T) -> Json<Self> {
        Json(Self { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_op_keeps_domain_errors_visible() {
        let err = AppError::Forbidden("lead").with_op("CommentService.post");
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = AppError::NotFound("lead").with_op("CommentService.post");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = AppError::OutOfFunnel.with_op("CommentService.ingest");
        assert!(err.is_out_of_funnel());
    }

    #[test]
    fn with_op_wraps_opaque_errors_and_keeps_kind() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound).with_op("LeadService.submit");
        assert!(matches!(err, AppError::Op { op: "LeadService.submit", .. }));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().starts_with("LeadService.submit: "));
    }

    #[test]
    fn status_follows_kind_through_op_wrappers() {
        let err = AppError::Upstream(CrmError::Api {
            error: "QUERY_LIMIT_EXCEEDED".into(),
            description: "Too many requests".into(),
        })
        .with_op("LeadService.reconcile");

        let api = err.to_api_error(&Locale::default());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "UPSTREAM_ERROR");
    }

    #[test]
    fn messages_follow_locale() {
        let err = AppError::Forbidden("lead");
        let en = err.to_api_error(&Locale("en".into()));
        let ru = err.to_api_error(&Locale("ru".into()));
        assert_eq!(en.status, StatusCode::FORBIDDEN);
        assert_ne!(en.error, ru.error);
    }
}

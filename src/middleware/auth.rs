// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::Role,
};

/// Identidade do chamador, repassada explicitamente aos serviços.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: i64,
    pub roles: Vec<Role>,
}

impl RequestContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_manager(&self) -> bool {
        self.has_role(Role::Manager) || self.has_role(Role::Admin)
    }
}

// O middleware em si
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    mut request: axum::extract::Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(bearer) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return Err(AppError::InvalidToken.to_api_error(&locale));
    };

    let ctx = app_state
        .auth_service
        .validate_token(bearer.token())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    // Insere o contexto nos "extensions" da requisição
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestContext>() {
            Some(ctx) => Ok(ctx.clone()),
            None => {
                let Ok(locale) = Locale::from_request_parts(parts, state).await;
                Err(AppError::InvalidToken.to_api_error(&locale))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_counts_as_manager() {
        let ctx = RequestContext {
            user_id: 1,
            roles: vec![Role::Admin],
        };
        assert!(ctx.is_manager());

        let ctx = RequestContext {
            user_id: 7,
            roles: vec![Role::User],
        };
        assert!(!ctx.is_manager());
    }
}

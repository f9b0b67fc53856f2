// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::{ApiError, AppError},
    middleware::{auth::RequestContext, i18n::Locale},
    models::auth::Role,
};

/// 1. O Trait que define quais papéis podem passar
pub trait RoleDef: Send + Sync + 'static {
    fn roles() -> &'static [Role];
}

/// 2. O Extractor (Guardião). Entrega o contexto já verificado.
pub struct RequireRole<T> {
    pub ctx: RequestContext,
    _role: PhantomData<T>,
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(locale) = Locale::from_request_parts(parts, state).await;

        // A. Extrai o contexto (401 sem ele)
        let ctx = RequestContext::from_request_parts(parts, state).await?;

        // B. Confere os papéis
        if !T::roles().iter().any(|role| ctx.has_role(*role)) {
            tracing::info!(user_id = ctx.user_id, required = ?T::roles(), "Papel insuficiente");
            return Err(AppError::Forbidden("role").to_api_error(&locale));
        }

        Ok(RequireRole {
            ctx,
            _role: PhantomData,
        })
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct UserOnly;
impl RoleDef for UserOnly {
    fn roles() -> &'static [Role] { &[Role::User] }
}

pub struct UserOrManager;
impl RoleDef for UserOrManager {
    fn roles() -> &'static [Role] { &[Role::User, Role::Manager, Role::Admin] }
}

// src/router.rs

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Webhooks do Bitrix (segredo no próprio form, sem JWT)
    let bitrix_routes = Router::new()
        .route(
            "/lead/edit",
            post(handlers::bitrix::deal_changed).fallback(handlers::bitrix::method_not_allowed),
        )
        .route(
            "/comment/new",
            post(handlers::bitrix::comment_added).fallback(handlers::bitrix::method_not_allowed),
        );

    // Rotas dos agentes (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/lead/save", post(handlers::leads::save_lead))
        .route("/leads", get(handlers::leads::list_leads))
        .route("/lead/comments", get(handlers::comments::lead_comments))
        .route("/comment/new", post(handlers::comments::new_comment))
        .route("/user/statistic", get(handlers::leads::user_statistic))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let v1 = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .nest("/bitrix", bitrix_routes)
        .merge(user_routes);

    let request_timeout = app_state.config.request_timeout;

    // Combina tudo no router principal
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/v1", v1)
        .with_state(app_state)
        // Estourado o prazo, o future do handler é descartado e as
        // chamadas ao banco e ao Bitrix em andamento são canceladas.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
}

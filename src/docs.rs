// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,

        // --- Leads ---
        handlers::leads::save_lead,
        handlers::leads::list_leads,
        handlers::leads::user_statistic,

        // --- Comments ---
        handlers::comments::new_comment,
        handlers::comments::lead_comments,

        // --- Bitrix ---
        handlers::bitrix::deal_changed,
        handlers::bitrix::comment_added,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Leads ---
            models::lead::CreateLeadPayload,
            models::lead::LeadCreated,
            models::lead::LeadDto,
            models::lead::UserStatistic,

            // --- Comments ---
            models::comment::AddCommentPayload,
            models::comment::CommentDto,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Leads", description = "Leads dos agentes e estatística de recompensas"),
        (name = "Comments", description = "Comentários das leads"),
        (name = "Bitrix", description = "Webhooks de saída do Bitrix24")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

// src/services/comment_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::{CommentStore, LeadStore},
    middleware::auth::RequestContext,
    models::comment::{Author, CommentDto, NewComment},
    services::bitrix_service::CrmClient,
};

// Mantém os comentários iguais no Bitrix e no banco, sempre com o ID do Bitrix.
#[derive(Clone)]
pub struct CommentService {
    crm: Arc<dyn CrmClient>,
    leads: Arc<dyn LeadStore>,
    comments: Arc<dyn CommentStore>,
    funnel_id: String,
    manager_user_id: i64,
}

impl CommentService {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        leads: Arc<dyn LeadStore>,
        comments: Arc<dyn CommentStore>,
        funnel_id: String,
        manager_user_id: i64,
    ) -> Self {
        Self {
            crm,
            leads,
            comments,
            funnel_id,
            manager_user_id,
        }
    }

    /// Comentário do agente: só o dono da lead pode comentar.
    /// O Bitrix grava primeiro e o ID dele vira o ID local.
    pub async fn post(
        &self,
        ctx: &RequestContext,
        lead_id: i64,
        text: &str,
    ) -> Result<CommentDto, AppError> {
        const OP: &str = "CommentService.post";

        let lead = self.leads.by_id(lead_id).await.map_err(|e| e.with_op(OP))?;

        if lead.user_id != ctx.user_id {
            tracing::info!(op = OP, lead_id, user_id = ctx.user_id, "Lead pertence a outro usuário");
            return Err(AppError::Forbidden("lead belongs to another user"));
        }

        let crm_comment = self
            .crm
            .send_comment(lead_id, text)
            .await
            .map_err(|e| AppError::from(e).with_op(OP))?;

        let saved = self
            .comments
            .save(&NewComment {
                id: Some(crm_comment.id),
                lead_id,
                user_id: Author::User(ctx.user_id).user_id(self.manager_user_id),
                text: text.to_string(),
            })
            .await
            .map_err(|e| e.with_op(OP))?;

        tracing::info!(op = OP, lead_id, comment_id = saved.id, "Comentário enviado ao Bitrix");

        Ok(CommentDto::from_comment(saved, self.manager_user_id))
    }

    /// Comentário criado no Bitrix (webhook). Comentários de deals de outro
    /// funil são recusados com `OutOfFunnel`. Reentrega do mesmo ID é no-op.
    pub async fn ingest(&self, crm_comment_id: i64) -> Result<(), AppError> {
        const OP: &str = "CommentService.ingest";

        let view = self
            .crm
            .get_comment(crm_comment_id)
            .await
            .map_err(|e| AppError::from(e).with_op(OP))?;

        let entity_id = parse_crm_id(&view.entity_id, "ENTITY_ID").map_err(|e| e.with_op(OP))?;

        let lead = self
            .crm
            .get_lead(entity_id)
            .await
            .map_err(|e| AppError::from(e).with_op(OP))?;

        if lead.category_id != self.funnel_id {
            tracing::info!(
                op = OP,
                comment_id = crm_comment_id,
                category_id = %lead.category_id,
                "Comentário de outro funil ignorado"
            );
            return Err(AppError::OutOfFunnel);
        }

        let lead_id = parse_crm_id(&lead.id, "ID").map_err(|e| e.with_op(OP))?;

        self.comments
            .save(&NewComment {
                id: Some(crm_comment_id),
                lead_id,
                user_id: Author::Manager.user_id(self.manager_user_id),
                text: view.comment,
            })
            .await
            .map_err(|e| e.with_op(OP))?;

        tracing::info!(op = OP, lead_id, comment_id = crm_comment_id, "Comentário do gerente recebido");

        Ok(())
    }

    /// Comentários da lead; sem comentários => lista vazia.
    pub async fn list(&self, lead_id: i64) -> Result<Vec<CommentDto>, AppError> {
        const OP: &str = "CommentService.list";

        match self.comments.by_lead(lead_id).await {
            Ok(comments) => Ok(comments
                .into_iter()
                .map(|c| CommentDto::from_comment(c, self.manager_user_id))
                .collect()),
            Err(AppError::EmptyResult(_)) => Ok(Vec::new()),
            Err(e) => Err(e.with_op(OP)),
        }
    }

    /// Comentários de uma lead com checagem de acesso: gerente vê todas,
    /// agente só as próprias.
    pub async fn list_for(&self, ctx: &RequestContext, lead_id: i64) -> Result<Vec<CommentDto>, AppError> {
        const OP: &str = "CommentService.list_for";

        if !ctx.is_manager() {
            let lead = self.leads.by_id(lead_id).await.map_err(|e| e.with_op(OP))?;
            if lead.user_id != ctx.user_id {
                return Err(AppError::Forbidden("lead belongs to another user"));
            }
        }

        self.list(lead_id).await
    }
}

// IDs do Bitrix chegam como string.
fn parse_crm_id(raw: &str, field: &str) -> Result<i64, AppError> {
    raw.trim().parse::<i64>().map_err(|_| {
        AppError::InternalServerError(anyhow::anyhow!("{field} inválido vindo do Bitrix: '{raw}'"))
    })
}

// src/services/lead_service.rs

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{LeadStore, ReferralStore, UserStore},
    middleware::auth::RequestContext,
    models::{
        bitrix::{deal_id_from_document, LeadView},
        lead::{CreateLeadPayload, Lead, LeadDto, LeadFilter, LeadPatch, LeadStatus, NewLead, UserStatistic},
    },
    services::{bitrix_service::CrmClient, comment_service::CommentService},
};

#[derive(Clone)]
pub struct LeadService {
    crm: Arc<dyn CrmClient>,
    leads: Arc<dyn LeadStore>,
    users: Arc<dyn UserStore>,
    referrals: Arc<dyn ReferralStore>,
    comments: CommentService,
}

impl LeadService {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        leads: Arc<dyn LeadStore>,
        users: Arc<dyn UserStore>,
        referrals: Arc<dyn ReferralStore>,
        comments: CommentService,
    ) -> Self {
        Self {
            crm,
            leads,
            users,
            referrals,
            comments,
        }
    }

    /// Nova lead do agente. O deal é criado no Bitrix primeiro; só com o ID
    /// dele a linha local é gravada.
    ///
    /// Sem compensação: se o insert local falhar depois do Bitrix aceitar,
    /// o deal fica só no CRM. Se o comentário inicial falhar, a lead fica
    /// sem ele e o agente precisa reenviar.
    pub async fn submit(&self, ctx: &RequestContext, draft: CreateLeadPayload) -> Result<Lead, AppError> {
        const OP: &str = "LeadService.submit";

        draft.validate()?;

        let user = self
            .users
            .find_by_id(ctx.user_id)
            .await
            .map_err(|e| e.with_op(OP))?
            .ok_or(AppError::NotFound("user"))?;

        let deal = self
            .crm
            .send_deal(&draft, &user)
            .await
            .map_err(|e| AppError::from(e).with_op(OP))?;

        tracing::info!(op = OP, deal_id = deal.id, user_id = ctx.user_id, "Deal criado no Bitrix");

        let lead = self
            .leads
            .create(&NewLead {
                id: deal.id,
                user_id: ctx.user_id,
                fio: draft.name,
                address: draft.address,
                phone_number: draft.phone_number,
                status_id: LeadStatus::New.id(),
                internet: draft.is_internet,
                cleaning: draft.is_cleaning,
                shipping: draft.is_shipping,
                reward_internet: draft.reward_internet,
                reward_cleaning: draft.reward_cleaning,
                reward_shipping: draft.reward_shipping,
            })
            .await
            .map_err(|e| {
                tracing::error!(op = OP, deal_id = deal.id, "Deal existe no Bitrix mas não foi gravado localmente");
                e.with_op(OP)
            })?;

        if !draft.comment.is_empty() {
            self.comments
                .post(ctx, lead.id, &draft.comment)
                .await
                .map_err(|e| e.with_op(OP))?;
        }

        Ok(lead)
    }

    /// Webhook de mudança do deal: relê o deal no Bitrix e aplica
    /// etapa e recompensas na lead local.
    pub async fn reconcile(&self, document_id: &[String]) -> Result<(), AppError> {
        const OP: &str = "LeadService.reconcile";

        let deal_id = deal_id_from_document(document_id)?;

        let view = self
            .crm
            .get_lead(deal_id)
            .await
            .map_err(|e| AppError::from(e).with_op(OP))?;

        let patch = patch_from_view(&view, Utc::now()).map_err(|e| e.with_op(OP))?;

        let updated = self
            .leads
            .update(deal_id, &patch)
            .await
            .map_err(|e| e.with_op(OP))?;

        if updated == 0 {
            tracing::warn!(op = OP, deal_id, "Deal sem lead local, nada atualizado");
        } else {
            tracing::info!(op = OP, deal_id, status_id = ?patch.status_id, "Lead sincronizada com o Bitrix");
        }

        Ok(())
    }

    /// Leads com os comentários. O papel `user` só vê as próprias.
    pub async fn list(&self, ctx: &RequestContext, mut filter: LeadFilter) -> Result<Vec<LeadDto>, AppError> {
        const OP: &str = "LeadService.list";

        filter.validate()?;

        if !ctx.is_manager() || filter.user_id.is_none() {
            filter.user_id = Some(ctx.user_id);
        }

        let leads = match self.leads.list(&filter).await {
            Ok(leads) => leads,
            Err(AppError::EmptyResult(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.with_op(OP)),
        };

        let mut result = Vec::with_capacity(leads.len());
        for lead in leads {
            let comments = self.comments.list(lead.id).await.map_err(|e| e.with_op(OP))?;
            result.push(LeadDto::from_lead(lead, comments));
        }

        Ok(result)
    }

    /// Soma das recompensas das leads criadas na janela mais o custo das
    /// indicações ativas. Sem leads ou sem indicações, a parcela é 0.
    pub async fn user_payment_statistic(
        &self,
        user_id: i64,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<UserStatistic, AppError> {
        const OP: &str = "LeadService.user_payment_statistic";

        let (start, end) = window(start_date, end_date)?;

        let filter = LeadFilter {
            user_id: Some(user_id),
            start_date: start,
            created_before: end,
            ..Default::default()
        };

        let leads = match self.leads.list(&filter).await {
            Ok(leads) => leads,
            Err(AppError::EmptyResult(_)) => Vec::new(),
            Err(e) => return Err(e.with_op(OP)),
        };

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| e.with_op(OP))?
            .ok_or(AppError::NotFound("user"))?;

        let referrals = match self.referrals.active_by_code(&user.referral_code).await {
            Ok(referrals) => referrals,
            Err(AppError::EmptyResult(_)) => Vec::new(),
            Err(e) => return Err(e.with_op(OP)),
        };

        let mut stats = UserStatistic {
            start_date: start,
            end_date: end,
            ..Default::default()
        };

        for lead in &leads {
            stats.internet += lead.reward_internet;
            stats.cleaning += lead.reward_cleaning;
            stats.shipping += lead.reward_shipping;
        }
        stats.referrals = referrals.iter().map(|r| r.cost).sum();
        stats.total = stats.internet + stats.cleaning + stats.shipping + stats.referrals;

        Ok(stats)
    }
}

/// Patch a aplicar para um deal visto no Bitrix. Função pura da view e do
/// instante `now`; etapa fora da tabela é erro e nada é gravado.
pub fn patch_from_view(view: &LeadView, now: DateTime<Utc>) -> Result<LeadPatch, AppError> {
    let status = LeadStatus::from_crm_stage(&view.status).ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!("etapa do Bitrix desconhecida: '{}'", view.status))
    })?;

    Ok(LeadPatch {
        status_id: Some(status.id()),
        reward_internet: Some(parse_reward(&view.internet_payment)),
        reward_cleaning: Some(parse_reward(&view.cleaning_payment)),
        reward_shipping: Some(parse_reward(&view.shipping_payment)),
        completed_at: (status == LeadStatus::Completed).then_some(now),
        payment_at: (status == LeadStatus::Paid).then_some(now),
        ..Default::default()
    })
}

// Valor ilegível ou negativo vira 0, campo a campo.
fn parse_reward(raw: &str) -> Decimal {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|value| !value.is_sign_negative() || value.is_zero())
        .unwrap_or(Decimal::ZERO)
}

// Datas do filtro de estatística: [início do primeiro dia, meia-noite depois do último).
fn window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AppError::BadRequest("start_date maior que end_date".into()));
        }
    }

    let start = start.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    let end = end
        .and_then(|d| d.succ_opt())
        .map(|d| d.and_time(NaiveTime::MIN).and_utc());

    Ok((start, end))
}

// src/models/lead.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::comment::CommentDto;

// --- STATUS ---

// Etapas do funil no Bitrix. O número é o que fica salvo em leads.status_id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum LeadStatus {
    New = 0,
    Preparation = 1,
    PrepaymentInvoice = 2,
    FinalInvoice = 3,
    Completed = 4,
    Paid = 5,
    Lost = 6,
    Executing = 7,
}

const CRM_STAGES: [(&str, LeadStatus); 8] = [
    ("C42:NEW", LeadStatus::New),
    ("C42:PREPARATION", LeadStatus::Preparation),
    ("C42:PREPAYMENT_INVOIC", LeadStatus::PrepaymentInvoice),
    ("C42:EXECUTING", LeadStatus::Executing),
    ("C42:FINAL_INVOICE", LeadStatus::FinalInvoice),
    ("C42:1", LeadStatus::Completed),
    ("C42:LOSE", LeadStatus::Lost),
    ("C42:WON", LeadStatus::Paid),
];

impl LeadStatus {
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Converte o STAGE_ID do deal no Bitrix. Etapa desconhecida => None.
    pub fn from_crm_stage(stage: &str) -> Option<Self> {
        CRM_STAGES
            .iter()
            .find(|(code, _)| *code == stage)
            .map(|(_, status)| *status)
    }
}

// --- LINHA DO BANCO ---

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Lead {
    pub id: i64,
    pub user_id: i64,
    pub fio: String,
    pub address: String,
    pub phone_number: String,
    pub status_id: i16,
    pub internet: bool,
    pub cleaning: bool,
    pub shipping: bool,
    pub reward_internet: Decimal,
    pub reward_cleaning: Decimal,
    pub reward_shipping: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payment_at: Option<DateTime<Utc>>,
}

// Dados para inserir uma lead já aceita pelo CRM (o id é do deal).
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub id: i64,
    pub user_id: i64,
    pub fio: String,
    pub address: String,
    pub phone_number: String,
    pub status_id: i16,
    pub internet: bool,
    pub cleaning: bool,
    pub shipping: bool,
    pub reward_internet: Decimal,
    pub reward_cleaning: Decimal,
    pub reward_shipping: Decimal,
}

/// Patch esparso: só os campos `Some` são gravados.
///
/// `completed_at` e `payment_at` são gravados uma única vez: se a coluna
/// já tiver valor, o patch não a sobrescreve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPatch {
    pub status_id: Option<i16>,
    pub reward_internet: Option<Decimal>,
    pub reward_cleaning: Option<Decimal>,
    pub reward_shipping: Option<Decimal>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payment_at: Option<DateTime<Utc>>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        *self == LeadPatch::default()
    }
}

// --- FILTRO ---

#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadFilter {
    pub status_id: Option<i16>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Ignorado para o papel `user`: sempre o próprio usuário.
    pub user_id: Option<i64>,
    pub is_internet: Option<bool>,
    pub is_shipping: Option<bool>,
    pub is_cleaning: Option<bool>,
    /// Busca sem distinção de maiúsculas em fio, endereço e telefone.
    pub search: Option<String>,
    /// 0 = sem limite.
    #[serde(default)]
    #[validate(range(min = 0, message = "invalid_limit"))]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0, message = "invalid_offset"))]
    pub offset: i64,
    /// Limite superior exclusivo em created_at. Não vem da query string.
    #[serde(skip)]
    #[param(ignore)]
    pub created_before: Option<DateTime<Utc>>,
}

// --- PAYLOADS ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_lead_draft"))]
pub struct CreateLeadPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Иван Петров")]
    pub name: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "+79001234567")]
    pub phone_number: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Lenina 1")]
    pub address: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub reward_internet: Decimal,
    #[serde(default)]
    pub reward_cleaning: Decimal,
    #[serde(default)]
    pub reward_shipping: Decimal,

    #[serde(default)]
    pub is_internet: bool,
    #[serde(default)]
    pub is_shipping: bool,
    #[serde(default)]
    pub is_cleaning: bool,
}

fn validate_lead_draft(draft: &CreateLeadPayload) -> Result<(), ValidationError> {
    if !(draft.is_internet || draft.is_shipping || draft.is_cleaning) {
        let mut err = ValidationError::new("at_least_one_service");
        err.message = Some("at_least_one_service".into());
        return Err(err);
    }

    let rewards = [draft.reward_internet, draft.reward_cleaning, draft.reward_shipping];
    if rewards.iter().any(|r| r.is_sign_negative() && !r.is_zero()) {
        let mut err = ValidationError::new("negative_reward");
        err.message = Some("negative_reward".into());
        return Err(err);
    }

    Ok(())
}

// --- RESPOSTAS ---

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadDto {
    pub id: i64,
    pub fio: String,
    pub address: String,
    pub status_id: i16,
    pub phone_number: String,
    pub is_internet: bool,
    pub is_cleaning: bool,
    pub is_shipping: bool,
    pub comments: Vec<CommentDto>,
    pub reward_internet: Decimal,
    pub reward_cleaning: Decimal,
    pub reward_shipping: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payment_at: Option<DateTime<Utc>>,
}

impl LeadDto {
    pub fn from_lead(lead: Lead, comments: Vec<CommentDto>) -> Self {
        Self {
            id: lead.id,
            fio: lead.fio,
            address: lead.address,
            status_id: lead.status_id,
            phone_number: lead.phone_number,
            is_internet: lead.internet,
            is_cleaning: lead.cleaning,
            is_shipping: lead.shipping,
            comments,
            reward_internet: lead.reward_internet,
            reward_cleaning: lead.reward_cleaning,
            reward_shipping: lead.reward_shipping,
            created_at: lead.created_at,
            completed_at: lead.completed_at,
            payment_at: lead.payment_at,
        }
    }
}

// Resposta de /lead/save: o ID atribuído pelo Bitrix.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadCreated {
    #[schema(example = 1001)]
    pub id: i64,
}

// --- ESTATÍSTICA ---

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatisticQuery {
    #[param(value_type = Option<String>, format = Date, example = "2024-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date, example = "2024-12-31")]
    pub end_date: Option<NaiveDate>,
    /// Apenas gerentes podem consultar outro usuário.
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct UserStatistic {
    pub start_date: Option<DateTime<Utc>>,
    /// Exclusivo: meia-noite do dia seguinte ao `end_date` pedido.
    pub end_date: Option<DateTime<Utc>>,
    pub internet: Decimal,
    pub cleaning: Decimal,
    pub shipping: Decimal,
    pub referrals: Decimal,
    pub total: Decimal,
}

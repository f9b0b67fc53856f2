// src/models/bitrix.rs
//
// Tipos do Bitrix: webhooks de saída (form-urlencoded) e respostas da API REST.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::error::AppError;

// --- WEBHOOKS (CRM -> nós) ---

// Segredos do bloco auth[...] que o Bitrix envia em todo webhook de saída.
// domain e endpoints também chegam, mas não são usados.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookAuth {
    pub member_id: String,
    pub application_token: String,
}

impl HookAuth {
    fn from_form(form: &HashMap<String, String>) -> Self {
        let field = |key: &str| form.get(key).cloned().unwrap_or_default();
        Self {
            member_id: field("auth[member_id]"),
            application_token: field("auth[application_token]"),
        }
    }
}

/// Gatilho de mudança de etapa do deal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealHook {
    pub document_id: Vec<String>,
    pub auth: HookAuth,
}

impl DealHook {
    /// Lê `document_id[0]`, `document_id[1]`, ... e para no primeiro índice
    /// ausente. Índices depois do buraco são ignorados; um valor presente mas
    /// vazio é mantido e recusado depois por `deal_id_from_document`.
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        let document_id = (0..)
            .map(|i| form.get(&format!("document_id[{i}]")))
            .map_while(|value| value.cloned())
            .collect();

        Self {
            document_id,
            auth: HookAuth::from_form(form),
        }
    }
}

/// Evento ONCRMTIMELINECOMMENTADD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentHook {
    pub raw_comment_id: String,
    pub auth: HookAuth,
}

impl CommentHook {
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        Self {
            raw_comment_id: form.get("data[FIELDS][ID]").cloned().unwrap_or_default(),
            auth: HookAuth::from_form(form),
        }
    }

    pub fn comment_id(&self) -> Result<i64, AppError> {
        self.raw_comment_id
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("data[FIELDS][ID] inválido: '{}'", self.raw_comment_id)))
    }
}

/// Extrai o ID do deal de `["crm", "CCrmDocumentDeal", "DEAL_1001"]`.
pub fn deal_id_from_document(tokens: &[String]) -> Result<i64, AppError> {
    let token = tokens
        .get(2)
        .ok_or_else(|| AppError::BadRequest("document_id[2] ausente".into()))?;

    token
        .strip_prefix("DEAL_")
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| AppError::BadRequest(format!("document_id[2] inválido: '{token}'")))
}

// --- API REST (nós -> CRM) ---

// Envelope padrão das respostas do Bitrix.
#[derive(Debug, Deserialize)]
pub struct BitrixResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// `result` de crm.deal.add / crm.timeline.comment.add: o ID criado.
// O Bitrix às vezes devolve número, às vezes string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreatedId {
    Number(i64),
    Text(String),
}

impl CreatedId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CreatedId::Number(n) => Some(*n),
            CreatedId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrmId {
    pub id: i64,
}

/// Deal visto pelo CRM. Todos os valores chegam como string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadView {
    pub id: String,
    pub status: String,
    pub category_id: String,
    pub internet_payment: String,
    pub cleaning_payment: String,
    pub shipping_payment: String,
}

/// Códigos dos campos de usuário (UF_CRM_*) que guardam as recompensas.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardFieldCodes {
    pub internet: String,
    pub cleaning: String,
    pub shipping: String,
}

impl LeadView {
    pub fn from_deal(deal: &Map<String, Value>, fields: &RewardFieldCodes) -> Self {
        let text = |key: &str| deal.get(key).map(scalar_to_string).unwrap_or_default();
        Self {
            id: text("ID"),
            status: text("STAGE_ID"),
            category_id: text("CATEGORY_ID"),
            internet_payment: text(fields.internet.as_str()),
            cleaning_payment: text(fields.cleaning.as_str()),
            shipping_payment: text(fields.shipping.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentView {
    pub entity_id: String,
    pub comment: String,
}

impl CommentView {
    pub fn from_result(result: &Map<String, Value>) -> Self {
        let text = |key: &str| result.get(key).map(scalar_to_string).unwrap_or_default();
        Self {
            entity_id: text("ENTITY_ID"),
            comment: text("COMMENT"),
        }
    }
}

// null -> "", número -> "150.5", string -> ela mesma.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

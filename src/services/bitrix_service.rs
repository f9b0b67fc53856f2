// src/services/bitrix_service.rs
//
// Cliente da API REST do Bitrix24 (webhook de entrada).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{
    auth::User,
    bitrix::{BitrixResponse, CommentView, CreatedId, CrmId, LeadView, RewardFieldCodes},
    lead::CreateLeadPayload,
};

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("falha de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Bitrix respondeu {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Bitrix retornou erro {error}: {description}")]
    Api { error: String, description: String },

    #[error("resposta inesperada do Bitrix: {0}")]
    Decode(String),
}

// Fronteira com o CRM. Uma chamada, uma tentativa: não há retry aqui.
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn send_deal(&self, draft: &CreateLeadPayload, user: &User) -> Result<CrmId, CrmError>;
    async fn get_lead(&self, id: i64) -> Result<LeadView, CrmError>;
    async fn send_comment(&self, lead_id: i64, text: &str) -> Result<CrmId, CrmError>;
    async fn get_comment(&self, id: i64) -> Result<CommentView, CrmError>;
}

#[derive(Clone)]
pub struct BitrixClient {
    client: reqwest::Client,
    base_url: String,
    funnel_id: String,
    reward_fields: RewardFieldCodes,
}

impl BitrixClient {
    pub fn new(
        base_url: &str,
        funnel_id: &str,
        reward_fields: RewardFieldCodes,
        timeout: Duration,
    ) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, funnel_id, reward_fields))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        funnel_id: &str,
        reward_fields: RewardFieldCodes,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            funnel_id: funnel_id.to_string(),
            reward_fields,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}.json", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, CrmError> {
        tracing::debug!(method, "Chamando Bitrix");

        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        parse_response(status.as_u16(), &text)
    }

    async fn call_for_id(&self, method: &str, body: Value) -> Result<CrmId, CrmError> {
        let created: CreatedId = self.call(method, body).await?;
        created
            .as_i64()
            .map(|id| CrmId { id })
            .ok_or_else(|| CrmError::Decode(format!("{method}: ID não numérico")))
    }
}

/// Interpreta a resposta do Bitrix. Erros vêm como `{error, error_description}`,
/// muitas vezes com status 400.
pub(crate) fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, CrmError> {
    let parsed: Result<BitrixResponse<T>, _> = serde_json::from_str(body);

    match parsed {
        Ok(BitrixResponse {
            error: Some(error),
            error_description,
            ..
        }) => Err(CrmError::Api {
            error,
            description: error_description.unwrap_or_default(),
        }),
        Ok(_) if !(200..300).contains(&status) => Err(CrmError::Status {
            status,
            body: body.to_string(),
        }),
        Ok(BitrixResponse { result: Some(result), .. }) => Ok(result),
        Ok(_) => Err(CrmError::Decode("campo 'result' ausente".into())),
        Err(_) if !(200..300).contains(&status) => Err(CrmError::Status {
            status,
            body: body.to_string(),
        }),
        Err(e) => Err(CrmError::Decode(e.to_string())),
    }
}

/// Campos do deal criado a partir da lead do agente.
pub(crate) fn deal_fields(draft: &CreateLeadPayload, user: &User, funnel_id: &str) -> Value {
    let mut services = Vec::new();
    if draft.is_internet {
        services.push("Интернет");
    }
    if draft.is_cleaning {
        services.push("Клининг");
    }
    if draft.is_shipping {
        services.push("Грузоперевозки");
    }

    let comments = format!(
        "Клиент: {}\nТелефон: {}\nАдрес: {}\nУслуги: {}\n\nАгент: {} (ID {})\nТелефон агента: {}\nE-mail: {}\nГород: {}\nTelegram: {}",
        draft.name,
        draft.phone_number,
        draft.address,
        services.join(", "),
        user.name,
        user.id,
        user.phone_number,
        user.email,
        user.city,
        user.telegram,
    );

    json!({
        "fields": {
            "TITLE": format!("Заявка: {}", draft.name),
            "CATEGORY_ID": funnel_id,
            "STAGE_ID": format!("C{funnel_id}:NEW"),
            "OPENED": "Y",
            "COMMENTS": comments,
        },
        "params": { "REGISTER_SONET_EVENT": "Y" }
    })
}

#[async_trait]
impl CrmClient for BitrixClient {
    async fn send_deal(&self, draft: &CreateLeadPayload, user: &User) -> Result<CrmId, CrmError> {
        let body = deal_fields(draft, user, &self.funnel_id);
        self.call_for_id("crm.deal.add", body).await
    }

    async fn get_lead(&self, id: i64) -> Result<LeadView, CrmError> {
        let deal: Map<String, Value> = self.call("crm.deal.get", json!({ "id": id })).await?;
        Ok(LeadView::from_deal(&deal, &self.reward_fields))
    }

    async fn send_comment(&self, lead_id: i64, text: &str) -> Result<CrmId, CrmError> {
        let body = json!({
            "fields": {
                "ENTITY_ID": lead_id,
                "ENTITY_TYPE": "deal",
                "COMMENT": text,
            }
        });
        self.call_for_id("crm.timeline.comment.add", body).await
    }

    async fn get_comment(&self, id: i64) -> Result<CommentView, CrmError> {
        let comment: Map<String, Value> = self
            .call("crm.timeline.comment.get", json!({ "id": id }))
            .await?;
        Ok(CommentView::from_result(&comment))
    }
}

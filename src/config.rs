// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        CommentRepository, CommentStore, LeadRepository, LeadStore, ReferralRepository, ReferralStore,
        UserRepository, UserStore,
    },
    models::bitrix::RewardFieldCodes,
    services::{
        auth::AuthService,
        bitrix_service::{BitrixClient, CrmClient},
        comment_service::CommentService,
        lead_service::LeadService,
    },
};

// Opções do Bitrix: URL do webhook de entrada, funil e segredos dos webhooks de saída.
#[derive(Debug, Clone)]
pub struct BitrixConfig {
    pub incoming_webhook_url: String,
    pub funnel_id: String,
    pub outgoing_webhook_auth: String,
    pub auth_token_comment: String,
    pub timeout: Duration,
    pub reward_fields: RewardFieldCodes,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: SocketAddr,
    pub request_timeout: Duration,
    pub db_max_connections: u32,
    pub manager_user_id: i64,
    pub bitrix: BitrixConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: parsed("SERVER_ADDR", "0.0.0.0:3000")?,
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", "30")?),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "5")?,
            manager_user_id: parsed("MANAGER_USER_ID", "228")?,
            bitrix: BitrixConfig {
                incoming_webhook_url: required("BITRIX_INCOMING_WEBHOOK_URL")?,
                funnel_id: required("BITRIX_FUNNEL_ID")?,
                outgoing_webhook_auth: required("BITRIX_OUTGOING_WEBHOOK_AUTH")?,
                auth_token_comment: required("BITRIX_AUTH_TOKEN_COMMENT")?,
                timeout: Duration::from_secs(parsed("BITRIX_TIMEOUT_SECS", "10")?),
                reward_fields: RewardFieldCodes {
                    internet: optional("BITRIX_FIELD_INTERNET_PAYMENT", "UF_CRM_INTERNET_PAYMENT"),
                    cleaning: optional("BITRIX_FIELD_CLEANING_PAYMENT", "UF_CRM_CLEANING_PAYMENT"),
                    shipping: optional("BITRIX_FIELD_SHIPPING_PAYMENT", "UF_CRM_SHIPPING_PAYMENT"),
                },
            },
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} deve ser definida"))
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = optional(key, default);
    raw.parse::<T>()
        .with_context(|| format!("{key} inválida: '{raw}'"))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub comment_service: CommentService,
}

impl AppState {
    // Conecta ao banco e monta o gráfico de dependências.
    pub async fn new(config: Config) -> anyhow::Result<(Self, PgPool)> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let crm = BitrixClient::new(
            &config.bitrix.incoming_webhook_url,
            &config.bitrix.funnel_id,
            config.bitrix.reward_fields.clone(),
            config.bitrix.timeout,
        )
        .context("Falha ao criar o cliente do Bitrix")?;

        let state = Self::from_parts(
            config,
            Arc::new(crm),
            Arc::new(LeadRepository::new(db_pool.clone())),
            Arc::new(CommentRepository::new(db_pool.clone())),
            Arc::new(UserRepository::new(db_pool.clone())),
            Arc::new(ReferralRepository::new(db_pool.clone())),
        );

        Ok((state, db_pool))
    }

    /// Monta o estado a partir de implementações quaisquer das portas
    /// (repositórios do Postgres em produção, dublês nos testes).
    pub fn from_parts(
        config: Config,
        crm: Arc<dyn CrmClient>,
        leads: Arc<dyn LeadStore>,
        comments: Arc<dyn CommentStore>,
        users: Arc<dyn UserStore>,
        referrals: Arc<dyn ReferralStore>,
    ) -> Self {
        let comment_service = CommentService::new(
            crm.clone(),
            leads.clone(),
            comments,
            config.bitrix.funnel_id.clone(),
            config.manager_user_id,
        );
        let lead_service = LeadService::new(crm, leads, users.clone(), referrals, comment_service.clone());
        let auth_service = AuthService::new(users, config.jwt_secret.clone());

        Self {
            config: Arc::new(config),
            auth_service,
            lead_service,
            comment_service,
        }
    }
}

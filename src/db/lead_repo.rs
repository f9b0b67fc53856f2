// src/db/lead_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::lead::{Lead, LeadFilter, LeadPatch, NewLead},
};

const LEAD_COLUMNS: &str = "id, user_id, fio, address, phone_number, status_id, internet, cleaning, shipping, \
     reward_internet, reward_cleaning, reward_shipping, created_at, completed_at, payment_at";

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// `AppError::NotFound("lead")` quando não existe.
    async fn by_id(&self, id: i64) -> Result<Lead, AppError>;

    /// Insere com o ID já atribuído pelo CRM.
    async fn create(&self, lead: &NewLead) -> Result<Lead, AppError>;

    /// `AppError::EmptyResult("leads")` quando o filtro não encontra nada.
    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError>;

    /// Grava só os campos presentes no patch. Retorna as linhas afetadas;
    /// patch vazio é no-op (0).
    async fn update(&self, id: i64, patch: &LeadPatch) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Busca vazia ou só com espaços não filtra.
fn search_pattern(filter: &LeadFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"))
}

#[async_trait]
impl LeadStore for LeadRepository {
    async fn by_id(&self, id: i64) -> Result<Lead, AppError> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("lead"))
    }

    async fn create(&self, lead: &NewLead) -> Result<Lead, AppError> {
        let sql = format!(
            r#"
            INSERT INTO leads (
                id, user_id, fio, address, phone_number, status_id,
                internet, cleaning, shipping,
                reward_internet, reward_cleaning, reward_shipping
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {LEAD_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Lead>(&sql)
            .bind(lead.id)
            .bind(lead.user_id)
            .bind(&lead.fio)
            .bind(&lead.address)
            .bind(&lead.phone_number)
            .bind(lead.status_id)
            .bind(lead.internet)
            .bind(lead.cleaning)
            .bind(lead.shipping)
            .bind(lead.reward_internet)
            .bind(lead.reward_cleaning)
            .bind(lead.reward_shipping)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        tracing::warn!(lead_id = lead.id, "Lead já existe localmente");
                    }
                }
                e.into()
            })
    }

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        // Com status no filtro, as linhas daquele status vêm primeiro. LIMIT NULL = sem limite.
        let sql = format!(
            r#"
            SELECT {LEAD_COLUMNS} FROM leads
            WHERE ($1::SMALLINT IS NULL OR status_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)
              AND ($4::BIGINT IS NULL OR user_id = $4)
              AND ($5::BOOL IS NULL OR internet = $5)
              AND ($6::BOOL IS NULL OR shipping = $6)
              AND ($7::BOOL IS NULL OR cleaning = $7)
              AND ($8::TEXT IS NULL OR fio ILIKE $8 OR address ILIKE $8 OR phone_number ILIKE $8)
              AND ($11::TIMESTAMPTZ IS NULL OR created_at < $11)
            ORDER BY CASE WHEN status_id = $1 THEN 0 ELSE 1 END, created_at DESC
            LIMIT NULLIF($9::BIGINT, 0) OFFSET $10
            "#
        );

        let leads = sqlx::query_as::<_, Lead>(&sql)
            .bind(filter.status_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.user_id)
            .bind(filter.is_internet)
            .bind(filter.is_shipping)
            .bind(filter.is_cleaning)
            .bind(search_pattern(filter))
            .bind(filter.limit)
            .bind(filter.offset)
            .bind(filter.created_before)
            .fetch_all(&self.pool)
            .await?;

        if leads.is_empty() {
            return Err(AppError::EmptyResult("leads"));
        }

        Ok(leads)
    }

    async fn update(&self, id: i64, patch: &LeadPatch) -> Result<u64, AppError> {
        if patch.is_empty() {
            return Ok(0);
        }

        // Campo ausente no patch mantém o valor atual; datas de ciclo de vida são gravadas uma vez só.
        let result = sqlx::query(
            r#"
            UPDATE leads SET
                status_id       = COALESCE($2, status_id),
                reward_internet = COALESCE($3, reward_internet),
                reward_cleaning = COALESCE($4, reward_cleaning),
                reward_shipping = COALESCE($5, reward_shipping),
                completed_at    = COALESCE(completed_at, $6),
                payment_at      = COALESCE(payment_at, $7)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.status_id)
        .bind(patch.reward_internet)
        .bind(patch.reward_cleaning)
        .bind(patch.reward_shipping)
        .bind(patch.completed_at)
        .bind(patch.payment_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// src/db/referral_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{common::error::AppError, models::referral::Referral};

#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Indicações ativas feitas com o código. `EmptyResult("referrals")` se nenhuma.
    async fn active_by_code(&self, referral_code: &str) -> Result<Vec<Referral>, AppError>;
}

#[derive(Clone)]
pub struct ReferralRepository {
    pool: PgPool,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralStore for ReferralRepository {
    async fn active_by_code(&self, referral_code: &str) -> Result<Vec<Referral>, AppError> {
        let referrals = sqlx::query_as::<_, Referral>(
            r#"
            SELECT id, referral_code, user_id, active, cost
            FROM referrals
            WHERE referral_code = $1 AND active
            ORDER BY id
            "#,
        )
        .bind(referral_code)
        .fetch_all(&self.pool)
        .await?;

        if referrals.is_empty() {
            return Err(AppError::EmptyResult("referrals"));
        }

        Ok(referrals)
    }
}

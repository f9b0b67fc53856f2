// src/models/referral.rs

use rust_decimal::Decimal;
use sqlx::FromRow;

// Usuário que entrou pelo código de indicação de outro agente.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Referral {
    pub id: i64,
    pub referral_code: String,
    pub user_id: i64,
    pub active: bool,
    pub cost: Decimal,
}

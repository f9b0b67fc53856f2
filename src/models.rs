pub mod auth;
pub mod bitrix;
pub mod comment;
pub mod lead;
pub mod referral;

pub mod auth;
pub mod bitrix_service;
pub mod comment_service;
pub mod lead_service;

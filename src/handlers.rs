pub mod auth;
pub mod bitrix;
pub mod comments;
pub mod leads;

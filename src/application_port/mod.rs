mod auth_config;
mod credential_service;

pub use auth_config::*;
pub use credential_service::*;

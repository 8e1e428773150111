use super::SecretKey;
use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing input, a wrong password or a malformed bearer header.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("identity not found")]
    IdentityNotFound,
    #[error("failed to create identity: {0}")]
    CreateIdentity(String),
    #[error("failed to generate token: {0}")]
    TokenGeneration(String),
    #[error("failed to persist token: {0}")]
    TokenPersist(String),
    #[error("token not found")]
    TokenNotFound,
    #[error("failed to delete token: {0}")]
    TokenDelete(String),
    #[error("failed to blacklist token: {0}")]
    TokenBlacklist(String),
    #[error("token invalid: {0}")]
    TokenInvalid(String),
    #[error("token expired")]
    TokenExpired,
    #[error("store error: {0}")]
    Store(String),
}

// Carries a raw password: no Debug.
#[derive(Clone)]
pub struct SignUpInput {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct LogInInput {
    pub phone: String,
    pub password: String,
}

#[derive(Clone)]
pub struct RevokeInput {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialService: Send + Sync {
    async fn sign_up(&self, request: SignUpInput) -> Result<Tokens, AuthError>;
    async fn log_in(&self, request: LogInInput) -> Result<Tokens, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError>;
    async fn revoke_tokens(&self, request: RevokeInput) -> Result<(), AuthError>;
    /// Expects `"Bearer <token>"`.
    async fn log_out(&self, bearer: &str) -> Result<(), AuthError>;
    /// Signature, expiry and claim shape only. Does not consult the blacklist.
    fn validate_token(&self, token: &str, secret: &SecretKey) -> Result<IdentityId, AuthError>;
    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError>;
}

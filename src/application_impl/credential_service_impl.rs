use super::access_token::verify_access_token;
use super::session_manager::SessionManager;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

const BEARER_SCHEME: &str = "Bearer";

pub struct RealCredentialService {
    identity_repo: Arc<dyn IdentityRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    sessions: SessionManager,
    config: AuthConfig,
}

impl RealCredentialService {
    pub fn new(
        identity_repo: Arc<dyn IdentityRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_cache: Arc<dyn TokenCache>,
        config: AuthConfig,
    ) -> Self {
        Self {
            identity_repo,
            credential_hasher,
            sessions: SessionManager::new(token_cache, &config),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn require(field: &str, value: &str) -> Result<(), AuthError> {
        if value.is_empty() {
            return Err(AuthError::Validation(format!("{} is required", field)));
        }
        Ok(())
    }

    async fn find_identity(&self, phone: &str) -> Result<Identity, AuthError> {
        self.identity_repo
            .find_by_phone(phone)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::IdentityNotFound)
    }

    /// Phone + password check shared by login and revoke.
    async fn authenticate(&self, phone: &str, password: &str) -> Result<Identity, AuthError> {
        Self::require("phone", phone)?;
        Self::require("password", password)?;

        let identity = self.find_identity(phone).await?;

        let ok = self
            .credential_hasher
            .verify_password(password, &identity.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::Validation("wrong password".to_string()));
        }
        Ok(identity)
    }

    /// Splits `"Bearer <token>"`. Anything else is a validation error.
    fn bearer_token(bearer: &str) -> Result<&str, AuthError> {
        let parts: Vec<&str> = bearer.split_whitespace().collect();
        match parts.as_slice() {
            [scheme, token] if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => Ok(*token),
            _ => Err(AuthError::Validation(
                "expected `Bearer <token>`".to_string(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl CredentialService for RealCredentialService {
    async fn sign_up(&self, request: SignUpInput) -> Result<Tokens, AuthError> {
        let SignUpInput {
            name,
            phone,
            email,
            password,
        } = request;

        Self::require("name", &name)?;
        Self::require("phone", &phone)?;
        Self::require("email", &email)?;
        Self::require("password", &password)?;

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        self.identity_repo
            .create_identity(&NewIdentity {
                name,
                phone: phone.clone(),
                email,
                password_hash,
            })
            .await
            .map_err(|e| AuthError::CreateIdentity(e.to_string()))?;

        // Separate read to learn the store-assigned id. A failure from here on
        // leaves an identity without a session, which the next login repairs.
        let identity = self.find_identity(&phone).await?;
        info!(identity_id = %identity.id, "identity created");

        self.sessions
            .issue_session(&identity.id, &self.config.secret_key, self.config.access_ttl)
            .await
    }

    async fn log_in(&self, request: LogInInput) -> Result<Tokens, AuthError> {
        let identity = self.authenticate(&request.phone, &request.password).await?;

        let tokens = self
            .sessions
            .claim_session(&identity.id, &self.config.secret_key, self.config.access_ttl)
            .await?;
        info!(identity_id = %identity.id, "logged in");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        Self::require("refresh token", refresh_token)?;

        let identity_id = self
            .sessions
            .resolve_identity_by_refresh_token(refresh_token)
            .await?;

        let tokens = self
            .sessions
            .issue_session(&identity_id, &self.config.secret_key, self.config.access_ttl)
            .await?;
        info!(%identity_id, "session refreshed");
        Ok(tokens)
    }

    async fn revoke_tokens(&self, request: RevokeInput) -> Result<(), AuthError> {
        let RevokeInput {
            name,
            phone,
            email,
            password,
        } = request;

        Self::require("name", &name)?;
        Self::require("email", &email)?;
        let identity = self.authenticate(&phone, &password).await?;
        if identity.name != name || identity.email != email {
            return Err(AuthError::Validation("credentials do not match".to_string()));
        }

        self.sessions.delete_session(&identity.id).await?;
        info!(identity_id = %identity.id, "tokens revoked");
        Ok(())
    }

    async fn log_out(&self, bearer: &str) -> Result<(), AuthError> {
        let token = Self::bearer_token(bearer)?;
        let identity_id = verify_access_token(token, &self.config.secret_key)
            .map_err(|e| AuthError::Validation(format!("invalid token: {}", e)))?;

        // A revoked token must not end the session a later login created.
        if self.sessions.is_blacklisted(token).await? {
            debug!(%identity_id, "token already logged out");
            return Ok(());
        }

        // Both steps run; the first failure is reported.
        let deleted = self.sessions.delete_session(&identity_id).await;
        let blacklisted = self.sessions.blacklist(token).await;
        deleted?;
        blacklisted?;

        info!(%identity_id, "logged out");
        Ok(())
    }

    fn validate_token(&self, token: &str, secret: &SecretKey) -> Result<IdentityId, AuthError> {
        verify_access_token(token, secret)
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError> {
        Self::require("token", token)?;
        self.sessions.is_blacklisted(token).await
    }
}

//! Session lifecycle: minting token pairs, storing refresh tokens, reuse on
//! login, rotation on refresh, deletion and the access-token blacklist.
//!
//! Cache layout:
//!
//! - `session:<identity_id>` → refresh token (forward key, one per identity)
//! - `refreshtoken:<token>` → identity id (reverse key, replaces a key scan)
//! - `blacklisted:<raw access token>` → marker
//!
//! The forward key is authoritative. A reverse key only resolves while the
//! forward key still points back at the same token, so a reverse key left
//! behind by a failed cleanup or a lost write race never resolves.

use super::access_token::mint_access_token;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use std::sync::Arc;
use std::time::Duration;

pub const SESSION_PREFIX: &str = "session";
pub const REFRESH_TOKEN_PREFIX: &str = "refreshtoken";
pub const BLACKLIST_PREFIX: &str = "blacklisted";

const REFRESH_TOKEN_BYTES: usize = 32;
const BLACKLIST_MARKER: &str = "1";
const CLAIM_ATTEMPTS: usize = 3;

pub struct SessionManager {
    cache: Arc<dyn TokenCache>,
    refresh_ttl: Duration,
    blacklist_ttl: Duration,
}

impl SessionManager {
    pub fn new(cache: Arc<dyn TokenCache>, config: &AuthConfig) -> Self {
        SessionManager {
            cache,
            refresh_ttl: config.refresh_ttl,
            blacklist_ttl: config.blacklist_ttl,
        }
    }

    fn session_key(identity_id: &IdentityId) -> String {
        format!("{}:{}", SESSION_PREFIX, identity_id)
    }

    fn refresh_key(token: &str) -> String {
        format!("{}:{}", REFRESH_TOKEN_PREFIX, token)
    }

    fn blacklist_key(raw_token: &str) -> String {
        format!("{}:{}", BLACKLIST_PREFIX, raw_token)
    }

    /// 256 bits from the OS CSPRNG, hex encoded.
    fn new_refresh_token() -> RefreshToken {
        let mut buf = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut buf);
        RefreshToken(hex::encode(buf))
    }

    /// Mint a fresh pair and make its refresh token the identity's only one.
    /// The refresh token is stored before the pair is returned.
    pub async fn issue_session(
        &self,
        identity_id: &IdentityId,
        secret: &SecretKey,
        lifetime: Duration,
    ) -> Result<Tokens, AuthError> {
        let (access_token, _) = mint_access_token(identity_id, secret, lifetime)?;
        let refresh_token = Self::new_refresh_token();

        let previous = self
            .cache
            .get(&Self::session_key(identity_id))
            .await
            .map_err(|e| AuthError::TokenPersist(e.to_string()))?;

        self.store_refresh_token(identity_id, &refresh_token).await?;

        if let Some(previous) = previous {
            if previous != refresh_token.0 {
                // Already unresolvable through the forward-key check; this only
                // frees the key early.
                if let Err(e) = self.cache.delete(&Self::refresh_key(&previous)).await {
                    warn!(%identity_id, "dropping rotated refresh token: {}", e);
                }
            }
        }

        debug!(%identity_id, "session issued");
        Ok(Tokens {
            access_token,
            refresh_token,
        })
    }

    /// Login path: reuse the identity's live refresh token, or install a new
    /// one only if none exists. When two callers race, both end up with the
    /// token that won the conditional write.
    pub async fn claim_session(
        &self,
        identity_id: &IdentityId,
        secret: &SecretKey,
        lifetime: Duration,
    ) -> Result<Tokens, AuthError> {
        let (access_token, _) = mint_access_token(identity_id, secret, lifetime)?;

        let refresh_token = match self.find_live_refresh_token(identity_id).await? {
            Some(existing) => {
                debug!(%identity_id, "reusing live refresh token");
                existing
            }
            None => self.install_refresh_token(identity_id).await?,
        };

        Ok(Tokens {
            access_token,
            refresh_token,
        })
    }

    async fn install_refresh_token(
        &self,
        identity_id: &IdentityId,
    ) -> Result<RefreshToken, AuthError> {
        let candidate = Self::new_refresh_token();
        let reverse_key = Self::refresh_key(candidate.as_str());

        self.cache
            .set(&reverse_key, identity_id.as_str(), self.refresh_ttl)
            .await
            .map_err(|e| AuthError::TokenPersist(e.to_string()))?;
        let session_key = Self::session_key(identity_id);

        for _ in 0..CLAIM_ATTEMPTS {
            let installed = self
                .cache
                .set_if_absent(&session_key, candidate.as_str(), self.refresh_ttl)
                .await
                .map_err(|e| AuthError::TokenPersist(e.to_string()))?;
            if installed {
                debug!(%identity_id, "session issued");
                return Ok(candidate);
            }

            // Lost the conditional write. A winner that was deleted again
            // before this read (logout or revoke) sends us back to the write.
            if let Some(winner) = self.find_live_refresh_token(identity_id).await? {
                if let Err(e) = self.cache.delete(&reverse_key).await {
                    warn!(%identity_id, "dropping losing refresh token: {}", e);
                }
                debug!(%identity_id, "concurrent login won, reusing its refresh token");
                return Ok(winner);
            }
        }

        if let Err(e) = self.cache.delete(&reverse_key).await {
            warn!(%identity_id, "dropping unclaimed refresh token: {}", e);
        }
        Err(AuthError::TokenPersist(format!(
            "session key contended after {} attempts",
            CLAIM_ATTEMPTS
        )))
    }

    async fn store_refresh_token(
        &self,
        identity_id: &IdentityId,
        token: &RefreshToken,
    ) -> Result<(), AuthError> {
        self.cache
            .set(
                &Self::refresh_key(token.as_str()),
                identity_id.as_str(),
                self.refresh_ttl,
            )
            .await
            .map_err(|e| AuthError::TokenPersist(e.to_string()))?;
        self.cache
            .set(
                &Self::session_key(identity_id),
                token.as_str(),
                self.refresh_ttl,
            )
            .await
            .map_err(|e| AuthError::TokenPersist(e.to_string()))?;
        Ok(())
    }

    /// `None` when the identity has no session or it expired.
    pub async fn find_live_refresh_token(
        &self,
        identity_id: &IdentityId,
    ) -> Result<Option<RefreshToken>, AuthError> {
        let token = self
            .cache
            .get(&Self::session_key(identity_id))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(token.map(RefreshToken))
    }

    pub async fn resolve_identity_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<IdentityId, AuthError> {
        let identity_id = self
            .cache
            .get(&Self::refresh_key(token))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .map(IdentityId)
            .ok_or(AuthError::TokenNotFound)?;

        match self.find_live_refresh_token(&identity_id).await? {
            Some(current) if current.as_str() == token => Ok(identity_id),
            _ => Err(AuthError::TokenNotFound),
        }
    }

    /// Idempotent.
    pub async fn delete_session(&self, identity_id: &IdentityId) -> Result<(), AuthError> {
        let session_key = Self::session_key(identity_id);
        let current = self
            .cache
            .get(&session_key)
            .await
            .map_err(|e| AuthError::TokenDelete(e.to_string()))?;

        self.cache
            .delete(&session_key)
            .await
            .map_err(|e| AuthError::TokenDelete(e.to_string()))?;
        if let Some(token) = current {
            self.cache
                .delete(&Self::refresh_key(&token))
                .await
                .map_err(|e| AuthError::TokenDelete(e.to_string()))?;
        }

        debug!(%identity_id, "session deleted");
        Ok(())
    }

    pub async fn blacklist(&self, raw_token: &str) -> Result<(), AuthError> {
        self.cache
            .set(
                &Self::blacklist_key(raw_token),
                BLACKLIST_MARKER,
                self.blacklist_ttl,
            )
            .await
            .map_err(|e| AuthError::TokenBlacklist(e.to_string()))
    }

    pub async fn is_blacklisted(&self, raw_token: &str) -> Result<bool, AuthError> {
        self.cache
            .exists(&Self::blacklist_key(raw_token))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::verify_access_token;
    use crate::infra_memory::MemoryTokenCache;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const ACCESS_TTL: Duration = Duration::from_secs(300);

    fn config() -> AuthConfig {
        AuthConfig::new(SecretKey::new("test_secret_key"))
            .refresh_ttl(Duration::from_secs(3600))
            .blacklist_ttl(Duration::from_secs(600))
    }

    fn manager() -> (Arc<MemoryTokenCache>, SessionManager) {
        let cache = Arc::new(MemoryTokenCache::new());
        let sessions = SessionManager::new(cache.clone(), &config());
        (cache, sessions)
    }

    fn id(s: &str) -> IdentityId {
        IdentityId(s.to_string())
    }

    #[tokio::test]
    async fn test_issue_session_round_trip() {
        let (cache, sessions) = manager();
        let secret = config().secret_key;

        let tokens = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        assert_eq!(verify_access_token(tokens.access_token.as_str(), &secret).unwrap(), id("7"));
        assert_eq!(tokens.refresh_token.as_str().len(), 64);
        assert_eq!(
            sessions.find_live_refresh_token(&id("7")).await.unwrap(),
            Some(tokens.refresh_token.clone())
        );
        assert_eq!(
            sessions
                .resolve_identity_by_refresh_token(tokens.refresh_token.as_str())
                .await
                .unwrap(),
            id("7")
        );
        assert_eq!(cache.live_keys("session:").len(), 1);
        assert_eq!(cache.live_keys("refreshtoken:").len(), 1);
    }

    #[tokio::test]
    async fn test_issue_session_rotates() {
        let (cache, sessions) = manager();
        let secret = config().secret_key;

        let first = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();
        let second = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(matches!(
            sessions
                .resolve_identity_by_refresh_token(first.refresh_token.as_str())
                .await,
            Err(AuthError::TokenNotFound)
        ));
        assert_eq!(
            sessions
                .resolve_identity_by_refresh_token(second.refresh_token.as_str())
                .await
                .unwrap(),
            id("7")
        );
        assert_eq!(cache.live_keys("refreshtoken:").len(), 1);
    }

    #[tokio::test]
    async fn test_claim_session_reuses_live_token() {
        let (_cache, sessions) = manager();
        let secret = config().secret_key;

        let first = sessions.claim_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();
        let second = sessions.claim_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        assert_eq!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn test_concurrent_claims_converge() {
        let (cache, sessions) = manager();
        let secret = config().secret_key;

        let (id_a, id_b) = (id("7"), id("7"));
        let (a, b) = tokio::join!(
            sessions.claim_session(&id_a, &secret, ACCESS_TTL),
            sessions.claim_session(&id_b, &secret, ACCESS_TTL),
        );

        assert_eq!(a.unwrap().refresh_token, b.unwrap().refresh_token);
        assert_eq!(cache.live_keys("refreshtoken:").len(), 1);
    }

    /// Hides the session key from the first read, as if another login wrote it
    /// right after this caller looked.
    struct StaleFirstRead {
        inner: MemoryTokenCache,
        hidden_once: AtomicBool,
    }

    #[async_trait::async_trait]
    impl TokenCache for StaleFirstRead {
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }
        async fn set_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, CacheError> {
            self.inner.set_if_absent(key, value, ttl).await
        }
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            if key.starts_with("session:") && !self.hidden_once.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.inner.exists(key).await
        }
    }

    #[tokio::test]
    async fn test_claim_session_losing_race_returns_winner() {
        let cache = Arc::new(StaleFirstRead {
            inner: MemoryTokenCache::new(),
            hidden_once: AtomicBool::new(true),
        });
        let sessions = SessionManager::new(cache.clone(), &config());
        let secret = config().secret_key;

        let winner = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();
        cache.hidden_once.store(false, Ordering::SeqCst);

        let loser = sessions.claim_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        assert_eq!(loser.refresh_token, winner.refresh_token);
        assert_eq!(cache.inner.live_keys("refreshtoken:").len(), 1);
    }

    /// Rejects the first conditional write while the session key is still
    /// empty, then lets another login install "third" just before the retry.
    struct VanishingWinner {
        inner: MemoryTokenCache,
        conditional_writes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenCache for VanishingWinner {
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }
        async fn set_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, CacheError> {
            match self.conditional_writes.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(false),
                1 => {
                    self.inner.set(key, "third", ttl).await?;
                    self.inner.set_if_absent(key, value, ttl).await
                }
                _ => self.inner.set_if_absent(key, value, ttl).await,
            }
        }
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.inner.exists(key).await
        }
    }

    #[tokio::test]
    async fn test_claim_session_never_overwrites_a_later_winner() {
        let cache = Arc::new(VanishingWinner {
            inner: MemoryTokenCache::new(),
            conditional_writes: AtomicUsize::new(0),
        });
        let sessions = SessionManager::new(cache.clone(), &config());
        let secret = config().secret_key;

        let tokens = sessions.claim_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        assert_eq!(tokens.refresh_token.as_str(), "third");
        assert_eq!(
            cache.inner.get("session:7").await.unwrap().as_deref(),
            Some("third")
        );
        assert!(cache.inner.live_keys("refreshtoken:").is_empty());
    }

    #[tokio::test]
    async fn test_find_live_refresh_token_absent() {
        let (_cache, sessions) = manager();
        assert_eq!(sessions.find_live_refresh_token(&id("7")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_token_expires() {
        let (_cache, sessions) = manager();
        let secret = config().secret_key;
        let tokens = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;

        assert_eq!(sessions.find_live_refresh_token(&id("7")).await.unwrap(), None);
        assert!(matches!(
            sessions
                .resolve_identity_by_refresh_token(tokens.refresh_token.as_str())
                .await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_token() {
        let (_cache, sessions) = manager();
        assert!(matches!(
            sessions.resolve_identity_by_refresh_token("deadbeef").await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_session_is_idempotent() {
        let (cache, sessions) = manager();
        let secret = config().secret_key;
        let tokens = sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await.unwrap();

        sessions.delete_session(&id("7")).await.unwrap();
        sessions.delete_session(&id("7")).await.unwrap();

        assert_eq!(sessions.find_live_refresh_token(&id("7")).await.unwrap(), None);
        assert!(
            sessions
                .resolve_identity_by_refresh_token(tokens.refresh_token.as_str())
                .await
                .is_err()
        );
        assert!(cache.live_keys("").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blacklist_until_expiry() {
        let (_cache, sessions) = manager();

        assert!(!sessions.is_blacklisted("raw.jwt.value").await.unwrap());
        sessions.blacklist("raw.jwt.value").await.unwrap();
        assert!(sessions.is_blacklisted("raw.jwt.value").await.unwrap());
        assert!(!sessions.is_blacklisted("other.jwt.value").await.unwrap());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!sessions.is_blacklisted("raw.jwt.value").await.unwrap());
    }

    struct DownCache;

    #[async_trait::async_trait]
    impl TokenCache for DownCache {
        async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Store("connection refused".to_string()))
        }
        async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> Result<bool, CacheError> {
            Err(CacheError::Store("connection refused".to_string()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Store("connection refused".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Store("connection refused".to_string()))
        }
        async fn exists(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Store("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cache_failures_map_to_error_kinds() {
        let sessions = SessionManager::new(Arc::new(DownCache), &config());
        let secret = config().secret_key;

        assert!(matches!(
            sessions.issue_session(&id("7"), &secret, ACCESS_TTL).await,
            Err(AuthError::TokenPersist(_))
        ));
        assert!(matches!(
            sessions.delete_session(&id("7")).await,
            Err(AuthError::TokenDelete(_))
        ));
        assert!(matches!(
            sessions.blacklist("raw").await,
            Err(AuthError::TokenBlacklist(_))
        ));
        assert!(matches!(
            sessions.is_blacklisted("raw").await,
            Err(AuthError::Store(_))
        ));
    }
}

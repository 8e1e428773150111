use std::fmt;
use std::time::Duration;

/// Default access token lifetime (5 minutes)
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(5 * 60);

/// Default refresh token lifetime (30 days)
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default lifetime of a blacklist marker (1 hour)
pub const DEFAULT_BLACKLIST_TTL: Duration = Duration::from_secs(60 * 60);

/// Symmetric HS256 signing key for access tokens.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        SecretKey(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("secret key must not be empty")]
    EmptySecret,
    #[error("{0} must be positive")]
    ZeroTtl(&'static str),
    #[error("blacklist ttl ({blacklist:?}) must outlive access tokens ({access:?})")]
    BlacklistTooShort { blacklist: Duration, access: Duration },
}

/// Immutable process-wide auth settings, handed to each component at
/// construction.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: SecretKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub blacklist_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret_key: SecretKey) -> Self {
        Self {
            secret_key,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            blacklist_ttl: DEFAULT_BLACKLIST_TTL,
        }
    }

    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn blacklist_ttl(mut self, ttl: Duration) -> Self {
        self.blacklist_ttl = ttl;
        self
    }

    /// A blacklisted token must stay poisoned for as long as it could still
    /// pass signature and expiry checks.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        if self.secret_key.is_empty() {
            return Err(AuthConfigError::EmptySecret);
        }
        if self.access_ttl.is_zero() {
            return Err(AuthConfigError::ZeroTtl("access ttl"));
        }
        if self.refresh_ttl.is_zero() {
            return Err(AuthConfigError::ZeroTtl("refresh ttl"));
        }
        if self.blacklist_ttl < self.access_ttl {
            return Err(AuthConfigError::BlacklistTooShort {
                blacklist: self.blacklist_ttl,
                access: self.access_ttl,
            });
        }
        Ok(())
    }
}

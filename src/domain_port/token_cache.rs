use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Store(String),
}

/// Key-value cache with per-key expiry. Single-key operations are atomic;
/// nothing stronger is assumed.
#[async_trait::async_trait]
pub trait TokenCache: Send + Sync {
    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Write `value` only if `key` holds no live value. Returns whether the
    /// write happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, CacheError>;

    /// Read a live value. Absent or expired keys are `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}

use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum IdentityStoreError {
    #[error("phone already registered")]
    DuplicatePhone,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait IdentityRepo: Send + Sync {
    /// Insert a row. The store assigns the id; read it back with `find_by_phone`.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<(), IdentityStoreError>;

    /// Fetch an identity by its login key.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, IdentityStoreError>;
}

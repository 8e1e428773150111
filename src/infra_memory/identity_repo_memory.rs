use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Identities keyed by phone. Ids are random v4 UUIDs, mirroring the MySQL
/// column default.
#[derive(Default)]
pub struct MemoryIdentityRepo {
    by_phone: DashMap<String, Identity>,
}

impl MemoryIdentityRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdentityRepo for MemoryIdentityRepo {
    async fn create_identity(&self, identity: &NewIdentity) -> Result<(), IdentityStoreError> {
        match self.by_phone.entry(identity.phone.clone()) {
            Entry::Occupied(_) => Err(IdentityStoreError::DuplicatePhone),
            Entry::Vacant(v) => {
                v.insert(Identity {
                    id: IdentityId(uuid::Uuid::new_v4().to_string()),
                    name: identity.name.clone(),
                    phone: identity.phone.clone(),
                    email: identity.email.clone(),
                    password_hash: identity.password_hash.clone(),
                    rating: 0.0,
                });
                Ok(())
            }
        }
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, IdentityStoreError> {
        Ok(self.by_phone.get(phone).map(|r| r.value().clone()))
    }
}

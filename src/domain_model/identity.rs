use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of an identity. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        IdentityId(s)
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub rating: f64,
}

/// Row to insert on sign-up. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
}

use super::util::is_dup_key;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlIdentityRepo {
    pool: MySqlPool,
}

impl MySqlIdentityRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlIdentityRepo { pool }
    }

    fn row_to_identity(row: MySqlRow) -> Result<Identity, IdentityStoreError> {
        let store = |e: sqlx::Error| IdentityStoreError::Store(e.to_string());

        Ok(Identity {
            id: IdentityId(row.try_get("id").map_err(store)?),
            name: row.try_get("name").map_err(store)?,
            phone: row.try_get("phone").map_err(store)?,
            email: row.try_get("email").map_err(store)?,
            password_hash: row.try_get("password_hash").map_err(store)?,
            rating: row.try_get("rating").map_err(store)?,
        })
    }
}

#[async_trait::async_trait]
impl IdentityRepo for MySqlIdentityRepo {
    async fn create_identity(&self, identity: &NewIdentity) -> Result<(), IdentityStoreError> {
        sqlx::query(
            r#"
INSERT INTO identity (name, phone, email, password_hash)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(&identity.name)
        .bind(&identity.phone)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                IdentityStoreError::DuplicatePhone
            } else {
                IdentityStoreError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Identity>, IdentityStoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, name, phone, email, password_hash, rating
FROM identity
WHERE phone = ?
"#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityStoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_identity).transpose()
    }
}

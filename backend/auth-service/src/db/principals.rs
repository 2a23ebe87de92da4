/// Principal database operations (Postgres)
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::Credential;
use sqlx::{FromRow, PgPool};

use super::{CredentialStore, StoreError};
use crate::models::{Principal, PrincipalStatus};

#[derive(Debug, FromRow)]
struct PrincipalRow {
    identifier: String,
    password_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let credential = Credential::from_phc(&row.password_hash)
            .map_err(|e| StoreError::Corrupt(format!("password_hash: {}", e)))?;

        Ok(Principal {
            credential,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            id: row.identifier,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get(&self, identifier: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT identifier, password_hash, status, created_at, updated_at
            FROM principals
            WHERE identifier = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(Principal::try_from).transpose()
    }

    async fn put(&self, principal: Principal) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO principals (identifier, password_hash, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (identifier) DO NOTHING
            "#,
        )
        .bind(&principal.id)
        .bind(principal.credential.to_phc())
        .bind(principal.status.as_str())
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn update_lock_state(&self, identifier: &str, locked: bool) -> Result<(), StoreError> {
        let (from, to) = if locked {
            (PrincipalStatus::Active, PrincipalStatus::Locked)
        } else {
            (PrincipalStatus::Locked, PrincipalStatus::Active)
        };

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            WITH updated AS (
                UPDATE principals
                SET status = $3, updated_at = CURRENT_TIMESTAMP
                WHERE identifier = $1 AND status = $2
            )
            SELECT EXISTS(SELECT 1 FROM principals WHERE identifier = $1)
            "#,
        )
        .bind(identifier)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        if !exists {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn replace_credential(
        &self,
        identifier: &str,
        credential: Credential,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE principals
            SET password_hash = $2, updated_at = CURRENT_TIMESTAMP
            WHERE identifier = $1
            "#,
        )
        .bind(identifier)
        .bind(credential.to_phc())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn deactivate(&self, identifier: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE principals
            SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE identifier = $1
            "#,
        )
        .bind(identifier)
        .bind(PrincipalStatus::Deactivated.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

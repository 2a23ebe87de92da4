/// Credential store interface and implementations
///
/// The auth engine only talks to [`CredentialStore`]; which backend sits behind
/// it (in-memory map or Postgres) is decided at startup.
use async_trait::async_trait;
use crypto_core::Credential;
use thiserror::Error;

use crate::models::Principal;

pub mod memory;
pub mod principals;

pub use memory::MemoryCredentialStore;
pub use principals::PgCredentialStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Principal not found")]
    NotFound,

    #[error("Principal already exists")]
    Conflict,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a principal, including deactivated ones
    async fn get(&self, identifier: &str) -> Result<Option<Principal>, StoreError>;

    /// Insert a new principal; `Conflict` if the identifier is taken
    async fn put(&self, principal: Principal) -> Result<(), StoreError>;

    /// Move an active principal to locked (`true`) or a locked one back to active
    async fn update_lock_state(&self, identifier: &str, locked: bool) -> Result<(), StoreError>;

    /// Atomically swap the principal's credential for a new one
    async fn replace_credential(
        &self,
        identifier: &str,
        credential: Credential,
    ) -> Result<(), StoreError>;

    /// Soft-delete the principal
    async fn deactivate(&self, identifier: &str) -> Result<(), StoreError>;
}

/// In-memory credential store backed by a sharded concurrent map
use async_trait::async_trait;
use chrono::Utc;
use crypto_core::Credential;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{CredentialStore, StoreError};
use crate::models::{Principal, PrincipalStatus};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    principals: DashMap<String, Principal>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, identifier: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.get(identifier).map(|p| p.value().clone()))
    }

    async fn put(&self, principal: Principal) -> Result<(), StoreError> {
        match self.principals.entry(principal.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(principal);
                Ok(())
            }
        }
    }

    async fn update_lock_state(&self, identifier: &str, locked: bool) -> Result<(), StoreError> {
        let mut principal = self
            .principals
            .get_mut(identifier)
            .ok_or(StoreError::NotFound)?;

        let next = match (principal.status, locked) {
            (PrincipalStatus::Active, true) => PrincipalStatus::Locked,
            (PrincipalStatus::Locked, false) => PrincipalStatus::Active,
            (current, _) => current,
        };
        if next != principal.status {
            principal.status = next;
            principal.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_credential(
        &self,
        identifier: &str,
        credential: Credential,
    ) -> Result<(), StoreError> {
        let mut principal = self
            .principals
            .get_mut(identifier)
            .ok_or(StoreError::NotFound)?;
        principal.credential = credential;
        principal.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate(&self, identifier: &str) -> Result<(), StoreError> {
        let mut principal = self
            .principals
            .get_mut(identifier)
            .ok_or(StoreError::NotFound)?;
        principal.status = PrincipalStatus::Deactivated;
        principal.updated_at = Utc::now();
        Ok(())
    }
}

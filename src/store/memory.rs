use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, NewPrincipal, Principal};
use crate::error::StoreError;

/// Process-local credential store.
///
/// Every operation takes the single lock once, so each call is atomic with
/// respect to the others, including the compare-and-swap on the refresh slot.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let mut principals = self.principals.write().await;

        if principals.values().any(|p| p.email == principal.email) {
            return Err(StoreError::UniqueViolation(format!(
                "email {} already exists",
                principal.email
            )));
        }

        let now = Utc::now();
        let record = Principal {
            id: Uuid::new_v4(),
            name: principal.name,
            email: principal.email,
            password_hash: principal.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        principals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|p| p.refresh_token.as_deref() == Some(fingerprint))
            .cloned())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        fingerprint: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(principal) = self.principals.write().await.get_mut(&id) {
            principal.refresh_token = fingerprint.map(str::to_string);
            principal.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut principals = self.principals.write().await;
        match principals.get_mut(&id) {
            Some(principal) if principal.refresh_token.as_deref() == Some(expected) => {
                principal.refresh_token = next.map(str::to_string);
                principal.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        if let Some(principal) = self.principals.write().await.get_mut(&id) {
            principal.password_hash = password_hash.to_string();
            principal.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let mut principals = self.principals.write().await;

        if principals.values().any(|p| p.id != id && p.email == email) {
            return Err(StoreError::UniqueViolation(format!("email {} already exists", email)));
        }

        Ok(principals.get_mut(&id).map(|principal| {
            principal.name = name.to_string();
            principal.email = email.to_string();
            principal.updated_at = Utc::now();
            principal.clone()
        }))
    }

    async fn list(&self, logged_in_only: bool) -> Result<Vec<Principal>, StoreError> {
        let mut principals: Vec<Principal> = self
            .principals
            .read()
            .await
            .values()
            .filter(|p| !logged_in_only || p.refresh_token.is_some())
            .cloned()
            .collect();
        principals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(principals)
    }
}

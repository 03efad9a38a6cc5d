/// Credential store
///
/// Persistence boundary for principals. The session manager and the request
/// authenticator only ever talk to `dyn CredentialStore`; the backend is
/// picked at startup from configuration.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

/// A stored principal record.
///
/// `refresh_token` holds the fingerprint of the single live refresh token;
/// `None` means the principal is logged out.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a principal. The hash is computed before this
/// ever reaches the store.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// The view of a principal that is safe to hand to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPrincipal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Listing entry for the admin views
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub is_logged_in: bool,
}

impl Principal {
    pub fn public_view(&self) -> PublicPrincipal {
        PublicPrincipal {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            is_logged_in: self.refresh_token.is_some(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a new principal. Fails with `UniqueViolation` when the email
    /// is already taken.
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    /// Emails are expected to be normalized by the caller.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_refresh_token(&self, fingerprint: &str)
        -> Result<Option<Principal>, StoreError>;

    /// Unconditionally overwrites the refresh slot.
    async fn set_refresh_token(&self, id: Uuid, fingerprint: Option<&str>)
        -> Result<(), StoreError>;

    /// Writes `next` into the refresh slot only if it currently holds
    /// `expected`. Returns whether the swap happened.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Returns the updated principal, or `None` when it does not exist.
    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<Principal>, StoreError>;

    /// All principals, newest first. With `logged_in_only`, only those whose
    /// refresh slot is occupied.
    async fn list(&self, logged_in_only: bool) -> Result<Vec<Principal>, StoreError>;
}

/// Session Manager
///
/// Signup, login, refresh, logout and credential maintenance on top of a
/// `CredentialStore` and the `TokenCodec`.
///
/// Each principal has at most one live refresh token. Login and signup
/// overwrite the slot, refresh rotates it with a compare-and-swap against the
/// presented token, and logout clears it.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::{TokenCodec, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::fingerprint;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{CredentialStore, NewPrincipal, PrincipalSummary, PublicPrincipal};
use crate::validators::{is_valid_email, is_valid_name, present, validate_new_password};

/// Result of signup and login: a token pair and who it belongs to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: PublicPrincipal,
}

/// Passwords are not trimmed; only emptiness counts as absent.
fn required(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn missing(message: &str) -> AppError {
    AppError::Validation(ValidationError::MissingFields(message.to_string()))
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a fresh pair and overwrite the principal's refresh slot with it
    async fn open_session(&self, principal_id: Uuid) -> Result<TokenPair, AppError> {
        let tokens = self.codec.issue_pair(principal_id)?;
        self.store
            .set_refresh_token(principal_id, Some(&fingerprint(&tokens.refresh_token)))
            .await?;
        Ok(tokens)
    }

    pub async fn signup(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> Result<AuthenticatedSession, AppError> {
        let (name, email, password, confirm_password) = match (
            present(name),
            present(email),
            required(password),
            required(confirm_password),
        ) {
            (Some(n), Some(e), Some(p), Some(c)) => (n, e, p, c),
            _ => return Err(missing("All fields are required")),
        };

        validate_new_password(password, confirm_password, "Passwords do not match")?;
        let name = is_valid_name(name)?;
        let email = is_valid_email(email)?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        // A concurrent signup for the same email surfaces as a unique violation -> Conflict
        let principal = self
            .store
            .insert(NewPrincipal {
                name,
                email,
                password_hash,
            })
            .await?;

        let tokens = self.open_session(principal.id).await?;

        tracing::info!(user_id = %principal.id, "Principal signed up");

        Ok(AuthenticatedSession {
            tokens,
            user: principal.public_view(),
        })
    }

    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<AuthenticatedSession, AppError> {
        let (email, password) = match (present(email), required(password)) {
            (Some(e), Some(p)) => (e.to_lowercase(), p),
            _ => return Err(missing("Email and password are required")),
        };

        // Unknown email and wrong password must be indistinguishable
        let principal = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &principal.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.open_session(principal.id).await?;

        tracing::info!(user_id = %principal.id, "Principal logged in");

        Ok(AuthenticatedSession {
            tokens,
            user: principal.public_view(),
        })
    }

    /// Exchange a refresh token for a new pair, retiring the presented token.
    ///
    /// Only the token currently in the principal's slot is accepted. Two
    /// concurrent refreshes with the same token race on the swap; exactly one
    /// of them wins and the other is rejected.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, AppError> {
        let refresh_token = required(refresh_token)
            .ok_or_else(|| missing("Refresh token is required"))?;

        let principal_id = self.codec.verify(refresh_token, TokenKind::Refresh)?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::SessionSuperseded)?;

        let presented = fingerprint(refresh_token);
        if principal.refresh_token.as_deref() != Some(presented.as_str()) {
            tracing::warn!(user_id = %principal.id, "Superseded refresh token presented");
            return Err(AuthError::SessionSuperseded.into());
        }

        let tokens = self.codec.issue_pair(principal.id)?;
        let swapped = self
            .store
            .swap_refresh_token(
                principal.id,
                &presented,
                Some(&fingerprint(&tokens.refresh_token)),
            )
            .await?;

        if !swapped {
            tracing::warn!(user_id = %principal.id, "Lost refresh rotation race");
            return Err(AuthError::SessionSuperseded.into());
        }

        tracing::info!(user_id = %principal.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Clear the slot holding `refresh_token`, if any.
    ///
    /// Never fails towards the caller: unknown tokens are a no-op and store
    /// failures are only logged.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(refresh_token) = required(refresh_token) else {
            return;
        };
        let presented = fingerprint(refresh_token);

        let result = match self.store.find_by_refresh_token(&presented).await {
            Ok(Some(principal)) => self
                .store
                .swap_refresh_token(principal.id, &presented, None)
                .await
                .map(|cleared| {
                    if cleared {
                        tracing::info!(user_id = %principal.id, "Principal logged out");
                    }
                }),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Logout could not clear refresh slot");
        }
    }

    /// Replace the password hash. The refresh slot is left as it is, so
    /// existing sessions survive a password change.
    pub async fn change_password(
        &self,
        principal_id: Option<&str>,
        current_password: Option<&str>,
        new_password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> Result<(), AppError> {
        let (current_password, new_password, confirm_password) = match (
            required(current_password),
            required(new_password),
            required(confirm_password),
        ) {
            (Some(c), Some(n), Some(p)) => (c, n, p),
            _ => return Err(missing("All password fields are required")),
        };

        validate_new_password(new_password, confirm_password, "New passwords do not match")?;

        let principal_id = present(principal_id)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(current_password, &principal.password_hash)? {
            return Err(AuthError::WrongCurrentPassword.into());
        }

        let password_hash = hash_password(new_password)?;
        self.store
            .update_password_hash(principal.id, &password_hash)
            .await?;

        tracing::info!(user_id = %principal.id, "Password changed");
        Ok(())
    }

    pub async fn update_profile(
        &self,
        principal_id: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<PublicPrincipal, AppError> {
        let (name, email) = match (present(name), present(email)) {
            (Some(n), Some(e)) => (n, e),
            _ => return Err(missing("Name and email are required")),
        };
        let name = is_valid_name(name)?;
        let email = is_valid_email(email)?;

        let not_found = || AppError::NotFound("User not found".to_string());
        let principal_id = Uuid::parse_str(principal_id).map_err(|_| not_found())?;

        if self.store.find_by_id(principal_id).await?.is_none() {
            return Err(not_found());
        }

        if let Some(holder) = self.store.find_by_email(&email).await? {
            if holder.id != principal_id {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }

        let updated = self
            .store
            .update_profile(principal_id, &name, &email)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict("Email already in use".to_string()),
                other => other,
            })?
            .ok_or_else(not_found)?;

        tracing::info!(user_id = %updated.id, "Profile updated");
        Ok(updated.public_view())
    }

    pub async fn list_principals(
        &self,
        logged_in_only: bool,
    ) -> Result<Vec<PrincipalSummary>, AppError> {
        Ok(self
            .store
            .list(logged_in_only)
            .await?
            .iter()
            .map(|p| p.summary())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::error::StoreError;
    use crate::store::{InMemoryCredentialStore, Principal};
    use async_trait::async_trait;
    use tokio::sync::Barrier;

    fn codec() -> TokenCodec {
        TokenCodec::new(&JwtSettings {
            access_secret: "session-test-access-secret".to_string(),
            refresh_secret: "session-test-refresh-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        })
    }

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryCredentialStore::new()), codec())
    }

    /// Holds every `swap_refresh_token` call at a barrier until `parties`
    /// callers have arrived, so concurrent refreshes all read the slot before
    /// any of them writes it.
    struct SwapBarrierStore {
        inner: InMemoryCredentialStore,
        barrier: Barrier,
    }

    impl SwapBarrierStore {
        fn new(parties: usize) -> Self {
            Self {
                inner: InMemoryCredentialStore::new(),
                barrier: Barrier::new(parties),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for SwapBarrierStore {
        async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
            self.inner.insert(principal).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_refresh_token(
            &self,
            fingerprint: &str,
        ) -> Result<Option<Principal>, StoreError> {
            self.inner.find_by_refresh_token(fingerprint).await
        }

        async fn set_refresh_token(
            &self,
            id: Uuid,
            fingerprint: Option<&str>,
        ) -> Result<(), StoreError> {
            self.inner.set_refresh_token(id, fingerprint).await
        }

        async fn swap_refresh_token(
            &self,
            id: Uuid,
            expected: &str,
            next: Option<&str>,
        ) -> Result<bool, StoreError> {
            self.barrier.wait().await;
            self.inner.swap_refresh_token(id, expected, next).await
        }

        async fn update_password_hash(
            &self,
            id: Uuid,
            password_hash: &str,
        ) -> Result<(), StoreError> {
            self.inner.update_password_hash(id, password_hash).await
        }

        async fn update_profile(
            &self,
            id: Uuid,
            name: &str,
            email: &str,
        ) -> Result<Option<Principal>, StoreError> {
            self.inner.update_profile(id, name, email).await
        }

        async fn list(&self, logged_in_only: bool) -> Result<Vec<Principal>, StoreError> {
            self.inner.list(logged_in_only).await
        }
    }

    async fn signup(manager: &SessionManager, email: &str) -> AuthenticatedSession {
        manager
            .signup(Some("A"), Some(email), Some("secret1"), Some("secret1"))
            .await
            .expect("signup failed")
    }

    #[tokio::test]
    async fn test_signup_returns_pair_and_public_view() {
        let manager = manager();
        let session = signup(&manager, "A@X.com").await;

        assert_eq!(session.user.email, "a@x.com");
        assert_eq!(session.user.name, "A");
        assert_eq!(
            manager
                .codec()
                .verify(&session.tokens.access_token, TokenKind::Access),
            Ok(session.user.id)
        );

        let stored = manager.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert_eq!(
            stored.refresh_token.as_deref(),
            Some(fingerprint(&session.tokens.refresh_token).as_str())
        );
    }

    #[tokio::test]
    async fn test_signup_validation_messages() {
        let manager = manager();

        let err = manager
            .signup(Some("A"), Some("a@x.com"), Some("secret1"), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");

        let err = manager
            .signup(Some("A"), Some("a@x.com"), Some("secret1"), Some("secret2"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");

        let err = manager
            .signup(Some("A"), Some("a@x.com"), Some("abc"), Some("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_any_case_is_conflict() {
        let manager = manager();
        signup(&manager, "a@x.com").await;

        let err = manager
            .signup(Some("B"), Some("A@X.COM"), Some("secret2"), Some("secret2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let manager = manager();
        signup(&manager, "a@x.com").await;

        let wrong_password = manager.login(Some("a@x.com"), Some("wrong1")).await.unwrap_err();
        let unknown_email = manager.login(Some("b@x.com"), Some("secret1")).await.unwrap_err();

        assert!(matches!(wrong_password, AppError::Auth(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, AppError::Auth(AuthError::InvalidCredentials)));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let manager = manager();
        let err = manager.login(Some("a@x.com"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_supersedes_previous_session() {
        let manager = manager();
        let first = signup(&manager, "a@x.com").await;
        let second = manager.login(Some("a@x.com"), Some("secret1")).await.unwrap();

        assert_ne!(first.tokens.refresh_token, second.tokens.refresh_token);

        let err = manager
            .refresh(Some(&first.tokens.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::SessionSuperseded)));
        assert!(manager.refresh(Some(&second.tokens.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;
        let r1 = session.tokens.refresh_token;

        let rotated = manager.refresh(Some(&r1)).await.expect("first refresh");
        assert_ne!(rotated.refresh_token, r1);

        let err = manager.refresh(Some(&r1)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::SessionSuperseded)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;

        let err = manager
            .refresh(Some(&session.tokens.access_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_refresh_missing_token_is_validation_error() {
        let manager = manager();
        let err = manager.refresh(None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Refresh token is required");
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_single_winner() {
        let manager = SessionManager::new(Arc::new(SwapBarrierStore::new(2)), codec());
        let session = signup(&manager, "a@x.com").await;
        let token = session.tokens.refresh_token;

        // Both refreshes pass the slot check before either swaps
        let (a, b) = tokio::join!(manager.refresh(Some(&token)), manager.refresh(Some(&token)));

        let (winner, loser) = match (a, b) {
            (Ok(pair), Err(err)) | (Err(err), Ok(pair)) => (pair, err),
            (a, b) => panic!("expected exactly one winner, got {:?} and {:?}", a, b),
        };
        assert!(matches!(loser, AppError::Auth(AuthError::SessionSuperseded)));

        let stored = manager.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert_eq!(
            stored.refresh_token.as_deref(),
            Some(fingerprint(&winner.refresh_token).as_str())
        );
    }

    #[tokio::test]
    async fn test_logout_clears_slot_and_is_idempotent() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;
        let token = session.tokens.refresh_token;

        manager.logout(Some(&token)).await;
        manager.logout(Some(&token)).await;
        manager.logout(Some("not-a-token")).await;
        manager.logout(None).await;

        let stored = manager.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());

        let err = manager.refresh(Some(&token)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::SessionSuperseded)));
    }

    #[tokio::test]
    async fn test_change_password_switches_credentials() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;
        let id = session.user.id.to_string();

        manager
            .change_password(Some(&id), Some("secret1"), Some("newpw1"), Some("newpw1"))
            .await
            .expect("change password");

        assert!(manager.login(Some("a@x.com"), Some("secret1")).await.is_err());
        let relogin = manager.login(Some("a@x.com"), Some("newpw1")).await;
        assert!(relogin.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_does_not_revoke_existing_session() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;
        let id = session.user.id.to_string();

        manager
            .change_password(Some(&id), Some("secret1"), Some("newpw1"), Some("newpw1"))
            .await
            .unwrap();

        assert!(manager.refresh(Some(&session.tokens.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_errors() {
        let manager = manager();
        let session = signup(&manager, "a@x.com").await;
        let id = session.user.id.to_string();

        let err = manager
            .change_password(Some(&id), Some("wrong1"), Some("newpw1"), Some("newpw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::WrongCurrentPassword)));

        let unknown = Uuid::new_v4().to_string();
        let err = manager
            .change_password(Some(&unknown), Some("secret1"), Some("newpw1"), Some("newpw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = manager
            .change_password(Some(&id), Some("secret1"), Some("newpw1"), Some("newpw2"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "New passwords do not match");
    }

    #[tokio::test]
    async fn test_update_profile() {
        let manager = manager();
        let a = signup(&manager, "a@x.com").await;
        signup(&manager, "b@x.com").await;
        let id = a.user.id.to_string();

        let err = manager
            .update_profile(&id, Some("A"), Some("B@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already in use");

        let updated = manager
            .update_profile(&id, Some("Alice"), Some("alice@x.com"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.email, "alice@x.com");

        let err = manager
            .update_profile(&Uuid::new_v4().to_string(), Some("X"), Some("x@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_principals_reports_login_state() {
        let manager = manager();
        let a = signup(&manager, "a@x.com").await;
        signup(&manager, "b@x.com").await;
        manager.logout(Some(&a.tokens.refresh_token)).await;

        let all = manager.list_principals(false).await.unwrap();
        assert_eq!(all.len(), 2);

        let logged_in = manager.list_principals(true).await.unwrap();
        assert_eq!(logged_in.len(), 1);
        assert_eq!(logged_in[0].email, "b@x.com");
        assert!(logged_in[0].is_logged_in);
    }
}

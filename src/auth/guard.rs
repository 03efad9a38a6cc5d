/// Request authentication
///
/// Resolves an `Authorization: Bearer <access token>` header to the
/// principal it names. The refresh slot is never consulted, so an access
/// token stays usable for its whole lifetime, logout included.

use std::ops::Deref;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::store::{CredentialStore, PublicPrincipal};

/// The principal attached to a request that passed authentication.
///
/// Inserted into the request extensions by `JwtMiddleware`; handlers take it
/// as `web::ReqData<AuthenticatedPrincipal>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub PublicPrincipal);

impl Deref for AuthenticatedPrincipal {
    type Target = PublicPrincipal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extract the token from a bearer authorization header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn authenticate(
    header: Option<&str>,
    codec: &TokenCodec,
    store: &dyn CredentialStore,
) -> Result<AuthenticatedPrincipal, AppError> {
    let token = bearer_token(header).ok_or(AuthError::MissingToken)?;

    let principal_id = codec.verify(token, TokenKind::Access).map_err(|e| {
        tracing::debug!(reason = %e, "Access token rejected");
        AppError::from(e)
    })?;

    // Store failures propagate as-is and are never turned into a 401
    let principal = store
        .find_by_id(principal_id)
        .await?
        .ok_or(AuthError::PrincipalNotFound)?;

    Ok(AuthenticatedPrincipal(principal.public_view()))
}

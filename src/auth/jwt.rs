/// Token Codec
///
/// Issues and verifies access and refresh JWTs. Each kind has its own HS256
/// secret and lifetime, taken from `JwtSettings`.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Why a token failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signed with another secret, wrong issuer, or wrong token kind
    InvalidSignature,
    Expired,
    /// Not a decodable JWT, or the subject is not a principal id
    Malformed,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Malformed => write!(f, "malformed token"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::InvalidSignature | TokenError::Malformed => AuthError::TokenInvalid,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.into())
    }
}

/// Freshly issued access/refresh tokens
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: i64,
}

impl KindKeys {
    fn new(secret: &str, lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

pub struct TokenCodec {
    access: KindKeys,
    refresh: KindKeys,
    issuer: String,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: KindKeys::new(&config.access_secret, config.access_token_expiry),
            refresh: KindKeys::new(&config.refresh_secret, config.refresh_token_expiry),
            issuer: config.issuer.clone(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub(crate) fn issue_at(
        &self,
        principal_id: Uuid,
        kind: TokenKind,
        now: i64,
    ) -> Result<String, AppError> {
        let keys = self.keys(kind);
        let claims = Claims::new(principal_id, kind, now, keys.lifetime, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    pub fn issue_access_token(&self, principal_id: Uuid) -> Result<String, AppError> {
        self.issue_at(principal_id, TokenKind::Access, chrono::Utc::now().timestamp())
    }

    pub fn issue_refresh_token(&self, principal_id: Uuid) -> Result<String, AppError> {
        self.issue_at(principal_id, TokenKind::Refresh, chrono::Utc::now().timestamp())
    }

    pub fn issue_pair(&self, principal_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(principal_id)?,
            refresh_token: self.issue_refresh_token(principal_id)?,
        })
    }

    /// Verify `token` as a `kind` token and return the principal id it names
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?;

        if claims.token_type != kind {
            return Err(TokenError::InvalidSignature);
        }

        claims.principal_id().ok_or(TokenError::Malformed)
    }
}
